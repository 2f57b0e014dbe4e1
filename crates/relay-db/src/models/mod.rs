//! Database models
//!
//! Row types mapped with SQLx `FromRow`.

mod message;
mod room;

pub use message::{MessageModel, MessageRefModel};
pub use room::RoomModel;
