//! Entity to model mappers
//!
//! - `From<Model> for Entity` / `into_*`: convert database rows to domain objects
//! - `*Insert` structs: prepare entity data for database operations

mod message;
mod room;

pub use message::MessageInsert;
pub use room::{member_ids, RoomInsert};
