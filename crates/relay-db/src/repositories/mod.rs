//! Repository implementations
//!
//! PostgreSQL implementations of the store traits defined in relay-core.

mod error;
mod message;
mod room;

pub use message::PgMessageRepository;
pub use room::PgRoomRepository;
