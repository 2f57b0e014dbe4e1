//! # relay-core
//!
//! Domain layer for the real-time relay: identifiers, rooms, messages, read receipts,
//! and the store traits the relay consumes. This crate has no dependencies on
//! infrastructure (database, web framework, etc.).

pub mod entities;
pub mod error;
pub mod traits;
pub mod value_objects;

// Re-export commonly used types at crate root
pub use entities::{
    ConversationUpdate, Message, MessageKind, NewConversation, NewMessage, ReadReceipt, Room,
    RoomKind,
};
pub use error::DomainError;
pub use traits::{ConversationStore, MembershipStore, MessageStore, RepoResult};
pub use value_objects::{Snowflake, SnowflakeGenerator, SnowflakeParseError};
