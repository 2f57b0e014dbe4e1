//! Store traits (ports) - the persistence collaborators the relay depends on
//!
//! The relay defines what it needs, and the infrastructure layer (PostgreSQL,
//! in-memory) provides the implementation. Every call is a suspension point.

use async_trait::async_trait;

use crate::entities::{ConversationUpdate, Message, NewConversation, NewMessage, ReadReceipt, Room};
use crate::error::DomainError;
use crate::value_objects::Snowflake;

/// Result type for store operations
pub type RepoResult<T> = Result<T, DomainError>;

// ============================================================================
// Membership Store
// ============================================================================

#[async_trait]
pub trait MembershipStore: Send + Sync {
    /// Load a room and its current member set
    ///
    /// Fails with `DomainError::RoomNotFound` for unknown rooms.
    async fn get_room(&self, room_id: Snowflake) -> RepoResult<Room>;
}

// ============================================================================
// Message Store
// ============================================================================

#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Append a message, assigning its durable id and timestamp
    async fn append(&self, message: NewMessage) -> RepoResult<Message>;

    /// Record that `reader_id` has read `message_id` in `room_id`
    ///
    /// Returns `None` when the receipt already existed. Fails with
    /// `DomainError::MessageNotFound` if the message is not in the room.
    async fn mark_read(
        &self,
        room_id: Snowflake,
        message_id: Snowflake,
        reader_id: Snowflake,
    ) -> RepoResult<Option<ReadReceipt>>;
}

// ============================================================================
// Conversation Store
// ============================================================================

#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Persist a new conversation and return it with its assigned id
    async fn create(&self, conversation: NewConversation) -> RepoResult<Room>;

    /// Apply a rename / membership change and return the updated room
    async fn update(&self, update: ConversationUpdate) -> RepoResult<Room>;
}
