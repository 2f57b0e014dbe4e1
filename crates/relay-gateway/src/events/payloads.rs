//! Event payload definitions

use chrono::{DateTime, Utc};
use relay_core::{Message, MessageKind, ReadReceipt, Room, RoomKind, Snowflake};
use serde::{Deserialize, Serialize};

// === Connection Events ===

/// READY event payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadyEvent {
    /// Gateway protocol version
    pub v: i32,
    pub user_id: Snowflake,
    /// Identifier of this connection
    pub session_id: String,
    /// Users online at the time of Identify, the caller included
    pub online_user_ids: Vec<Snowflake>,
}

// === Conversation Events ===

/// Conversation data included in CONVERSATION_* events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationPayload {
    pub id: Snowflake,
    pub kind: RoomKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub created_by: Snowflake,
    pub member_ids: Vec<Snowflake>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Room> for ConversationPayload {
    fn from(room: &Room) -> Self {
        let mut member_ids: Vec<Snowflake> = room.members.iter().copied().collect();
        member_ids.sort_unstable();

        Self {
            id: room.id,
            kind: room.kind,
            name: room.name.clone(),
            created_by: room.created_by,
            member_ids,
            created_at: room.created_at,
            updated_at: room.updated_at,
        }
    }
}

/// CONVERSATION_JOINED, CONVERSATION_CREATED and CONVERSATION_UPDATED payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationEvent {
    #[serde(flatten)]
    pub conversation: ConversationPayload,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
}

impl ConversationEvent {
    #[must_use]
    pub fn new(room: &Room, nonce: Option<String>) -> Self {
        Self {
            conversation: ConversationPayload::from(room),
            nonce,
        }
    }
}

// === Message Events ===

/// NEW_MESSAGE event payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagePayload {
    pub id: Snowflake,
    pub room_id: Snowflake,
    pub sender_id: Snowflake,
    pub content: String,
    pub kind: MessageKind,
    pub created_at: DateTime<Utc>,
}

impl From<&Message> for MessagePayload {
    fn from(message: &Message) -> Self {
        Self {
            id: message.id,
            room_id: message.room_id,
            sender_id: message.sender_id,
            content: message.content.clone(),
            kind: message.kind,
            created_at: message.created_at,
        }
    }
}

/// MESSAGE_DELIVERED event payload
///
/// Tells the sender which durable id its message received.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageDeliveredEvent {
    pub message_id: Snowflake,
    pub room_id: Snowflake,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
}

/// MESSAGE_READ event payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageReadEvent {
    pub message_id: Snowflake,
    pub room_id: Snowflake,
    pub reader_id: Snowflake,
    pub read_at: DateTime<Utc>,
}

impl From<&ReadReceipt> for MessageReadEvent {
    fn from(receipt: &ReadReceipt) -> Self {
        Self {
            message_id: receipt.message_id,
            room_id: receipt.room_id,
            reader_id: receipt.reader_id,
            read_at: receipt.read_at,
        }
    }
}

// === Typing & Presence Events ===

/// USER_TYPING and USER_STOPPED_TYPING payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypingEvent {
    pub room_id: Snowflake,
    pub user_id: Snowflake,
}

/// Online status carried by PRESENCE_CHANGED
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    Online,
    Offline,
}

/// PRESENCE_CHANGED event payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceChangedEvent {
    pub user_id: Snowflake,
    pub status: PresenceStatus,
}

// === Errors ===

/// COMMAND_REJECTED event payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandRejectedEvent {
    /// Name of the rejected command, as sent by the client
    pub command: String,
    /// Stable machine-readable error code
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
}
