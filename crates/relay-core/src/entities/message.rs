//! Message entity and read receipts

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value_objects::Snowflake;

/// Message content kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    #[default]
    Text,
    Image,
    File,
    Code,
}

impl MessageKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::File => "file",
            Self::Code => "code",
        }
    }

    /// Parse from the storage representation, falling back to text
    #[must_use]
    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "image" => Self::Image,
            "file" => Self::File,
            "code" => Self::Code,
            _ => Self::Text,
        }
    }
}

/// A persisted message
///
/// `id` and `created_at` are assigned by the store at append time and define
/// the order of messages within a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: Snowflake,
    pub room_id: Snowflake,
    pub sender_id: Snowflake,
    pub content: String,
    pub kind: MessageKind,
    pub created_at: DateTime<Utc>,
}

/// A message that has not been persisted yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub room_id: Snowflake,
    pub sender_id: Snowflake,
    pub content: String,
    pub kind: MessageKind,
}

/// Result of marking a message as read for the first time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadReceipt {
    pub message_id: Snowflake,
    pub room_id: Snowflake,
    /// Author of the message
    pub sender_id: Snowflake,
    pub reader_id: Snowflake,
    pub read_at: DateTime<Utc>,
}
