//! Gateway event types
//!
//! Event names sent in the `t` field of dispatch frames.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Gateway event types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GatewayEventType {
    // Connection events
    /// Sent after successful Identify
    Ready,

    // Conversation events
    /// Acknowledges JOIN_CONVERSATION to the joining connection
    ConversationJoined,
    /// A conversation this user participates in was created
    ConversationCreated,
    /// Name or membership of a conversation changed
    ConversationUpdated,

    // Message events
    /// New message in a joined room
    NewMessage,
    /// The sender's message was persisted
    MessageDelivered,
    /// A recipient read one of the user's messages
    MessageRead,

    // Typing events
    UserTyping,
    UserStoppedTyping,

    // Presence events
    /// Another user came online or went offline
    PresenceChanged,

    // Errors
    /// A command from this connection was refused
    CommandRejected,
}

impl GatewayEventType {
    /// Get the string representation of the event type
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ready => "READY",
            Self::ConversationJoined => "CONVERSATION_JOINED",
            Self::ConversationCreated => "CONVERSATION_CREATED",
            Self::ConversationUpdated => "CONVERSATION_UPDATED",
            Self::NewMessage => "NEW_MESSAGE",
            Self::MessageDelivered => "MESSAGE_DELIVERED",
            Self::MessageRead => "MESSAGE_READ",
            Self::UserTyping => "USER_TYPING",
            Self::UserStoppedTyping => "USER_STOPPED_TYPING",
            Self::PresenceChanged => "PRESENCE_CHANGED",
            Self::CommandRejected => "COMMAND_REJECTED",
        }
    }

    /// Parse an event type from a string
    #[must_use]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "READY" => Some(Self::Ready),
            "CONVERSATION_JOINED" => Some(Self::ConversationJoined),
            "CONVERSATION_CREATED" => Some(Self::ConversationCreated),
            "CONVERSATION_UPDATED" => Some(Self::ConversationUpdated),
            "NEW_MESSAGE" => Some(Self::NewMessage),
            "MESSAGE_DELIVERED" => Some(Self::MessageDelivered),
            "MESSAGE_READ" => Some(Self::MessageRead),
            "USER_TYPING" => Some(Self::UserTyping),
            "USER_STOPPED_TYPING" => Some(Self::UserStoppedTyping),
            "PRESENCE_CHANGED" => Some(Self::PresenceChanged),
            "COMMAND_REJECTED" => Some(Self::CommandRejected),
            _ => None,
        }
    }

    /// Check if the event is only delivered to connections that joined its room
    #[must_use]
    pub const fn is_room_scoped(self) -> bool {
        matches!(
            self,
            Self::NewMessage | Self::UserTyping | Self::UserStoppedTyping
        )
    }
}

impl fmt::Display for GatewayEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<GatewayEventType> for String {
    fn from(event: GatewayEventType) -> Self {
        event.as_str().to_string()
    }
}
