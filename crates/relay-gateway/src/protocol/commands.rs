//! Relay commands (op=3)
//!
//! A command frame carries the command name in `t` and its payload in `d`.
//! Payloads are deserialized into typed structs and checked with `validator`
//! before they reach the relay.

use relay_core::{MessageKind, RoomKind, Snowflake};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;
use validator::Validate;

/// Command names accepted in the `t` field of a command frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandType {
    JoinConversation,
    LeaveConversation,
    SendMessage,
    TypingStart,
    TypingStop,
    MarkRead,
    CreateConversation,
    UpdateConversation,
}

impl CommandType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::JoinConversation => "JOIN_CONVERSATION",
            Self::LeaveConversation => "LEAVE_CONVERSATION",
            Self::SendMessage => "SEND_MESSAGE",
            Self::TypingStart => "TYPING_START",
            Self::TypingStop => "TYPING_STOP",
            Self::MarkRead => "MARK_READ",
            Self::CreateConversation => "CREATE_CONVERSATION",
            Self::UpdateConversation => "UPDATE_CONVERSATION",
        }
    }

    #[must_use]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "JOIN_CONVERSATION" => Some(Self::JoinConversation),
            "LEAVE_CONVERSATION" => Some(Self::LeaveConversation),
            "SEND_MESSAGE" => Some(Self::SendMessage),
            "TYPING_START" => Some(Self::TypingStart),
            "TYPING_STOP" => Some(Self::TypingStop),
            "MARK_READ" => Some(Self::MarkRead),
            "CREATE_CONVERSATION" => Some(Self::CreateConversation),
            "UPDATE_CONVERSATION" => Some(Self::UpdateConversation),
            _ => None,
        }
    }
}

impl fmt::Display for CommandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// === Payloads ===

/// Payload for commands that only address a room
///
/// Used by JOIN_CONVERSATION, LEAVE_CONVERSATION, TYPING_START and TYPING_STOP.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RoomPayload {
    pub room_id: Snowflake,
    #[validate(length(max = 64, message = "Nonce must be at most 64 characters"))]
    pub nonce: Option<String>,
}

/// SEND_MESSAGE payload
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SendMessagePayload {
    pub room_id: Snowflake,
    /// Upper bound is `RELAY_MAX_CONTENT_LENGTH`, enforced by the relay
    #[validate(length(min = 1, message = "Message content cannot be empty"))]
    pub content: String,
    #[serde(default)]
    pub kind: MessageKind,
    #[validate(length(max = 64, message = "Nonce must be at most 64 characters"))]
    pub nonce: Option<String>,
}

/// MARK_READ payload
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct MarkReadPayload {
    pub room_id: Snowflake,
    #[validate(length(min = 1, max = 100, message = "Between 1 and 100 message ids required"))]
    pub message_ids: Vec<Snowflake>,
    #[validate(length(max = 64, message = "Nonce must be at most 64 characters"))]
    pub nonce: Option<String>,
}

/// CREATE_CONVERSATION payload
///
/// `participant_ids` lists the other users; the sender is always included.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateConversationPayload {
    #[validate(length(min = 1, max = 100, message = "Between 1 and 100 participants required"))]
    pub participant_ids: Vec<Snowflake>,
    pub kind: RoomKind,
    #[validate(length(max = 100, message = "Name must be at most 100 characters"))]
    pub name: Option<String>,
    #[validate(length(max = 64, message = "Nonce must be at most 64 characters"))]
    pub nonce: Option<String>,
}

/// UPDATE_CONVERSATION payload
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateConversationPayload {
    pub room_id: Snowflake,
    #[validate(length(max = 100, message = "Name must be at most 100 characters"))]
    pub name: Option<String>,
    #[serde(default)]
    #[validate(length(max = 100, message = "At most 100 users can be added at once"))]
    pub add_user_ids: Vec<Snowflake>,
    #[serde(default)]
    #[validate(length(max = 100, message = "At most 100 users can be removed at once"))]
    pub remove_user_ids: Vec<Snowflake>,
    #[validate(length(max = 64, message = "Nonce must be at most 64 characters"))]
    pub nonce: Option<String>,
}

// === Parsed command ===

/// Errors raised while turning a command frame into a [`Command`]
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Invalid {command} payload: {reason}")]
    InvalidPayload {
        command: CommandType,
        reason: String,
    },
}

impl CommandError {
    /// Stable code carried by COMMAND_REJECTED
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownCommand(_) => "UNKNOWN_COMMAND",
            Self::InvalidPayload { .. } => "INVALID_PAYLOAD",
        }
    }
}

/// A decoded and validated client command
#[derive(Debug, Clone)]
pub enum Command {
    JoinConversation(RoomPayload),
    LeaveConversation(RoomPayload),
    SendMessage(SendMessagePayload),
    TypingStart(RoomPayload),
    TypingStop(RoomPayload),
    MarkRead(MarkReadPayload),
    CreateConversation(CreateConversationPayload),
    UpdateConversation(UpdateConversationPayload),
}

impl Command {
    /// Decode a command frame's `t` and `d` fields
    pub fn parse(name: &str, data: Value) -> Result<Self, CommandError> {
        let kind = CommandType::from_str(name)
            .ok_or_else(|| CommandError::UnknownCommand(name.to_string()))?;

        let command = match kind {
            CommandType::JoinConversation => Self::JoinConversation(decode(kind, data)?),
            CommandType::LeaveConversation => Self::LeaveConversation(decode(kind, data)?),
            CommandType::SendMessage => Self::SendMessage(decode(kind, data)?),
            CommandType::TypingStart => Self::TypingStart(decode(kind, data)?),
            CommandType::TypingStop => Self::TypingStop(decode(kind, data)?),
            CommandType::MarkRead => Self::MarkRead(decode(kind, data)?),
            CommandType::CreateConversation => Self::CreateConversation(decode(kind, data)?),
            CommandType::UpdateConversation => Self::UpdateConversation(decode(kind, data)?),
        };

        Ok(command)
    }

    #[must_use]
    pub fn kind(&self) -> CommandType {
        match self {
            Self::JoinConversation(_) => CommandType::JoinConversation,
            Self::LeaveConversation(_) => CommandType::LeaveConversation,
            Self::SendMessage(_) => CommandType::SendMessage,
            Self::TypingStart(_) => CommandType::TypingStart,
            Self::TypingStop(_) => CommandType::TypingStop,
            Self::MarkRead(_) => CommandType::MarkRead,
            Self::CreateConversation(_) => CommandType::CreateConversation,
            Self::UpdateConversation(_) => CommandType::UpdateConversation,
        }
    }

    /// Client correlation token, echoed back in acknowledgements and rejections
    #[must_use]
    pub fn nonce(&self) -> Option<&str> {
        match self {
            Self::JoinConversation(p)
            | Self::LeaveConversation(p)
            | Self::TypingStart(p)
            | Self::TypingStop(p) => p.nonce.as_deref(),
            Self::SendMessage(p) => p.nonce.as_deref(),
            Self::MarkRead(p) => p.nonce.as_deref(),
            Self::CreateConversation(p) => p.nonce.as_deref(),
            Self::UpdateConversation(p) => p.nonce.as_deref(),
        }
    }

    /// Best-effort nonce lookup on a payload that failed to decode
    #[must_use]
    pub fn nonce_hint(data: &Value) -> Option<String> {
        data.get("nonce")
            .and_then(Value::as_str)
            .map(ToString::to_string)
    }
}

fn decode<T>(command: CommandType, data: Value) -> Result<T, CommandError>
where
    T: DeserializeOwned + Validate,
{
    let payload: T = serde_json::from_value(data).map_err(|e| CommandError::InvalidPayload {
        command,
        reason: e.to_string(),
    })?;

    payload
        .validate()
        .map_err(|e| CommandError::InvalidPayload {
            command,
            reason: e.to_string(),
        })?;

    Ok(payload)
}
