//! Relay error taxonomy

use crate::rooms::RoomIndexError;
use relay_core::{DomainError, Snowflake};
use thiserror::Error;

/// Errors raised while relaying a command
///
/// Every variant is reported to the originating connection only.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelayError {
    #[error("Not authorized for room {room_id}")]
    Unauthorized { room_id: Snowflake },

    #[error("Not a member of room {0}")]
    NotAMember(Snowflake),

    #[error("Room not found: {0}")]
    RoomNotFound(Snowflake),

    #[error("Invalid participants: {0}")]
    InvalidParticipants(String),

    #[error("Group conversations require a name")]
    MissingGroupName,

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Persistence failed: {0}")]
    PersistenceFailure(String),
}

impl RelayError {
    /// Stable code carried by COMMAND_REJECTED
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized { .. } => "UNAUTHORIZED",
            Self::NotAMember(_) => "NOT_A_MEMBER",
            Self::RoomNotFound(_) => "UNKNOWN_ROOM",
            Self::InvalidParticipants(_) => "INVALID_PARTICIPANTS",
            Self::MissingGroupName => "MISSING_GROUP_NAME",
            Self::InvalidPayload(_) => "INVALID_PAYLOAD",
            Self::PersistenceFailure(_) => "PERSISTENCE_FAILURE",
        }
    }
}

impl From<DomainError> for RelayError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::RoomNotFound(room_id) => Self::RoomNotFound(room_id),
            DomainError::NotRoomMember { room_id, .. } => Self::NotAMember(room_id),
            DomainError::InvalidParticipants(reason) => Self::InvalidParticipants(reason),
            DomainError::MissingGroupName => Self::MissingGroupName,
            DomainError::ValidationError(reason) => Self::InvalidPayload(reason),
            DomainError::MessageNotFound(id) => {
                Self::InvalidPayload(format!("Unknown message {id}"))
            }
            DomainError::DatabaseError(reason) | DomainError::InternalError(reason) => {
                Self::PersistenceFailure(reason)
            }
        }
    }
}

impl From<RoomIndexError> for RelayError {
    fn from(err: RoomIndexError) -> Self {
        match err {
            RoomIndexError::RoomNotFound(room_id) => Self::RoomNotFound(room_id),
            RoomIndexError::Unauthorized { room_id, .. } => Self::Unauthorized { room_id },
        }
    }
}

pub type RelayResult<T> = Result<T, RelayError>;
