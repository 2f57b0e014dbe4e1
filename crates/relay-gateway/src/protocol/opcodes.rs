//! Frame op codes

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// The `op` field of every gateway frame
///
/// Clients send Heartbeat, Identify and Command. Everything else flows from
/// the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
    /// Named event with a sequence number
    Dispatch = 0,
    Heartbeat = 1,
    /// Carries the access token
    Identify = 2,
    /// Relay request such as SEND_MESSAGE or TYPING_START
    Command = 3,
    /// Identify must be repeated on a new socket
    InvalidSession = 9,
    /// First frame on every socket, announces the heartbeat interval
    Hello = 10,
    HeartbeatAck = 11,
}

impl OpCode {
    const ALL: [Self; 7] = [
        Self::Dispatch,
        Self::Heartbeat,
        Self::Identify,
        Self::Command,
        Self::InvalidSession,
        Self::Hello,
        Self::HeartbeatAck,
    ];

    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.as_u8() == value)
    }

    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Whether a client is allowed to put this op on the wire
    #[must_use]
    pub const fn is_client_op(self) -> bool {
        matches!(self, Self::Heartbeat | Self::Identify | Self::Command)
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Dispatch => "Dispatch",
            Self::Heartbeat => "Heartbeat",
            Self::Identify => "Identify",
            Self::Command => "Command",
            Self::InvalidSession => "InvalidSession",
            Self::Hello => "Hello",
            Self::HeartbeatAck => "HeartbeatAck",
        }
    }
}

impl Serialize for OpCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.as_u8())
    }
}

impl<'de> Deserialize<'de> for OpCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = u8::deserialize(deserializer)?;
        Self::from_u8(raw).ok_or_else(|| serde::de::Error::custom(format!("unknown op {raw}")))
    }
}

impl std::fmt::Display for OpCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.as_u8(), self.name())
    }
}
