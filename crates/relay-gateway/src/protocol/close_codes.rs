//! Close codes sent when the gateway ends a socket

use serde::{Deserialize, Serialize};

/// Application close codes (the 4000 range is reserved for us by RFC 6455)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum CloseCode {
    /// Internal failure while handling a frame
    UnknownError = 4000,
    /// Frame carried an op the client may not send
    UnknownOpcode = 4001,
    /// Frame was not valid JSON or had the wrong shape
    DecodeError = 4002,
    /// Command arrived before Identify
    NotAuthenticated = 4003,
    /// Identify token was rejected
    AuthenticationFailed = 4004,
    /// Identify arrived on an identified socket
    AlreadyAuthenticated = 4005,
    /// Heartbeat deadline passed
    SessionTimeout = 4009,
}

impl CloseCode {
    const ALL: [Self; 7] = [
        Self::UnknownError,
        Self::UnknownOpcode,
        Self::DecodeError,
        Self::NotAuthenticated,
        Self::AuthenticationFailed,
        Self::AlreadyAuthenticated,
        Self::SessionTimeout,
    ];

    /// Look up the gateway code for a raw close frame code
    #[must_use]
    pub fn from_u16(value: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|code| code.as_u16() == value)
    }

    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// A client holding a bad token gets the same answer on retry
    #[must_use]
    pub const fn should_reconnect(self) -> bool {
        !matches!(self, Self::AuthenticationFailed)
    }

    /// Reason text placed in the close frame
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::UnknownError => "Internal gateway error",
            Self::UnknownOpcode => "Opcode not accepted from clients",
            Self::DecodeError => "Malformed frame",
            Self::NotAuthenticated => "Identify first",
            Self::AuthenticationFailed => "Invalid or expired token",
            Self::AlreadyAuthenticated => "Socket already identified",
            Self::SessionTimeout => "Heartbeat timed out",
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::UnknownError => "UnknownError",
            Self::UnknownOpcode => "UnknownOpcode",
            Self::DecodeError => "DecodeError",
            Self::NotAuthenticated => "NotAuthenticated",
            Self::AuthenticationFailed => "AuthenticationFailed",
            Self::AlreadyAuthenticated => "AlreadyAuthenticated",
            Self::SessionTimeout => "SessionTimeout",
        }
    }
}

impl std::fmt::Display for CloseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.as_u16(), self.name())
    }
}

impl From<CloseCode> for u16 {
    fn from(code: CloseCode) -> Self {
        code.as_u16()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_code_maps_back_from_its_number() {
        for code in CloseCode::ALL {
            assert_eq!(CloseCode::from_u16(u16::from(code)), Some(code));
        }
        assert_eq!(CloseCode::from_u16(1000), None);
        assert_eq!(CloseCode::from_u16(4008), None);
    }

    #[test]
    fn test_only_bad_tokens_discourage_reconnect() {
        let no_retry: Vec<_> = CloseCode::ALL
            .into_iter()
            .filter(|code| !code.should_reconnect())
            .collect();
        assert_eq!(no_retry, vec![CloseCode::AuthenticationFailed]);
    }

    #[test]
    fn test_display_is_number_and_name() {
        assert_eq!(CloseCode::NotAuthenticated.to_string(), "4003/NotAuthenticated");
    }
}
