//! Handshake payloads for non-command op codes

use serde::{Deserialize, Serialize};

/// Default heartbeat interval in milliseconds
pub const DEFAULT_HEARTBEAT_INTERVAL: u64 = 45_000;

/// Hello payload (op=10)
///
/// Sent immediately after the WebSocket connection is established.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelloPayload {
    /// Interval in milliseconds at which the client should send heartbeats
    pub heartbeat_interval: u64,
}

impl HelloPayload {
    #[must_use]
    pub fn new() -> Self {
        Self::with_interval(DEFAULT_HEARTBEAT_INTERVAL)
    }

    #[must_use]
    pub fn with_interval(heartbeat_interval: u64) -> Self {
        Self { heartbeat_interval }
    }
}

impl Default for HelloPayload {
    fn default() -> Self {
        Self::new()
    }
}

/// Identify payload (op=2)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentifyPayload {
    /// JWT access token, with or without a `Bearer ` prefix
    pub token: String,
}
