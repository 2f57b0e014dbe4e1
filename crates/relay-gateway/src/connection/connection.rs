//! A registered connection handle
//!
//! Created when a socket completes Identify; owned by the `ConnectionRegistry`.

use crate::events::GatewayEventType;
use crate::protocol::GatewayMessage;
use chrono::{DateTime, Utc};
use relay_core::Snowflake;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Process-unique connection identifier (UUID v4)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Generate a fresh identifier
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A live, authenticated connection
pub struct Connection {
    id: ConnectionId,
    user_id: Snowflake,

    /// Channel to the socket's send task
    sender: mpsc::Sender<GatewayMessage>,

    /// Last sequence number sent
    sequence: AtomicU64,

    connected_at: DateTime<Utc>,
}

impl Connection {
    /// Create a new connection handle
    pub fn new(user_id: Snowflake, sender: mpsc::Sender<GatewayMessage>) -> Arc<Self> {
        Arc::new(Self {
            id: ConnectionId::new(),
            user_id,
            sender,
            sequence: AtomicU64::new(0),
            connected_at: Utc::now(),
        })
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn user_id(&self) -> Snowflake {
        self.user_id
    }

    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    /// Get the next sequence number
    fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Get the current sequence number
    pub fn current_sequence(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }

    /// Queue a dispatch event for this connection
    ///
    /// Never waits: a full or closed outbound queue drops the event and returns `false`.
    /// A dropped event does not consume a sequence number.
    pub fn dispatch(&self, event: GatewayEventType, data: Value) -> bool {
        let permit = match self.sender.try_reserve() {
            Ok(permit) => permit,
            Err(mpsc::error::TrySendError::Full(())) => {
                tracing::warn!(
                    session_id = %self.id,
                    user_id = %self.user_id,
                    event = %event,
                    "Outbound queue full, dropping event"
                );
                return false;
            }
            Err(mpsc::error::TrySendError::Closed(())) => return false,
        };

        permit.send(GatewayMessage::dispatch(event.as_str(), self.next_sequence(), data));
        true
    }

    /// Check if the sender channel is closed
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("sequence", &self.sequence.load(Ordering::SeqCst))
            .field("connected_at", &self.connected_at)
            .finish()
    }
}
