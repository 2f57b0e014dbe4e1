//! Per-socket session state
//!
//! A session exists from WebSocket upgrade until the socket closes. It becomes
//! bound to a registered [`Connection`] once Identify succeeds.

use super::Connection;
use crate::protocol::GatewayMessage;
use parking_lot::Mutex;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// State shared between a socket's receive and heartbeat tasks
pub struct Session {
    /// Channel to the socket's send task
    sender: mpsc::Sender<GatewayMessage>,

    /// Last heartbeat received (or socket open time)
    last_heartbeat: Mutex<Instant>,

    /// Set once on successful Identify
    connection: OnceLock<Arc<Connection>>,
}

impl Session {
    pub fn new(sender: mpsc::Sender<GatewayMessage>) -> Arc<Self> {
        Arc::new(Self {
            sender,
            last_heartbeat: Mutex::new(Instant::now()),
            connection: OnceLock::new(),
        })
    }

    /// Get a clone of the sender channel
    pub fn sender(&self) -> mpsc::Sender<GatewayMessage> {
        self.sender.clone()
    }

    /// Send a non-dispatch frame (Hello, Heartbeat ACK) to the socket
    pub async fn send(
        &self,
        message: GatewayMessage,
    ) -> Result<(), mpsc::error::SendError<GatewayMessage>> {
        self.sender.send(message).await
    }

    /// Record a heartbeat received
    pub fn record_heartbeat(&self) {
        *self.last_heartbeat.lock() = Instant::now();
    }

    /// Get time since last heartbeat
    pub fn time_since_heartbeat(&self) -> Duration {
        self.last_heartbeat.lock().elapsed()
    }

    /// The registered connection, if Identify has completed
    pub fn connection(&self) -> Option<&Arc<Connection>> {
        self.connection.get()
    }

    pub fn is_identified(&self) -> bool {
        self.connection.get().is_some()
    }

    /// Bind the registered connection to this session
    ///
    /// Fails with the rejected handle if the session was already bound.
    pub fn bind(&self, connection: Arc<Connection>) -> Result<(), Arc<Connection>> {
        self.connection.set(connection)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("connection", &self.connection.get().map(|c| c.id()))
            .finish_non_exhaustive()
    }
}
