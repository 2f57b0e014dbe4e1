//! Connection registry
//!
//! Maps users to their live connection handles using DashMap for thread-safe access.
//! Pure in-memory state; presence observers are told when a user's first
//! connection arrives or their last one leaves.

use super::{Connection, ConnectionId};
use crate::events::{GatewayEventType, PresenceStatus};
use crate::protocol::GatewayMessage;
use dashmap::DashMap;
use parking_lot::RwLock;
use relay_core::Snowflake;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;

/// Receives online/offline transitions from the registry
///
/// Called after the registry has released its internal locks, so observers may
/// read the registry freely.
pub trait RegistryObserver: Send + Sync {
    fn on_transition(&self, user_id: Snowflake, status: PresenceStatus);
}

/// Result of removing a connection
#[derive(Debug, Clone)]
pub struct Unregistered {
    pub connection: Arc<Connection>,
    /// The user has no remaining connections
    pub went_offline: bool,
}

/// Registry of all live connections
pub struct ConnectionRegistry {
    /// Active connections by id
    connections: DashMap<ConnectionId, Arc<Connection>>,

    /// User ID to connection IDs mapping
    user_connections: DashMap<Snowflake, HashSet<ConnectionId>>,

    observers: RwLock<Vec<Weak<dyn RegistryObserver>>>,
}

impl ConnectionRegistry {
    /// Create a new connection registry
    #[must_use]
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            user_connections: DashMap::new(),
            observers: RwLock::new(Vec::new()),
        }
    }

    /// Create a new connection registry wrapped in Arc
    #[must_use]
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Subscribe to online/offline transitions
    ///
    /// Observers are held weakly and dropped once their owner is gone.
    pub fn subscribe(&self, observer: Weak<dyn RegistryObserver>) {
        self.observers.write().push(observer);
    }

    /// Register a new connection for a user
    ///
    /// Multiple connections per user are allowed.
    pub fn register(
        &self,
        user_id: Snowflake,
        sender: mpsc::Sender<GatewayMessage>,
    ) -> Arc<Connection> {
        let connection = Connection::new(user_id, sender);
        let connection_id = connection.id();
        self.connections.insert(connection_id, connection.clone());

        let first = {
            let mut sessions = self.user_connections.entry(user_id).or_default();
            sessions.insert(connection_id);
            sessions.len() == 1
        };

        tracing::debug!(
            session_id = %connection_id,
            user_id = %user_id,
            first,
            "Connection registered"
        );

        if first {
            self.notify(user_id, PresenceStatus::Online);
        }

        connection
    }

    /// Remove a connection
    ///
    /// Unknown ids are a no-op, so calling this twice is harmless.
    pub fn unregister(&self, connection_id: ConnectionId) -> Option<Unregistered> {
        let (_, connection) = self.connections.remove(&connection_id)?;
        let user_id = connection.user_id();

        // Atomically drop the id and clean up the entry once empty
        let went_offline = self
            .user_connections
            .remove_if_mut(&user_id, |_, sessions| {
                sessions.remove(&connection_id);
                sessions.is_empty()
            })
            .is_some();

        tracing::debug!(
            session_id = %connection_id,
            user_id = %user_id,
            went_offline,
            "Connection unregistered"
        );

        if went_offline {
            self.notify(user_id, PresenceStatus::Offline);
        }

        Some(Unregistered {
            connection,
            went_offline,
        })
    }

    /// Remove every connection whose outbound channel has closed
    pub fn sweep_closed(&self) -> Vec<Unregistered> {
        let closed: Vec<ConnectionId> = self
            .connections
            .iter()
            .filter(|r| r.is_closed())
            .map(|r| *r.key())
            .collect();

        let removed: Vec<Unregistered> = closed
            .into_iter()
            .filter_map(|id| self.unregister(id))
            .collect();

        if !removed.is_empty() {
            tracing::info!(count = removed.len(), "Swept closed connections");
        }

        removed
    }

    /// Get a connection by id
    pub fn connection(&self, connection_id: ConnectionId) -> Option<Arc<Connection>> {
        self.connections.get(&connection_id).map(|r| r.clone())
    }

    /// Connection ids of a user; empty when offline
    pub fn handles_for(&self, user_id: Snowflake) -> HashSet<ConnectionId> {
        self.user_connections
            .get(&user_id)
            .map(|sessions| sessions.value().clone())
            .unwrap_or_default()
    }

    /// Get all connections for a user
    fn connections_for(&self, user_id: Snowflake) -> Vec<Arc<Connection>> {
        self.handles_for(user_id)
            .into_iter()
            .filter_map(|id| self.connection(id))
            .collect()
    }

    /// A user is online while they have at least one connection
    pub fn is_online(&self, user_id: Snowflake) -> bool {
        self.user_connections.contains_key(&user_id)
    }

    /// All users with at least one connection
    pub fn online_users(&self) -> Vec<Snowflake> {
        self.user_connections.iter().map(|r| *r.key()).collect()
    }

    /// Send an event to all connections of a user
    pub fn send_to_user(&self, user_id: Snowflake, event: GatewayEventType, data: &Value) -> usize {
        let sent = self
            .connections_for(user_id)
            .iter()
            .filter(|conn| conn.dispatch(event, data.clone()))
            .count();

        tracing::trace!(
            user_id = %user_id,
            event = %event,
            sent = sent,
            "Event sent to user connections"
        );

        sent
    }

    /// Send an event to a single connection
    pub fn send_to_connection(
        &self,
        connection_id: ConnectionId,
        event: GatewayEventType,
        data: &Value,
    ) -> bool {
        self.connection(connection_id)
            .is_some_and(|conn| conn.dispatch(event, data.clone()))
    }

    /// Get the total number of active connections
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Get the number of unique online users
    pub fn user_count(&self) -> usize {
        self.user_connections.len()
    }

    fn notify(&self, user_id: Snowflake, status: PresenceStatus) {
        let observers: Vec<Arc<dyn RegistryObserver>> = {
            let mut observers = self.observers.write();
            observers.retain(|o| o.strong_count() > 0);
            observers.iter().filter_map(Weak::upgrade).collect()
        };

        for observer in observers {
            observer.on_transition(user_id, status);
        }
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("connections", &self.connections.len())
            .field("users", &self.user_connections.len())
            .finish()
    }
}
