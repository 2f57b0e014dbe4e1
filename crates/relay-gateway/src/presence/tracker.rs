//! Presence tracking
//!
//! The online set is derived from the connection registry; this module only
//! turns registry transitions into `PRESENCE_CHANGED` broadcasts.

use crate::connection::{ConnectionRegistry, RegistryObserver};
use crate::events::{PresenceChangedEvent, PresenceStatus};
use crate::relay::RelayEvent;
use relay_core::Snowflake;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Broadcasts online/offline transitions
///
/// The audience of a transition is every live connection of every other
/// online user.
pub struct PresenceTracker {
    registry: Arc<ConnectionRegistry>,
    transitions: AtomicU64,
}

impl PresenceTracker {
    /// Create a tracker subscribed to `registry`
    #[must_use]
    pub fn attach(registry: Arc<ConnectionRegistry>) -> Arc<Self> {
        let tracker = Arc::new(Self {
            registry: registry.clone(),
            transitions: AtomicU64::new(0),
        });

        let observer = Arc::downgrade(&tracker);
        registry.subscribe(observer);
        tracker
    }

    /// Users with at least one live connection
    pub fn current_online_users(&self) -> Vec<Snowflake> {
        self.registry.online_users()
    }

    pub fn is_online(&self, user_id: Snowflake) -> bool {
        self.registry.is_online(user_id)
    }

    /// Number of transitions broadcast since start-up
    pub fn transition_count(&self) -> u64 {
        self.transitions.load(Ordering::Relaxed)
    }

    fn broadcast(&self, user_id: Snowflake, status: PresenceStatus) -> usize {
        let event = RelayEvent::PresenceChanged(PresenceChangedEvent { user_id, status });
        let event_type = event.event_type();
        let data = match event.to_value() {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to serialize presence event");
                return 0;
            }
        };

        self.registry
            .online_users()
            .into_iter()
            .filter(|other| *other != user_id)
            .map(|other| {
                self.registry.send_to_user(other, event_type, &data)
            })
            .sum()
    }
}

impl RegistryObserver for PresenceTracker {
    fn on_transition(&self, user_id: Snowflake, status: PresenceStatus) {
        self.transitions.fetch_add(1, Ordering::Relaxed);
        let sent = self.broadcast(user_id, status);

        tracing::debug!(
            user_id = %user_id,
            status = ?status,
            sent = sent,
            "Presence changed"
        );
    }
}

impl std::fmt::Debug for PresenceTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresenceTracker")
            .field("online", &self.registry.user_count())
            .field("transitions", &self.transition_count())
            .finish()
    }
}
