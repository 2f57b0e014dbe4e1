//! Typing debouncer
//!
//! Keeps one timer per `(room, user)` typing state. Re-arming replaces the
//! existing timer, cancelling removes it without firing, and an expired timer
//! fires its callback exactly once. Each entry carries a generation number so a
//! timer that lost a race with `arm` or `cancel` never fires.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use relay_core::Snowflake;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Identifies a typing state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypingKey {
    pub room_id: Snowflake,
    pub user_id: Snowflake,
}

impl TypingKey {
    #[must_use]
    pub const fn new(room_id: Snowflake, user_id: Snowflake) -> Self {
        Self { room_id, user_id }
    }
}

struct TypingEntry {
    generation: u64,
    expires_at: Instant,
    timer: JoinHandle<()>,
}

/// Per-(room, user) typing timers
pub struct TypingDebouncer {
    entries: Arc<DashMap<TypingKey, TypingEntry>>,
    generation: AtomicU64,
}

impl TypingDebouncer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            generation: AtomicU64::new(0),
        }
    }

    /// Arm (or re-arm) the timer for `key`
    ///
    /// `on_expire` runs once if the timer elapses before another `arm` or a
    /// `cancel` for the same key. Returns `true` if no timer was active.
    /// Must be called from within a Tokio runtime.
    pub fn arm<F>(&self, key: TypingKey, ttl: Duration, on_expire: F) -> bool
    where
        F: FnOnce(TypingKey) + Send + 'static,
    {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let expires_at = Instant::now() + ttl;
        let entries = Arc::clone(&self.entries);

        // The slot stays locked until the new entry is stored, so the timer
        // cannot observe the map before its own generation is in place
        let slot = self.entries.entry(key);
        let timer = tokio::spawn(async move {
            tokio::time::sleep_until(expires_at).await;
            let expired = entries
                .remove_if(&key, |_, entry| entry.generation == generation)
                .is_some();
            if expired {
                on_expire(key);
            }
        });
        let armed = TypingEntry {
            generation,
            expires_at,
            timer,
        };

        match slot {
            Entry::Occupied(mut occupied) => {
                let previous = occupied.insert(armed);
                previous.timer.abort();
                let extended = expires_at.saturating_duration_since(previous.expires_at);
                tracing::trace!(
                    room_id = %key.room_id,
                    user_id = %key.user_id,
                    extended_ms = extended.as_millis() as u64,
                    "Typing re-armed"
                );
                false
            }
            Entry::Vacant(vacant) => {
                vacant.insert(armed);
                true
            }
        }
    }

    /// Remove the timer for `key` without firing
    ///
    /// Returns `true` if a timer was active.
    pub fn cancel(&self, key: TypingKey) -> bool {
        match self.entries.remove(&key) {
            Some((_, entry)) => {
                entry.timer.abort();
                true
            }
            None => false,
        }
    }

    /// Cancel every timer owned by a user, returning the cancelled keys
    pub fn cancel_user(&self, user_id: Snowflake) -> Vec<TypingKey> {
        let keys: Vec<TypingKey> = self
            .entries
            .iter()
            .filter(|r| r.key().user_id == user_id)
            .map(|r| *r.key())
            .collect();

        keys.into_iter().filter(|key| self.cancel(*key)).collect()
    }

    pub fn is_typing(&self, key: TypingKey) -> bool {
        self.entries.contains_key(&key)
    }

    /// When the typing state for `key` lapses, if active
    #[cfg(test)]
    pub(crate) fn expires_at(&self, key: TypingKey) -> Option<Instant> {
        self.entries.get(&key).map(|entry| entry.expires_at)
    }

    /// Users currently typing in a room
    #[cfg(test)]
    pub(crate) fn typing_in(&self, room_id: Snowflake) -> Vec<Snowflake> {
        self.entries
            .iter()
            .filter(|r| r.key().room_id == room_id)
            .map(|r| r.key().user_id)
            .collect()
    }

    /// Number of active typing states
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for TypingDebouncer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TypingDebouncer {
    fn drop(&mut self) {
        for entry in self.entries.iter() {
            entry.timer.abort();
        }
    }
}

impl std::fmt::Debug for TypingDebouncer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypingDebouncer")
            .field("active", &self.entries.len())
            .finish()
    }
}
