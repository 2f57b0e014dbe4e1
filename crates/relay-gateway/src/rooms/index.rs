//! Room index
//!
//! Caches room membership and tracks which connections have joined which rooms.
//! A connection only receives room-scoped events while it has an active join,
//! and a join is only possible for a cached member of the room.
//!
//! A room stays cached only while some connection has joined it. Once the last
//! join goes, the entry is evicted and the next join reloads it from the
//! membership store.

use crate::connection::ConnectionId;
use dashmap::mapref::entry::Entry;
use dashmap::mapref::one::RefMut;
use dashmap::DashMap;
use relay_core::{Room, Snowflake};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;

/// Errors returned by [`RoomIndex`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoomIndexError {
    /// The room is not cached; fetch it from the membership store and retry
    #[error("Room {0} is not cached")]
    RoomNotFound(Snowflake),

    #[error("User {user_id} is not a member of room {room_id}")]
    Unauthorized { room_id: Snowflake, user_id: Snowflake },
}

/// A connection that has joined a room
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RoomJoin {
    pub connection_id: ConnectionId,
    pub user_id: Snowflake,
}

/// Room membership cache and join table
pub struct RoomIndex {
    /// Cached rooms by id
    rooms: DashMap<Snowflake, Arc<Room>>,

    /// Room ID to joined connections (and their users)
    joins: DashMap<Snowflake, HashMap<ConnectionId, Snowflake>>,

    /// Connection ID to joined room IDs
    connection_rooms: DashMap<ConnectionId, HashSet<Snowflake>>,
}

impl RoomIndex {
    #[must_use]
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
            joins: DashMap::new(),
            connection_rooms: DashMap::new(),
        }
    }

    #[must_use]
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Cache (or refresh) a room's membership
    ///
    /// Joins held by users who are no longer members are dropped; their
    /// connection ids are returned. A room left without joins stays cached
    /// until [`RoomIndex::release_if_idle`] is called.
    pub fn cache(&self, room: Room) -> (Arc<Room>, Vec<ConnectionId>) {
        let room = self.admit(room);
        let room_id = room.id;

        let mut dropped = Vec::new();
        if let Some(mut joined) = self.joins.get_mut(&room_id) {
            joined.retain(|connection_id, user_id| {
                let keep = room.has_member(*user_id);
                if !keep {
                    dropped.push(*connection_id);
                }
                keep
            });
        }
        self.joins.remove_if(&room_id, |_, joined| joined.is_empty());

        for connection_id in &dropped {
            self.forget_join(*connection_id, room_id);
        }

        if !dropped.is_empty() {
            tracing::debug!(
                room_id = %room_id,
                dropped = dropped.len(),
                "Dropped joins of removed members"
            );
        }

        (room, dropped)
    }

    /// Evict a room nobody has joined; returns `true` if an entry was removed
    pub fn release_if_idle(&self, room_id: Snowflake) -> bool {
        // The joins shard stays locked while the room is removed so a
        // concurrent join cannot land on an evicted room
        match self.joins.entry(room_id) {
            Entry::Occupied(joined) if !joined.get().is_empty() => false,
            Entry::Occupied(joined) => {
                let evicted = self.rooms.remove(&room_id).is_some();
                joined.remove();
                evicted
            }
            Entry::Vacant(_idle) => self.rooms.remove(&room_id).is_some(),
        }
    }

    /// Cached membership of a room
    pub fn members_of(&self, room_id: Snowflake) -> Result<Arc<Room>, RoomIndexError> {
        self.rooms
            .get(&room_id)
            .map(|r| r.clone())
            .ok_or(RoomIndexError::RoomNotFound(room_id))
    }

    /// Join a connection to a cached room
    ///
    /// Joining twice is harmless. Returns `true` if the join is new.
    pub fn join(
        &self,
        room_id: Snowflake,
        user_id: Snowflake,
        connection_id: ConnectionId,
    ) -> Result<bool, RoomIndexError> {
        let joined = self.joins.entry(room_id).or_default();
        let Some(room) = self.rooms.get(&room_id).map(|r| r.clone()) else {
            drop(joined);
            self.joins.remove_if(&room_id, |_, joined| joined.is_empty());
            return Err(RoomIndexError::RoomNotFound(room_id));
        };

        self.record_join(joined, &room, user_id, connection_id)
    }

    /// Cache a room fetched from the membership store and join it
    ///
    /// A cached snapshot with a newer `updated_at` wins over `room`.
    pub fn join_loaded(
        &self,
        room: Room,
        user_id: Snowflake,
        connection_id: ConnectionId,
    ) -> Result<(Arc<Room>, bool), RoomIndexError> {
        let room_id = room.id;
        let joined = self.joins.entry(room_id).or_default();
        let room = self.admit(room);

        let inserted = self.record_join(joined, &room, user_id, connection_id);
        if inserted.is_err() {
            self.release_if_idle(room_id);
        }
        Ok((room, inserted?))
    }

    /// Remove a connection's join; unknown pairs are a no-op
    ///
    /// Returns `true` if a join was removed.
    pub fn leave(&self, room_id: Snowflake, connection_id: ConnectionId) -> bool {
        let removed = self
            .joins
            .get_mut(&room_id)
            .is_some_and(|mut joined| joined.remove(&connection_id).is_some());

        self.forget_join(connection_id, room_id);
        if removed {
            self.release_if_idle(room_id);
        }
        removed
    }

    /// Drop every join held by a connection, returning the rooms it had joined
    pub fn leave_all(&self, connection_id: ConnectionId) -> Vec<Snowflake> {
        let rooms: Vec<Snowflake> = self
            .connection_rooms
            .remove(&connection_id)
            .map(|(_, rooms)| rooms.into_iter().collect())
            .unwrap_or_default();

        for room_id in &rooms {
            if let Some(mut joined) = self.joins.get_mut(room_id) {
                joined.remove(&connection_id);
            }
            self.release_if_idle(*room_id);
        }

        rooms
    }

    /// Check if a connection has joined a room
    pub fn is_joined(&self, room_id: Snowflake, connection_id: ConnectionId) -> bool {
        self.joins
            .get(&room_id)
            .is_some_and(|joined| joined.contains_key(&connection_id))
    }

    /// All connections currently joined to a room
    pub fn joined_connections(&self, room_id: Snowflake) -> Vec<RoomJoin> {
        self.joins
            .get(&room_id)
            .map(|joined| {
                joined
                    .iter()
                    .map(|(connection_id, user_id)| RoomJoin {
                        connection_id: *connection_id,
                        user_id: *user_id,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Rooms a connection has joined
    pub fn rooms_of(&self, connection_id: ConnectionId) -> Vec<Snowflake> {
        self.connection_rooms
            .get(&connection_id)
            .map(|rooms| rooms.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Check if any of a user's connections has joined a room
    pub fn is_user_joined(&self, room_id: Snowflake, user_id: Snowflake) -> bool {
        self.joins
            .get(&room_id)
            .is_some_and(|joined| joined.values().any(|u| *u == user_id))
    }

    /// Number of cached rooms
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Insert `room` unless the cached copy is newer; returns the cached copy
    fn admit(&self, room: Room) -> Arc<Room> {
        match self.rooms.entry(room.id) {
            Entry::Occupied(cached) if cached.get().updated_at > room.updated_at => {
                tracing::trace!(room_id = %room.id, "Kept newer cached room");
                cached.get().clone()
            }
            Entry::Occupied(mut cached) => {
                let room = Arc::new(room);
                cached.insert(room.clone());
                room
            }
            Entry::Vacant(vacant) => vacant.insert(Arc::new(room)).clone(),
        }
    }

    /// Record a join while the room's join entry is locked
    fn record_join(
        &self,
        mut joined: RefMut<'_, Snowflake, HashMap<ConnectionId, Snowflake>>,
        room: &Room,
        user_id: Snowflake,
        connection_id: ConnectionId,
    ) -> Result<bool, RoomIndexError> {
        let room_id = room.id;
        if !room.has_member(user_id) {
            let idle = joined.is_empty();
            drop(joined);
            if idle {
                self.joins.remove_if(&room_id, |_, joined| joined.is_empty());
            }
            return Err(RoomIndexError::Unauthorized { room_id, user_id });
        }

        let inserted = joined.insert(connection_id, user_id).is_none();
        self.connection_rooms
            .entry(connection_id)
            .or_default()
            .insert(room_id);
        drop(joined);

        if inserted {
            tracing::trace!(
                room_id = %room_id,
                user_id = %user_id,
                session_id = %connection_id,
                "Connection joined room"
            );
        }

        Ok(inserted)
    }

    fn forget_join(&self, connection_id: ConnectionId, room_id: Snowflake) {
        self.connection_rooms.alter(&connection_id, |_, mut rooms| {
            rooms.remove(&room_id);
            rooms
        });
        self.connection_rooms
            .remove_if(&connection_id, |_, rooms| rooms.is_empty());
    }
}

impl Default for RoomIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RoomIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomIndex")
            .field("rooms", &self.rooms.len())
            .field("joined_rooms", &self.joins.len())
            .finish()
    }
}
