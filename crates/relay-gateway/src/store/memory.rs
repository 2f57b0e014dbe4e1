//! In-memory store backend
//!
//! Used when no database is configured, and by tests. Implements the same
//! contracts as the PostgreSQL repositories: direct rooms are reused,
//! message ids increase in append order, and a receipt is recorded once.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use relay_core::{
    ConversationStore, ConversationUpdate, DomainError, MembershipStore, Message, MessageStore,
    NewConversation, NewMessage, ReadReceipt, RepoResult, Room, RoomKind, Snowflake,
    SnowflakeGenerator,
};
use std::sync::Arc;

/// Process-local implementation of all relay stores
pub struct InMemoryStore {
    ids: SnowflakeGenerator,
    rooms: DashMap<Snowflake, Room>,
    messages: DashMap<Snowflake, Message>,
    /// (message, reader) to read time
    reads: DashMap<(Snowflake, Snowflake), DateTime<Utc>>,
    /// Serializes conversation creation so direct rooms are never duplicated
    create_lock: Mutex<()>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new(worker_id: u16) -> Self {
        Self {
            ids: SnowflakeGenerator::new(worker_id),
            rooms: DashMap::new(),
            messages: DashMap::new(),
            reads: DashMap::new(),
            create_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn new_shared(worker_id: u16) -> Arc<Self> {
        Arc::new(Self::new(worker_id))
    }

    /// Insert or replace a room as-is
    #[cfg(test)]
    pub(crate) fn insert_room(&self, room: Room) {
        self.rooms.insert(room.id, room);
    }

    /// Messages of a room in append order
    #[cfg(test)]
    pub(crate) fn messages_in(&self, room_id: Snowflake) -> Vec<Message> {
        let mut messages: Vec<Message> = self
            .messages
            .iter()
            .filter(|r| r.room_id == room_id)
            .map(|r| r.value().clone())
            .collect();
        messages.sort_by_key(|m| m.id);
        messages
    }

    #[cfg(test)]
    pub(crate) fn room_count(&self) -> usize {
        self.rooms.len()
    }

    fn find_direct(&self, participants: &std::collections::HashSet<Snowflake>) -> Option<Room> {
        self.rooms
            .iter()
            .find(|r| r.kind == RoomKind::Direct && r.members == *participants)
            .map(|r| r.value().clone())
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new(0)
    }
}

impl std::fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStore")
            .field("rooms", &self.rooms.len())
            .field("messages", &self.messages.len())
            .field("reads", &self.reads.len())
            .finish()
    }
}

#[async_trait]
impl MembershipStore for InMemoryStore {
    async fn get_room(&self, room_id: Snowflake) -> RepoResult<Room> {
        self.rooms
            .get(&room_id)
            .map(|r| r.value().clone())
            .ok_or(DomainError::RoomNotFound(room_id))
    }
}

#[async_trait]
impl MessageStore for InMemoryStore {
    async fn append(&self, message: NewMessage) -> RepoResult<Message> {
        if !self.rooms.contains_key(&message.room_id) {
            return Err(DomainError::RoomNotFound(message.room_id));
        }

        let message = Message {
            id: self.ids.generate(),
            room_id: message.room_id,
            sender_id: message.sender_id,
            content: message.content,
            kind: message.kind,
            created_at: Utc::now(),
        };
        self.messages.insert(message.id, message.clone());

        Ok(message)
    }

    async fn mark_read(
        &self,
        room_id: Snowflake,
        message_id: Snowflake,
        reader_id: Snowflake,
    ) -> RepoResult<Option<ReadReceipt>> {
        let sender_id = self
            .messages
            .get(&message_id)
            .filter(|m| m.room_id == room_id)
            .map(|m| m.sender_id)
            .ok_or(DomainError::MessageNotFound(message_id))?;

        match self.reads.entry((message_id, reader_id)) {
            Entry::Occupied(_) => Ok(None),
            Entry::Vacant(vacant) => {
                let read_at = Utc::now();
                vacant.insert(read_at);
                Ok(Some(ReadReceipt {
                    message_id,
                    room_id,
                    sender_id,
                    reader_id,
                    read_at,
                }))
            }
        }
    }
}

#[async_trait]
impl ConversationStore for InMemoryStore {
    async fn create(&self, conversation: NewConversation) -> RepoResult<Room> {
        let _guard = self.create_lock.lock();

        if conversation.kind == RoomKind::Direct {
            if let Some(existing) = self.find_direct(&conversation.participants) {
                return Ok(existing);
            }
        }

        let room = Room::new(
            self.ids.generate(),
            conversation.kind,
            conversation.name,
            conversation.creator_id,
            conversation.participants,
        );
        self.rooms.insert(room.id, room.clone());

        Ok(room)
    }

    async fn update(&self, update: ConversationUpdate) -> RepoResult<Room> {
        let mut room = self
            .rooms
            .get_mut(&update.room_id)
            .ok_or(DomainError::RoomNotFound(update.room_id))?;

        if let Some(name) = update.name {
            room.name = Some(name);
        }
        for user_id in &update.remove_user_ids {
            room.members.remove(user_id);
        }
        room.members.extend(update.add_user_ids);
        room.updated_at = Utc::now();

        Ok(room.clone())
    }
}
