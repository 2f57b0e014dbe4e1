//! Relay dispatcher
//!
//! The control surface of the relay. Each operation validates the caller
//! against the room index and registry, persists through the store traits when
//! needed, and only then fans out. No fan-out happens for a command that fails
//! validation or persistence.

use super::delivery::Delivery;
use super::error::{RelayError, RelayResult};
use super::outbound::{OutboundEvent, RelayEvent};
use crate::connection::{Connection, ConnectionId, ConnectionRegistry, Unregistered};
use crate::events::{
    ConversationEvent, MessageDeliveredEvent, MessagePayload, MessageReadEvent, ReadyEvent,
    TypingEvent,
};
use crate::presence::PresenceTracker;
use crate::protocol::GatewayMessage;
use crate::rooms::{RoomIndex, RoomIndexError};
use crate::typing::{TypingDebouncer, TypingKey};
use relay_common::RelayConfig;
use relay_core::{
    ConversationStore, ConversationUpdate, DomainError, MembershipStore, Message, MessageKind,
    MessageStore, NewConversation, NewMessage, ReadReceipt, Room, RoomKind, Snowflake,
};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// The persistence collaborators used by the relay
#[derive(Clone)]
pub struct RelayStores {
    pub membership: Arc<dyn MembershipStore>,
    pub messages: Arc<dyn MessageStore>,
    pub conversations: Arc<dyn ConversationStore>,
}

impl RelayStores {
    /// Use one backend for all three stores
    pub fn shared<S>(store: Arc<S>) -> Self
    where
        S: MembershipStore + MessageStore + ConversationStore + 'static,
    {
        Self {
            membership: store.clone(),
            messages: store.clone(),
            conversations: store,
        }
    }
}

impl std::fmt::Debug for RelayStores {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayStores").finish_non_exhaustive()
    }
}

/// Relay tuning knobs
#[derive(Debug, Clone, Copy)]
pub struct RelaySettings {
    pub typing_ttl: Duration,
    pub max_content_length: usize,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self::from(&RelayConfig::default())
    }
}

impl From<&RelayConfig> for RelaySettings {
    fn from(config: &RelayConfig) -> Self {
        Self {
            typing_ttl: config.typing_ttl(),
            max_content_length: config.max_content_length,
        }
    }
}

/// Snapshot of relay state, served on `/health/stats`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RelayStats {
    pub connections: usize,
    pub users: usize,
    pub rooms: usize,
    pub typing: usize,
    pub presence_transitions: u64,
}

/// Relays chat events between live connections
pub struct RelayDispatcher {
    registry: Arc<ConnectionRegistry>,
    rooms: Arc<RoomIndex>,
    presence: Arc<PresenceTracker>,
    typing: TypingDebouncer,
    delivery: Delivery,
    stores: RelayStores,
    settings: RelaySettings,
}

impl RelayDispatcher {
    #[must_use]
    pub fn new(stores: RelayStores, settings: RelaySettings) -> Self {
        let registry = ConnectionRegistry::new_shared();
        let rooms = RoomIndex::new_shared();
        let presence = PresenceTracker::attach(registry.clone());
        let delivery = Delivery::new(registry.clone(), rooms.clone());

        Self {
            registry,
            rooms,
            presence,
            typing: TypingDebouncer::new(),
            delivery,
            stores,
            settings,
        }
    }

    #[must_use]
    pub fn new_shared(stores: RelayStores, settings: RelaySettings) -> Arc<Self> {
        Arc::new(Self::new(stores, settings))
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn rooms(&self) -> &Arc<RoomIndex> {
        &self.rooms
    }

    pub fn presence(&self) -> &Arc<PresenceTracker> {
        &self.presence
    }

    pub fn typing(&self) -> &TypingDebouncer {
        &self.typing
    }

    pub fn settings(&self) -> RelaySettings {
        self.settings
    }

    // === Connection lifecycle ===

    /// Register an identified connection and build its READY snapshot
    pub fn connect(
        &self,
        user_id: Snowflake,
        sender: mpsc::Sender<GatewayMessage>,
    ) -> (Arc<Connection>, ReadyEvent) {
        let connection = self.registry.register(user_id, sender);

        let mut online_user_ids = self.presence.current_online_users();
        online_user_ids.sort_unstable();

        let ready = ReadyEvent {
            v: 1,
            user_id,
            session_id: connection.id().to_string(),
            online_user_ids,
        };

        (connection, ready)
    }

    /// Tear down a connection
    ///
    /// Drops its joins and, when it was the user's last connection, clears the
    /// user's typing states. Unknown ids are a no-op.
    pub fn disconnect(&self, connection_id: ConnectionId) -> bool {
        match self.registry.unregister(connection_id) {
            Some(removed) => {
                self.release(&removed);
                true
            }
            None => false,
        }
    }

    /// Tear down every connection whose outbound channel has closed
    pub fn sweep_closed(&self) -> usize {
        let removed = self.registry.sweep_closed();
        for unregistered in &removed {
            self.release(unregistered);
        }
        removed.len()
    }

    fn release(&self, removed: &Unregistered) {
        let connection_id = removed.connection.id();
        let user_id = removed.connection.user_id();
        let left = self.rooms.leave_all(connection_id);

        let mut stopped = 0;
        if removed.went_offline {
            for key in self.typing.cancel_user(user_id) {
                self.delivery.deliver(&stopped_typing(key));
                stopped += 1;
            }
        }

        tracing::debug!(
            session_id = %connection_id,
            user_id = %user_id,
            rooms = left.len(),
            stopped_typing = stopped,
            "Connection released"
        );
    }

    // === Joins ===

    /// Join a connection to a room, loading the room on a cache miss
    pub async fn join_conversation(
        &self,
        connection: &Connection,
        room_id: Snowflake,
    ) -> RelayResult<Arc<Room>> {
        let user_id = connection.user_id();

        let room = match self.rooms.join(room_id, user_id, connection.id()) {
            Ok(_) => self.rooms.members_of(room_id)?,
            Err(RoomIndexError::RoomNotFound(_)) => {
                let loaded = self.stores.membership.get_room(room_id).await?;
                let (room, _) = self.rooms.join_loaded(loaded, user_id, connection.id())?;

                // The socket may have been released while the room was loading
                if self.registry.connection(connection.id()).is_none() {
                    self.rooms.leave(room_id, connection.id());
                    tracing::debug!(
                        session_id = %connection.id(),
                        room_id = %room_id,
                        "Connection closed during join"
                    );
                    return Ok(room);
                }
                room
            }
            Err(e) => return Err(e.into()),
        };

        tracing::debug!(
            session_id = %connection.id(),
            user_id = %user_id,
            room_id = %room_id,
            "Joined conversation"
        );

        Ok(room)
    }

    /// Leave a room; leaving a room that was never joined is a no-op
    pub fn leave_conversation(&self, connection: &Connection, room_id: Snowflake) -> bool {
        let user_id = connection.user_id();
        let left = self.rooms.leave(room_id, connection.id());

        // Typing requires a joined connection
        if left && !self.rooms.is_user_joined(room_id, user_id) {
            self.clear_typing(TypingKey::new(room_id, user_id));
        }

        left
    }

    // === Messages ===

    /// Persist a message and relay it to the room
    pub async fn send_message(
        &self,
        connection: &Connection,
        room_id: Snowflake,
        content: String,
        kind: MessageKind,
        nonce: Option<String>,
    ) -> RelayResult<Message> {
        let sender_id = connection.user_id();

        if content.trim().is_empty() {
            return Err(RelayError::InvalidPayload(
                "Message content cannot be empty".to_string(),
            ));
        }
        if content.chars().count() > self.settings.max_content_length {
            return Err(RelayError::InvalidPayload(format!(
                "Message content exceeds {} characters",
                self.settings.max_content_length
            )));
        }
        if !self.rooms.is_joined(room_id, connection.id()) {
            return Err(RelayError::NotAMember(room_id));
        }

        let message = self
            .stores
            .messages
            .append(NewMessage {
                room_id,
                sender_id,
                content,
                kind,
            })
            .await?;

        self.clear_typing(TypingKey::new(room_id, sender_id));

        let sent = self.delivery.deliver(&OutboundEvent::to_room(
            RelayEvent::NewMessage(MessagePayload::from(&message)),
            room_id,
            Some(sender_id),
        ));

        self.delivery.deliver(&OutboundEvent::to_users(
            RelayEvent::MessageDelivered(MessageDeliveredEvent {
                message_id: message.id,
                room_id,
                created_at: message.created_at,
                nonce,
            }),
            [sender_id],
        ));

        tracing::debug!(
            message_id = %message.id,
            room_id = %room_id,
            user_id = %sender_id,
            sent = sent,
            chars = message.content.chars().count(),
            "Message relayed"
        );

        Ok(message)
    }

    /// Record read receipts and notify each message's author
    ///
    /// Unknown message ids are skipped; receipts that already existed are not
    /// announced again.
    pub async fn mark_read(
        &self,
        connection: &Connection,
        room_id: Snowflake,
        message_ids: &[Snowflake],
    ) -> RelayResult<Vec<ReadReceipt>> {
        let reader_id = connection.user_id();
        if !self.rooms.is_joined(room_id, connection.id()) {
            return Err(RelayError::NotAMember(room_id));
        }

        let mut seen = HashSet::new();
        let mut receipts = Vec::new();

        for message_id in message_ids.iter().copied().filter(|id| seen.insert(*id)) {
            match self
                .stores
                .messages
                .mark_read(room_id, message_id, reader_id)
                .await
            {
                Ok(Some(receipt)) => {
                    if receipt.sender_id != reader_id {
                        self.delivery.deliver(&OutboundEvent::to_users(
                            RelayEvent::MessageRead(MessageReadEvent::from(&receipt)),
                            [receipt.sender_id],
                        ));
                    }
                    receipts.push(receipt);
                }
                Ok(None) => {}
                Err(DomainError::MessageNotFound(_)) => {
                    tracing::warn!(
                        message_id = %message_id,
                        room_id = %room_id,
                        "Read receipt for unknown message ignored"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(receipts)
    }

    // === Typing ===

    /// Start (or refresh) the caller's typing indicator
    pub fn typing_start(&self, connection: &Connection, room_id: Snowflake) -> RelayResult<()> {
        if !self.rooms.is_joined(room_id, connection.id()) {
            return Err(RelayError::NotAMember(room_id));
        }

        let key = TypingKey::new(room_id, connection.user_id());
        let delivery = self.delivery.clone();
        self.typing.arm(key, self.settings.typing_ttl, move |key| {
            let sent = delivery.deliver(&stopped_typing(key));
            tracing::trace!(
                room_id = %key.room_id,
                user_id = %key.user_id,
                sent = sent,
                "Typing expired"
            );
        });

        self.delivery.deliver(&OutboundEvent::to_room(
            RelayEvent::UserTyping(TypingEvent {
                room_id,
                user_id: key.user_id,
            }),
            room_id,
            Some(key.user_id),
        ));

        Ok(())
    }

    /// Stop the caller's typing indicator; returns `false` if it was not active
    pub fn typing_stop(&self, connection: &Connection, room_id: Snowflake) -> bool {
        self.clear_typing(TypingKey::new(room_id, connection.user_id()))
    }

    fn clear_typing(&self, key: TypingKey) -> bool {
        if !self.typing.cancel(key) {
            return false;
        }
        self.delivery.deliver(&stopped_typing(key));
        true
    }

    // === Conversations ===

    /// Create a conversation and join every live participant connection
    pub async fn create_conversation(
        &self,
        connection: &Connection,
        kind: RoomKind,
        participant_ids: &[Snowflake],
        name: Option<String>,
        nonce: Option<String>,
    ) -> RelayResult<Arc<Room>> {
        let creator_id = connection.user_id();
        let mut participants: HashSet<Snowflake> = participant_ids
            .iter()
            .copied()
            .filter(|id| *id != creator_id)
            .collect();

        let name = match kind {
            RoomKind::Direct => {
                if participants.len() != 1 {
                    return Err(RelayError::InvalidParticipants(
                        "Direct conversations need exactly one other participant".to_string(),
                    ));
                }
                None
            }
            RoomKind::Group => {
                if participants.is_empty() {
                    return Err(RelayError::InvalidParticipants(
                        "Group conversations need at least one other participant".to_string(),
                    ));
                }
                Some(group_name(name)?)
            }
        };
        participants.insert(creator_id);

        let room = self
            .stores
            .conversations
            .create(NewConversation {
                creator_id,
                kind,
                name,
                participants,
            })
            .await?;

        let (room, _) = self.rooms.cache(room);
        let joined = self.join_online_members(&room, room.members.iter().copied());
        self.rooms.release_if_idle(room.id);

        self.announce(
            RelayEvent::ConversationCreated,
            &room,
            room.members.iter().copied(),
            creator_id,
            nonce,
        );

        tracing::info!(
            room_id = %room.id,
            user_id = %creator_id,
            kind = room.kind.as_str(),
            members = room.member_count(),
            joined = joined,
            "Conversation created"
        );

        Ok(room)
    }

    /// Rename a group or change its members
    pub async fn update_conversation(
        &self,
        connection: &Connection,
        room_id: Snowflake,
        name: Option<String>,
        add_user_ids: &[Snowflake],
        remove_user_ids: &[Snowflake],
        nonce: Option<String>,
    ) -> RelayResult<Arc<Room>> {
        let user_id = connection.user_id();
        let current = self.room(room_id).await?;

        if !current.kind.is_group() {
            return Err(RelayError::InvalidParticipants(
                "Only group conversations can be updated".to_string(),
            ));
        }
        if !current.has_member(user_id) {
            return Err(RelayError::NotAMember(room_id));
        }

        let update = ConversationUpdate {
            room_id,
            name: name.map(|n| group_name(Some(n))).transpose()?,
            add_user_ids: add_user_ids.iter().copied().collect(),
            remove_user_ids: remove_user_ids.iter().copied().collect(),
        };
        if update.is_empty() {
            return Err(RelayError::InvalidPayload("Nothing to update".to_string()));
        }
        if !update.add_user_ids.is_disjoint(&update.remove_user_ids) {
            return Err(RelayError::InvalidPayload(
                "A user cannot be both added and removed".to_string(),
            ));
        }

        let remaining = current
            .members
            .iter()
            .filter(|id| !update.remove_user_ids.contains(*id))
            .chain(update.add_user_ids.iter())
            .collect::<HashSet<_>>()
            .len();
        if remaining < 2 {
            return Err(RelayError::InvalidParticipants(
                "A group needs at least two members".to_string(),
            ));
        }

        let updated = self.stores.conversations.update(update).await?;
        let (room, dropped) = self.rooms.cache(updated);

        for removed in current.members.difference(&room.members) {
            self.clear_typing(TypingKey::new(room_id, *removed));
        }
        let added: Vec<Snowflake> = room.members.difference(&current.members).copied().collect();
        let joined = self.join_online_members(&room, added.iter().copied());
        self.rooms.release_if_idle(room_id);

        let audience: HashSet<Snowflake> = current.members.union(&room.members).copied().collect();
        self.announce(
            RelayEvent::ConversationUpdated,
            &room,
            audience,
            user_id,
            nonce,
        );

        tracing::info!(
            room_id = %room_id,
            user_id = %user_id,
            added = added.len(),
            dropped_joins = dropped.len(),
            joined = joined,
            "Conversation updated"
        );

        Ok(room)
    }

    // === Stats ===

    pub fn stats(&self) -> RelayStats {
        RelayStats {
            connections: self.registry.connection_count(),
            users: self.registry.user_count(),
            rooms: self.rooms.room_count(),
            typing: self.typing.len(),
            presence_transitions: self.presence.transition_count(),
        }
    }

    // === Helpers ===

    /// Cached room, or a fresh read from the membership store
    ///
    /// A room read here is not cached; only joins keep a room in the index.
    async fn room(&self, room_id: Snowflake) -> RelayResult<Arc<Room>> {
        match self.rooms.members_of(room_id) {
            Ok(room) => Ok(room),
            Err(_) => Ok(Arc::new(self.stores.membership.get_room(room_id).await?)),
        }
    }

    /// Join every live connection of the given members
    fn join_online_members(&self, room: &Room, members: impl Iterator<Item = Snowflake>) -> usize {
        members
            .flat_map(|user_id| {
                self.registry
                    .handles_for(user_id)
                    .into_iter()
                    .map(move |connection_id| (user_id, connection_id))
            })
            .filter(|(user_id, connection_id)| {
                matches!(self.rooms.join(room.id, *user_id, *connection_id), Ok(true))
            })
            .count()
    }

    /// Send a conversation event to an audience, echoing `nonce` to the requester only
    fn announce(
        &self,
        event: fn(ConversationEvent) -> RelayEvent,
        room: &Room,
        audience: impl IntoIterator<Item = Snowflake>,
        requester: Snowflake,
        nonce: Option<String>,
    ) {
        let others: Vec<Snowflake> = audience.into_iter().filter(|id| *id != requester).collect();

        self.delivery.deliver_all(&[
            OutboundEvent::to_users(event(ConversationEvent::new(room, None)), others),
            OutboundEvent::to_users(event(ConversationEvent::new(room, nonce)), [requester]),
        ]);
    }
}

impl std::fmt::Debug for RelayDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayDispatcher")
            .field("registry", &self.registry)
            .field("rooms", &self.rooms)
            .field("typing", &self.typing)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

fn stopped_typing(key: TypingKey) -> OutboundEvent {
    OutboundEvent::to_room(
        RelayEvent::UserStoppedTyping(TypingEvent {
            room_id: key.room_id,
            user_id: key.user_id,
        }),
        key.room_id,
        Some(key.user_id),
    )
}

/// Trimmed, non-empty group name
fn group_name(name: Option<String>) -> RelayResult<String> {
    name.map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .ok_or(RelayError::MissingGroupName)
}
