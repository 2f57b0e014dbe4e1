//! Outbound events and their audiences

use crate::connection::ConnectionId;
use crate::events::{
    CommandRejectedEvent, ConversationEvent, GatewayEventType, MessageDeliveredEvent,
    MessagePayload, MessageReadEvent, PresenceChangedEvent, TypingEvent,
};
use relay_core::Snowflake;
use serde::Serialize;
use serde_json::Value;

/// Event payload produced by the relay
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum RelayEvent {
    ConversationJoined(ConversationEvent),
    ConversationCreated(ConversationEvent),
    ConversationUpdated(ConversationEvent),
    NewMessage(MessagePayload),
    MessageDelivered(MessageDeliveredEvent),
    MessageRead(MessageReadEvent),
    UserTyping(TypingEvent),
    UserStoppedTyping(TypingEvent),
    PresenceChanged(PresenceChangedEvent),
    CommandRejected(CommandRejectedEvent),
}

impl RelayEvent {
    pub fn event_type(&self) -> GatewayEventType {
        match self {
            Self::ConversationJoined(_) => GatewayEventType::ConversationJoined,
            Self::ConversationCreated(_) => GatewayEventType::ConversationCreated,
            Self::ConversationUpdated(_) => GatewayEventType::ConversationUpdated,
            Self::NewMessage(_) => GatewayEventType::NewMessage,
            Self::MessageDelivered(_) => GatewayEventType::MessageDelivered,
            Self::MessageRead(_) => GatewayEventType::MessageRead,
            Self::UserTyping(_) => GatewayEventType::UserTyping,
            Self::UserStoppedTyping(_) => GatewayEventType::UserStoppedTyping,
            Self::PresenceChanged(_) => GatewayEventType::PresenceChanged,
            Self::CommandRejected(_) => GatewayEventType::CommandRejected,
        }
    }

    /// Serialize the payload into a dispatch `d` field
    pub fn to_value(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }
}

/// Who receives an outbound event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Audience {
    /// Every connection joined to the room, minus all connections of `exclude_user`
    Room {
        room_id: Snowflake,
        exclude_user: Option<Snowflake>,
    },
    /// Every live connection of each user
    Users(Vec<Snowflake>),
    /// A single connection
    Connection(ConnectionId),
}

/// An event paired with its audience
#[derive(Debug, Clone)]
pub struct OutboundEvent {
    pub event: RelayEvent,
    pub audience: Audience,
}

impl OutboundEvent {
    #[must_use]
    pub fn new(event: RelayEvent, audience: Audience) -> Self {
        Self { event, audience }
    }

    /// Room-scoped event for everyone joined except `exclude_user`
    #[must_use]
    pub fn to_room(event: RelayEvent, room_id: Snowflake, exclude_user: Option<Snowflake>) -> Self {
        Self::new(
            event,
            Audience::Room {
                room_id,
                exclude_user,
            },
        )
    }

    #[must_use]
    pub fn to_users(event: RelayEvent, users: impl IntoIterator<Item = Snowflake>) -> Self {
        Self::new(event, Audience::Users(users.into_iter().collect()))
    }

    #[must_use]
    pub fn to_connection(event: RelayEvent, connection_id: ConnectionId) -> Self {
        Self::new(event, Audience::Connection(connection_id))
    }
}
