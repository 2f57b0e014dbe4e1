//! Gateway events
//!
//! Defines all dispatch events sent by the gateway to clients.

mod event_types;
mod payloads;

pub use event_types::GatewayEventType;
pub use payloads::{
    CommandRejectedEvent, ConversationEvent, ConversationPayload, MessageDeliveredEvent,
    MessagePayload, MessageReadEvent, PresenceChangedEvent, PresenceStatus, ReadyEvent,
    TypingEvent,
};
