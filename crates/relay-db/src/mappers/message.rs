//! Message entity <-> model mapper

use relay_core::entities::{Message, MessageKind, NewMessage};
use relay_core::value_objects::Snowflake;

use crate::models::MessageModel;

/// Convert MessageModel to Message entity
impl From<MessageModel> for Message {
    fn from(model: MessageModel) -> Self {
        Message {
            id: Snowflake::new(model.id),
            room_id: Snowflake::new(model.room_id),
            sender_id: Snowflake::new(model.sender_id),
            content: model.content,
            kind: MessageKind::from_str_lossy(&model.kind),
            created_at: model.created_at,
        }
    }
}

/// Message values prepared for insertion
pub struct MessageInsert<'a> {
    pub id: i64,
    pub room_id: i64,
    pub sender_id: i64,
    pub content: &'a str,
    pub kind: &'static str,
}

impl<'a> MessageInsert<'a> {
    pub fn new(id: Snowflake, message: &'a NewMessage) -> Self {
        Self {
            id: id.into_inner(),
            room_id: message.room_id.into_inner(),
            sender_id: message.sender_id.into_inner(),
            content: &message.content,
            kind: message.kind.as_str(),
        }
    }
}
