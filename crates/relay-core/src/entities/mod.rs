//! Domain entities - rooms, messages and read receipts

mod message;
mod room;

pub use message::{Message, MessageKind, NewMessage, ReadReceipt};
pub use room::{ConversationUpdate, NewConversation, Room, RoomKind};
