//! Gateway protocol definitions
//!
//! Defines the WebSocket protocol including op codes, frame format, commands and close codes.

mod close_codes;
mod commands;
mod messages;
mod opcodes;
mod payloads;

pub use close_codes::CloseCode;
pub use commands::{
    Command, CommandError, CommandType, CreateConversationPayload, MarkReadPayload, RoomPayload,
    SendMessagePayload, UpdateConversationPayload,
};
pub use messages::GatewayMessage;
pub use opcodes::OpCode;
pub use payloads::{HelloPayload, IdentifyPayload, DEFAULT_HEARTBEAT_INTERVAL};
