//! Op code handlers
//!
//! Handles incoming WebSocket messages based on their operation code.

mod command;
mod error;
mod heartbeat;
mod identify;

pub use command::CommandHandler;
pub use error::{HandlerError, HandlerResult};
pub use heartbeat::HeartbeatHandler;
pub use identify::IdentifyHandler;

use crate::connection::Session;
use crate::protocol::{CloseCode, GatewayMessage, OpCode};
use crate::server::GatewayState;
use std::sync::Arc;

/// Dispatch incoming client messages to appropriate handlers
pub struct MessageDispatcher;

impl MessageDispatcher {
    /// Handle an incoming client message
    ///
    /// `Ok(Some(code))` asks the caller to close the socket with `code`.
    pub async fn dispatch(
        state: &GatewayState,
        session: &Arc<Session>,
        message: GatewayMessage,
    ) -> HandlerResult<Option<CloseCode>> {
        // Validate that this is a client-sendable op code
        if !message.op.is_client_op() {
            tracing::warn!(op = %message.op, "Received server-only op code from client");
            return Ok(Some(CloseCode::UnknownOpcode));
        }

        match message.op {
            OpCode::Heartbeat => HeartbeatHandler::handle(session).await,
            OpCode::Identify => {
                let payload = message.as_identify().ok_or_else(|| {
                    HandlerError::InvalidPayload("Invalid Identify payload".to_string())
                })?;

                IdentifyHandler::handle(state, session, payload).await
            }
            OpCode::Command => {
                let connection = session.connection().ok_or(HandlerError::NotAuthenticated)?;
                let (name, data) = message.into_command().ok_or_else(|| {
                    HandlerError::InvalidPayload("Command frame without a name".to_string())
                })?;

                CommandHandler::handle(state, connection, &name, data).await
            }
            // These ops should never reach here due to is_client_op check
            _ => {
                tracing::error!(op = %message.op, "Unhandled client op code");
                Ok(Some(CloseCode::UnknownOpcode))
            }
        }
    }
}
