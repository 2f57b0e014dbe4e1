//! Heartbeat handler (op 1)

use super::{HandlerError, HandlerResult};
use crate::connection::Session;
use crate::protocol::{CloseCode, GatewayMessage};

/// Handles heartbeat messages
pub struct HeartbeatHandler;

impl HeartbeatHandler {
    /// Handle a heartbeat from the client
    ///
    /// Accepted before and after Identify.
    pub async fn handle(session: &Session) -> HandlerResult<Option<CloseCode>> {
        session.record_heartbeat();

        tracing::trace!(
            session_id = ?session.connection().map(|c| c.id()),
            server_seq = session.connection().map(|c| c.current_sequence()),
            "Heartbeat received"
        );

        if let Err(e) = session.send(GatewayMessage::heartbeat_ack()).await {
            tracing::warn!(error = %e, "Failed to send heartbeat ACK");
            return Err(HandlerError::Internal(
                "Failed to send heartbeat ACK".to_string(),
            ));
        }

        Ok(None)
    }
}
