//! Identify handler (op 2)

use super::{HandlerError, HandlerResult};
use crate::connection::Session;
use crate::events::GatewayEventType;
use crate::protocol::{CloseCode, IdentifyPayload};
use crate::server::GatewayState;
use std::sync::Arc;

/// Handles Identify messages
pub struct IdentifyHandler;

impl IdentifyHandler {
    /// Authenticate the session and register its connection
    pub async fn handle(
        state: &GatewayState,
        session: &Arc<Session>,
        payload: IdentifyPayload,
    ) -> HandlerResult<Option<CloseCode>> {
        if session.is_identified() {
            tracing::warn!("Client sent Identify while already authenticated");
            return Ok(Some(CloseCode::AlreadyAuthenticated));
        }

        // Extract token (remove "Bearer " prefix if present)
        let token = payload.token.strip_prefix("Bearer ").unwrap_or(&payload.token);

        let user_id = state.jwt().authenticate(token).map_err(|e| {
            tracing::debug!(error = %e, "Token validation failed");
            HandlerError::AuthenticationFailed(e.to_string())
        })?;

        let (connection, ready) = state.relay().connect(user_id, session.sender());
        if let Err(rejected) = session.bind(connection.clone()) {
            state.relay().disconnect(rejected.id());
            return Err(HandlerError::AlreadyAuthenticated);
        }

        let span = tracing::Span::current();
        span.record("session_id", tracing::field::display(connection.id()));
        span.record("user_id", tracing::field::display(user_id));

        let ready_data = serde_json::to_value(&ready)
            .map_err(|e| HandlerError::Internal(format!("Failed to encode READY: {e}")))?;
        if !connection.dispatch(GatewayEventType::Ready, ready_data) {
            return Err(HandlerError::Internal("Failed to send READY".to_string()));
        }

        tracing::info!(
            session_id = %connection.id(),
            user_id = %user_id,
            online = ready.online_user_ids.len(),
            "Client identified"
        );

        Ok(None)
    }
}
