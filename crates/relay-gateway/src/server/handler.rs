//! WebSocket handler
//!
//! Handles WebSocket connections and message processing.

use crate::connection::Session;
use crate::handlers::MessageDispatcher;
use crate::protocol::{CloseCode, GatewayMessage, HelloPayload};
use crate::server::GatewayState;
use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::interval;
use tracing::Instrument;

/// How long the send task gets to flush a close frame
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// WebSocket gateway handler
pub async fn gateway_handler(
    State(state): State<GatewayState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(state, socket))
}

/// Handle an upgraded WebSocket connection
async fn handle_socket(state: GatewayState, socket: WebSocket) {
    let span = tracing::info_span!(
        "gateway",
        session_id = tracing::field::Empty,
        user_id = tracing::field::Empty
    );
    let relay_config = state.config().relay.clone();

    // Create message channel for outgoing messages
    let (tx, mut rx) = mpsc::channel::<GatewayMessage>(relay_config.outbound_buffer);
    let session = Session::new(tx);

    tracing::debug!(parent: &span, "WebSocket connection established");

    // Split the WebSocket
    let (mut ws_sink, mut ws_stream) = socket.split();

    // Send Hello message immediately
    let hello = GatewayMessage::hello(HelloPayload::with_interval(
        relay_config.heartbeat_interval_ms,
    ));
    if let Ok(json) = hello.to_json() {
        if ws_sink.send(Message::Text(json)).await.is_err() {
            tracing::warn!(parent: &span, "Failed to send Hello message");
            return;
        }
    }

    // Clone state for tasks
    let state_recv = state.clone();
    let session_recv = session.clone();

    // Spawn task to receive messages from WebSocket
    let mut recv_task = tokio::spawn(
        async move {
            while let Some(msg) = ws_stream.next().await {
                match msg {
                    Ok(Message::Text(text)) => {
                        if let Err(close_code) =
                            handle_text_message(&state_recv, &session_recv, &text).await
                        {
                            tracing::debug!(
                                close_code = %close_code,
                                reconnect = close_code.should_reconnect(),
                                "Closing connection"
                            );
                            return Some(close_code);
                        }
                    }
                    Ok(Message::Binary(_)) => {
                        tracing::debug!("Binary messages not supported");
                        return Some(CloseCode::DecodeError);
                    }
                    Ok(Message::Ping(_) | Message::Pong(_)) => {
                        // Pong is handled automatically by axum
                        tracing::trace!("Ping/pong received");
                    }
                    Ok(Message::Close(_)) => {
                        tracing::debug!("Client closed connection");
                        return None;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "WebSocket error");
                        return None;
                    }
                }
            }
            None
        }
        .instrument(span.clone()),
    );

    // Close signal for the send task
    let (close_tx, mut close_rx) = oneshot::channel::<CloseCode>();

    // Spawn task to send messages to WebSocket
    let mut send_task = tokio::spawn(
        async move {
            loop {
                tokio::select! {
                    code = &mut close_rx => {
                        if let Ok(code) = code {
                            let (code, reason) = GatewayMessage::close_frame(code);
                            let frame = CloseFrame { code, reason: reason.into() };
                            let _ = ws_sink.send(Message::Close(Some(frame))).await;
                        }
                        break;
                    }
                    msg = rx.recv() => {
                        let Some(msg) = msg else { break };
                        match msg.to_json() {
                            Ok(json) => {
                                if ws_sink.send(Message::Text(json)).await.is_err() {
                                    tracing::debug!("Failed to send message to WebSocket");
                                    break;
                                }
                            }
                            Err(e) => tracing::warn!(error = %e, "Failed to encode frame"),
                        }
                    }
                }
            }

            // Close the WebSocket when done
            let _ = ws_sink.close().await;
        }
        .instrument(span.clone()),
    );

    // Spawn heartbeat monitoring task
    let session_hb = session.clone();
    let heartbeat_timeout = relay_config.heartbeat_timeout();
    let check_every = relay_config.heartbeat_interval() / 2;
    let mut heartbeat_task = tokio::spawn(
        async move {
            let mut check_interval = interval(check_every);

            loop {
                check_interval.tick().await;

                let time_since = session_hb.time_since_heartbeat();
                if time_since > heartbeat_timeout {
                    tracing::warn!(
                        time_since_ms = time_since.as_millis(),
                        "Connection timed out (no heartbeat)"
                    );
                    break;
                }
            }
        }
        .instrument(span.clone()),
    );

    // Wait for any task to complete
    let close_code = tokio::select! {
        result = &mut recv_task => result.ok().flatten(),
        _ = &mut send_task => {
            tracing::debug!(parent: &span, "Send task ended");
            None
        }
        _ = &mut heartbeat_task => Some(CloseCode::SessionTimeout),
    };

    // Flush the close frame before tearing down
    if let Some(code) = close_code {
        if close_tx.send(code).is_ok() {
            let _ = tokio::time::timeout(CLOSE_GRACE, &mut send_task).await;
        }
    }

    recv_task.abort();
    send_task.abort();
    heartbeat_task.abort();

    cleanup_session(&state, &session, &span);
}

/// Handle a text message from the client
async fn handle_text_message(
    state: &GatewayState,
    session: &Arc<Session>,
    text: &str,
) -> Result<(), CloseCode> {
    // Parse the message
    let message = match GatewayMessage::from_json(text) {
        Ok(m) => m,
        Err(e) => {
            tracing::debug!(error = %e, "Failed to parse message");
            return Err(CloseCode::DecodeError);
        }
    };

    tracing::trace!(op = %message.op, "Received message");

    // Dispatch to handler
    match MessageDispatcher::dispatch(state, session, message).await {
        Ok(Some(close_code)) => Err(close_code),
        Ok(None) => Ok(()),
        Err(e) => {
            tracing::warn!(error = %e, "Handler error");
            Err(e.to_close_code())
        }
    }
}

/// Release the session's connection from the relay
fn cleanup_session(state: &GatewayState, session: &Session, span: &tracing::Span) {
    match session.connection() {
        Some(connection) => {
            state.relay().disconnect(connection.id());
            tracing::info!(parent: span, "Connection closed");
        }
        None => tracing::debug!(parent: span, "Unidentified connection closed"),
    }
}
