//! Command handler (op 3)
//!
//! Runs a client command through the relay. Relay failures are answered with
//! `COMMAND_REJECTED` on the originating connection and never close the socket.

use super::HandlerResult;
use crate::connection::Connection;
use crate::events::{CommandRejectedEvent, ConversationEvent};
use crate::protocol::{CloseCode, Command};
use crate::relay::{RelayEvent, RelayResult};
use crate::server::GatewayState;
use serde_json::Value;
use std::sync::Arc;

/// Handles Command messages
pub struct CommandHandler;

impl CommandHandler {
    pub async fn handle(
        state: &GatewayState,
        connection: &Arc<Connection>,
        name: &str,
        data: Value,
    ) -> HandlerResult<Option<CloseCode>> {
        let nonce_hint = Command::nonce_hint(&data);

        let command = match Command::parse(name, data) {
            Ok(command) => command,
            Err(e) => {
                tracing::debug!(command = %name, error = %e, "Rejected malformed command");
                reply(
                    connection,
                    RelayEvent::CommandRejected(CommandRejectedEvent {
                        command: name.to_string(),
                        code: e.code().to_string(),
                        message: e.to_string(),
                        nonce: nonce_hint,
                    }),
                );
                return Ok(None);
            }
        };

        let kind = command.kind();
        let nonce = command.nonce().map(ToString::to_string);

        if let Err(e) = Self::execute(state, connection, command).await {
            tracing::debug!(
                session_id = %connection.id(),
                user_id = %connection.user_id(),
                command = %kind,
                code = e.code(),
                error = %e,
                "Command rejected"
            );
            reply(
                connection,
                RelayEvent::CommandRejected(CommandRejectedEvent {
                    command: kind.as_str().to_string(),
                    code: e.code().to_string(),
                    message: e.to_string(),
                    nonce,
                }),
            );
        }

        Ok(None)
    }

    async fn execute(
        state: &GatewayState,
        connection: &Arc<Connection>,
        command: Command,
    ) -> RelayResult<()> {
        let relay = state.relay();

        match command {
            Command::JoinConversation(p) => {
                let room = relay.join_conversation(connection, p.room_id).await?;
                reply(
                    connection,
                    RelayEvent::ConversationJoined(ConversationEvent::new(&room, p.nonce)),
                );
            }
            Command::LeaveConversation(p) => {
                relay.leave_conversation(connection, p.room_id);
            }
            Command::SendMessage(p) => {
                relay
                    .send_message(connection, p.room_id, p.content, p.kind, p.nonce)
                    .await?;
            }
            Command::TypingStart(p) => relay.typing_start(connection, p.room_id)?,
            Command::TypingStop(p) => {
                relay.typing_stop(connection, p.room_id);
            }
            Command::MarkRead(p) => {
                relay
                    .mark_read(connection, p.room_id, &p.message_ids)
                    .await?;
            }
            Command::CreateConversation(p) => {
                relay
                    .create_conversation(connection, p.kind, &p.participant_ids, p.name, p.nonce)
                    .await?;
            }
            Command::UpdateConversation(p) => {
                relay
                    .update_conversation(
                        connection,
                        p.room_id,
                        p.name,
                        &p.add_user_ids,
                        &p.remove_user_ids,
                        p.nonce,
                    )
                    .await?;
            }
        }

        Ok(())
    }
}

/// Send an event to the originating connection only
fn reply(connection: &Connection, event: RelayEvent) {
    match event.to_value() {
        Ok(data) => {
            connection.dispatch(event.event_type(), data);
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to encode reply");
        }
    }
}
