//! Fan-out of outbound events to live connections
//!
//! Delivery is a single non-blocking attempt per connection. Recipients
//! without a joined live connection are skipped; nothing is queued for them.

use super::outbound::{Audience, OutboundEvent};
use crate::connection::ConnectionRegistry;
use crate::rooms::RoomIndex;
use std::collections::HashSet;
use std::sync::Arc;

/// Resolves audiences against the registry and room index
#[derive(Debug, Clone)]
pub struct Delivery {
    registry: Arc<ConnectionRegistry>,
    rooms: Arc<RoomIndex>,
}

impl Delivery {
    #[must_use]
    pub fn new(registry: Arc<ConnectionRegistry>, rooms: Arc<RoomIndex>) -> Self {
        Self { registry, rooms }
    }

    /// Deliver an event, returning the number of connections reached
    pub fn deliver(&self, outbound: &OutboundEvent) -> usize {
        let event_type = outbound.event.event_type();
        let data = match outbound.event.to_value() {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!(event = %event_type, error = %e, "Failed to serialize event");
                return 0;
            }
        };

        match &outbound.audience {
            Audience::Room {
                room_id,
                exclude_user,
            } => {
                let sent = self
                    .rooms
                    .joined_connections(*room_id)
                    .into_iter()
                    .filter(|join| Some(join.user_id) != *exclude_user)
                    .filter(|join| {
                        self.registry
                            .send_to_connection(join.connection_id, event_type, &data)
                    })
                    .count();

                tracing::trace!(
                    room_id = %room_id,
                    event = %event_type,
                    sent = sent,
                    "Event dispatched to room"
                );
                sent
            }
            Audience::Users(users) => {
                let unique: HashSet<_> = users.iter().copied().collect();
                unique
                    .into_iter()
                    .map(|user_id| self.registry.send_to_user(user_id, event_type, &data))
                    .sum()
            }
            Audience::Connection(connection_id) => {
                usize::from(
                    self.registry
                        .send_to_connection(*connection_id, event_type, &data),
                )
            }
        }
    }

    /// Deliver a batch of events in order
    pub fn deliver_all(&self, events: &[OutboundEvent]) -> usize {
        events.iter().map(|event| self.deliver(event)).sum()
    }
}
