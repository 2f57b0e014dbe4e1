//! Message relay
//!
//! [`RelayDispatcher`] receives inbound commands from identified connections,
//! validates them, persists through the store traits, and fans out
//! [`OutboundEvent`]s through [`Delivery`].

mod delivery;
mod dispatcher;
mod error;
mod outbound;

#[cfg(test)]
mod tests;

pub use delivery::Delivery;
pub use dispatcher::{RelayDispatcher, RelaySettings, RelayStats, RelayStores};
pub use error::{RelayError, RelayResult};
pub use outbound::{Audience, OutboundEvent, RelayEvent};
