//! # relay-gateway
//!
//! WebSocket gateway hosting the real-time presence and message-relay core.
//!
//! ## Layout
//!
//! - [`connection`]: sessions and the connection registry
//! - [`rooms`]: which connections have joined which conversation
//! - [`presence`]: online/offline transitions derived from the registry
//! - [`typing`]: per-(room, user) typing indicators with expiry
//! - [`relay`]: command validation, persistence and event fan-out
//! - [`server`]: axum routes and the per-socket loop

pub mod connection;
pub mod events;
pub mod handlers;
pub mod presence;
pub mod protocol;
pub mod relay;
pub mod rooms;
pub mod server;
pub mod store;
pub mod typing;

pub use relay::{RelayDispatcher, RelayError, RelaySettings, RelayStats, RelayStores};
pub use server::{create_app, create_gateway_state, run, GatewayState};
pub use store::InMemoryStore;
