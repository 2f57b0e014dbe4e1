//! Connection management
//!
//! Per-socket sessions, registered connection handles, and the registry that
//! maps users to their live connections.

mod connection;
mod registry;
mod session;

pub use connection::{Connection, ConnectionId};
pub use registry::{ConnectionRegistry, RegistryObserver, Unregistered};
pub use session::Session;
