//! Gateway state
//!
//! Application state for the gateway server.

use crate::relay::RelayDispatcher;
use relay_common::{AppConfig, JwtService};
use std::sync::Arc;

/// Gateway application state
///
/// Holds all shared dependencies for the gateway server.
#[derive(Clone)]
pub struct GatewayState {
    /// Relay core shared by every socket
    relay: Arc<RelayDispatcher>,
    /// Verifies Identify tokens
    jwt: Arc<JwtService>,
    /// Application configuration
    config: Arc<AppConfig>,
}

impl GatewayState {
    /// Create a new gateway state
    pub fn new(relay: Arc<RelayDispatcher>, jwt: JwtService, config: AppConfig) -> Self {
        Self {
            relay,
            jwt: Arc::new(jwt),
            config: Arc::new(config),
        }
    }

    pub fn relay(&self) -> &Arc<RelayDispatcher> {
        &self.relay
    }

    pub fn jwt(&self) -> &JwtService {
        &self.jwt
    }

    /// Get the application configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}

impl std::fmt::Debug for GatewayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayState")
            .field("relay", &self.relay)
            .field("config", &"AppConfig")
            .finish()
    }
}
