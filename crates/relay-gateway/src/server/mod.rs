//! Gateway server setup
//!
//! Provides the main WebSocket server configuration and routes.

mod handler;
mod state;

pub use handler::gateway_handler;
pub use state::GatewayState;

use crate::relay::{RelayDispatcher, RelaySettings, RelayStats, RelayStores};
use crate::store::InMemoryStore;
use axum::{extract::State, routing::get, Json, Router};
use relay_common::{AppConfig, AppError, JwtService};
use relay_core::SnowflakeGenerator;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// How often sockets whose outbound queue closed are swept from the relay
const SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// Create the gateway router
pub fn create_router() -> Router<GatewayState> {
    Router::new()
        .route("/gateway", get(gateway_handler))
        .route("/health", get(health_check))
        .route("/health/stats", get(relay_stats))
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

/// Relay counters
async fn relay_stats(State(state): State<GatewayState>) -> Json<RelayStats> {
    Json(state.relay().stats())
}

/// Build the complete application
pub fn create_app(state: GatewayState) -> Router {
    create_router()
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Choose the store backend from configuration
async fn create_stores(config: &AppConfig) -> Result<RelayStores, AppError> {
    let Some(database) = &config.database else {
        tracing::info!("No DATABASE_URL set, using in-memory store");
        return Ok(RelayStores::shared(InMemoryStore::new_shared(
            config.snowflake.worker_id,
        )));
    };

    tracing::info!("Connecting to PostgreSQL...");
    let db_config = relay_db::DatabaseConfig::from(database);
    let pool = relay_db::create_pool(&db_config)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    relay_db::ensure_schema(&pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    tracing::info!("PostgreSQL connection established");

    let ids = Arc::new(SnowflakeGenerator::new(config.snowflake.worker_id));
    let rooms = Arc::new(relay_db::PgRoomRepository::new(pool.clone(), ids.clone()));
    let messages = Arc::new(relay_db::PgMessageRepository::new(pool, ids));

    Ok(RelayStores {
        membership: rooms.clone(),
        messages,
        conversations: rooms,
    })
}

/// Initialize all dependencies and create `GatewayState`
pub async fn create_gateway_state(config: AppConfig) -> Result<GatewayState, AppError> {
    let stores = create_stores(&config).await?;
    let relay = RelayDispatcher::new_shared(stores, RelaySettings::from(&config.relay));

    let jwt = JwtService::new(&config.jwt.secret, config.jwt.access_token_expiry);

    Ok(GatewayState::new(relay, jwt, config))
}

/// Periodically drop connections whose socket task is gone
fn spawn_sweeper(relay: Arc<RelayDispatcher>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            ticker.tick().await;
            relay.sweep_closed();
        }
    })
}

/// Run the gateway server
pub async fn run_server(app: Router, addr: SocketAddr) -> Result<(), AppError> {
    tracing::info!("Starting Gateway server on {}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| AppError::Server(format!("Failed to bind to {addr}: {e}")))?;

    tracing::info!("Gateway listening on ws://{}/gateway", addr);

    axum::serve(listener, app)
        .await
        .map_err(|e| AppError::Server(format!("Server error: {e}")))?;

    Ok(())
}

/// Run the complete gateway server with configuration
pub async fn run(config: AppConfig) -> Result<(), AppError> {
    let addr: SocketAddr = config
        .gateway
        .address()
        .parse()
        .map_err(|e| AppError::Config(format!("Invalid gateway address: {e}")))?;

    // Create gateway state
    let state = create_gateway_state(config).await?;
    let sweeper = spawn_sweeper(state.relay().clone());

    // Build application
    let app = create_app(state);

    // Run server
    let result = run_server(app, addr).await;
    sweeper.abort();
    result
}
