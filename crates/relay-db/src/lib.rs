//! # relay-db
//!
//! PostgreSQL implementations of the relay's store traits via SQLx.
//!
//! ## Overview
//!
//! - Connection pool management and schema bootstrap
//! - Database models with SQLx `FromRow` derives
//! - Entity ↔ Model mappers
//! - `MembershipStore`, `ConversationStore` and `MessageStore` implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use relay_db::{create_pool, ensure_schema, DatabaseConfig, PgMessageRepository};
//!
//! async fn example(ids: std::sync::Arc<relay_core::SnowflakeGenerator>) -> Result<(), sqlx::Error> {
//!     let pool = create_pool(&DatabaseConfig::from_env()).await?;
//!     ensure_schema(&pool).await?;
//!     let messages = PgMessageRepository::new(pool, ids);
//!     Ok(())
//! }
//! ```

pub mod mappers;
pub mod models;
pub mod pool;
pub mod repositories;
pub mod schema;

// Re-export commonly used types
pub use pool::{create_pool, create_pool_from_env, DatabaseConfig, PgPool};
pub use repositories::{PgMessageRepository, PgRoomRepository};
pub use schema::ensure_schema;
