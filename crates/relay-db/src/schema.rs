//! Schema bootstrap
//!
//! The schema is embedded at compile time and applied on start-up. All statements
//! are `IF NOT EXISTS`, so running it against an existing database is a no-op.

use sqlx::PgPool;

/// Embedded schema script
pub const SCHEMA: &str = include_str!("../sql/schema.sql");

/// Create the relay tables if they do not exist yet
pub async fn ensure_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(SCHEMA).execute(pool).await?;
    tracing::info!("Relay schema ensured");
    Ok(())
}
