//! Database connection pool and schema management.
//!
//! This module provides utilities for:
//! - Creating and managing a PostgreSQL connection pool
//! - Running the embedded migrations
//! - Applying the `api_keys` table definition on its own

use sqlx::{Pool, Postgres};

/// Type alias for PostgreSQL connection pool.
pub type DbPool = Pool<Postgres>;

/// DDL for the `api_keys` table and its two lookup indexes.
///
/// Every statement is guarded with `IF NOT EXISTS`, so the file can be applied
/// any number of times against the same database.
pub const API_KEYS_SCHEMA: &str = include_str!("../migrations/20250101000002_create_api_keys.sql");

/// Create a new PostgreSQL connection pool.
///
/// # Configuration
///
/// - Maximum connections: 5
/// - Connections are created lazily as needed
///
/// # Errors
///
/// Returns an error if the connection string is invalid or the server cannot be reached.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
}

/// Run database migrations from the `migrations/` directory.
///
/// Migrations are tracked in the `_sqlx_migrations` table, so each one runs only once.
///
/// # Migration Files
///
/// - `20250101000001_create_users.sql`: owners referenced by API keys
/// - `20250101000002_create_api_keys.sql`: the API key store
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    // The macro reads migrations at compile time from ./migrations directory
    sqlx::migrate!("./migrations").run(pool).await
}

/// Apply the `api_keys` DDL directly, outside the migration ledger.
///
/// Requires an existing `users` table for the foreign key to resolve.
/// Safe to call repeatedly: a second application changes nothing.
pub async fn apply_api_keys_schema(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(API_KEYS_SCHEMA).execute(pool).await?;
    tracing::debug!("api_keys schema applied");

    Ok(())
}
