//! PostgreSQL persistence for projects, notifications and presence.
//!
//! Repositories are thin `sqlx` wrappers returning `sqlx::Error`.
//! [`store::PgProjectStore`] and [`notifier::PgNotifier`] sit on top of them
//! and implement the core collaborator traits, translating failures into
//! `CoreError` at that boundary.

use sqlx::postgres::PgPoolOptions;

pub mod error;
pub mod models;
pub mod notifier;
pub mod repositories;
pub mod store;

pub use notifier::PgNotifier;
pub use store::PgProjectStore;

pub type DbPool = sqlx::PgPool;

/// Default pool size.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 20;

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}

/// Round-trip a trivial query to verify connectivity.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Apply any pending migrations from `crates/db/migrations`.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
