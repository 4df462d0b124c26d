//! Persistence for fitting sessions and body measurements.
//!
//! Callers go through the [`FittingStore`] trait. [`PgFittingStore`] backs it
//! with PostgreSQL via the repositories in [`repositories`];
//! [`MemoryFittingStore`] keeps everything in process for deployments
//! without a database and for tests.

pub mod memory;
pub mod models;
pub mod postgres;
pub mod repositories;
pub mod store;

use sqlx::postgres::PgPoolOptions;

pub use memory::MemoryFittingStore;
pub use postgres::PgFittingStore;
pub use store::{FittingStore, StoreError};

pub type DbPool = sqlx::PgPool;

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .connect(database_url)
        .await
}

/// Round-trip a trivial query to verify the pool is usable.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Apply the embedded migrations.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
