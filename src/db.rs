use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

/// Type alias for the PostgreSQL connection pool
pub type DbPool = PgPool;

/// Creates and configures a PostgreSQL connection pool
///
/// # Arguments
/// * `database_url` - PostgreSQL connection string
///
/// # Returns
/// * `Result<DbPool>` - Configured connection pool or error
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    tracing::debug!("Creating database connection pool");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(3))
        .connect(database_url)
        .await?;

    tracing::info!("Database connection pool created successfully");
    Ok(pool)
}

/// Health probe used by the readiness endpoint
///
/// Transaction conventions for the command orchestrators live here, next to
/// the pool they apply to. Every lifecycle command opens exactly one primary
/// transaction. All writes that must be atomic with the reservation mutation
/// (the mutation itself, the lifecycle audit row, the outbox row,
/// in-transaction room flips and folio settlement) go through repository
/// methods that accept the open `sqlx::Transaction` handle. Nothing inside
/// that unit of work opens a nested transaction; the handle rolls back
/// automatically when dropped without commit, so `?` propagation is
/// sufficient for the failure path.
///
/// Contended rows are taken with row locks:
/// * reservations: `SELECT ... FOR UPDATE` - a second command on the same
///   reservation waits, re-reads the status under the lock and is rejected
///   by the state machine.
/// * rooms: `SELECT ... FOR UPDATE SKIP LOCKED` - a room another command is
///   mid-assignment on reads as unavailable instead of blocking.
pub async fn ping(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(pool).await?;
    Ok(())
}
