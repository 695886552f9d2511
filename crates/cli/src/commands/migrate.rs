//! Database migration commands.
//!
//! Two migration sets run against the storefront database:
//!
//! 1. Application migrations from `crates/storefront/migrations/`
//! 2. The tower-sessions store migration (creates the sessions table)
//!
//! Both are idempotent, so `sm-cli migrate storefront` is safe to rerun.

use tower_sessions_sqlx_store::PostgresStore;
use tracing::info;

/// Run storefront database migrations.
///
/// # Errors
///
/// Returns an error if the database is unreachable or a migration fails.
pub async fn storefront() -> Result<(), Box<dyn std::error::Error>> {
    let pool = super::connect().await?;

    info!("Running storefront migrations...");
    sqlx::migrate!("../storefront/migrations").run(&pool).await?;

    info!("Running session store migration...");
    PostgresStore::new(pool.clone()).migrate().await?;

    info!("Storefront migrations complete");
    Ok(())
}
