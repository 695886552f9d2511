//! CLI command implementations.

pub mod migrate;
pub mod seed;

use secrecy::SecretString;
use sqlx::PgPool;

/// Connect to the storefront database from the environment.
///
/// `STOREFRONT_DATABASE_URL` takes precedence over `DATABASE_URL`.
pub(crate) async fn connect() -> Result<PgPool, Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let database_url = std::env::var("STOREFRONT_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| "STOREFRONT_DATABASE_URL not set")?;

    Ok(stablemart_storefront::db::create_pool(&database_url).await?)
}
