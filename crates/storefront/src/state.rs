//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::catalog::{CatalogClient, CatalogError};
use crate::config::StorefrontConfig;
use crate::ledger::{LedgerClient, LedgerError};

/// Error building the shared application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("catalog client: {0}")]
    Catalog(#[from] CatalogError),
    #[error("ledger client: {0}")]
    Ledger(#[from] LedgerError),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: PgPool,
    catalog: CatalogClient,
    ledger: Option<LedgerClient>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// The ledger client is only constructed when relay settlement is
    /// configured; without it, checkout records the order and leaves payment
    /// to the commerce API.
    ///
    /// # Errors
    ///
    /// Returns an error if either HTTP client fails to build.
    pub fn new(config: StorefrontConfig, pool: PgPool) -> Result<Self, StateError> {
        let catalog = CatalogClient::new(&config.catalog, config.checkout.currency)?;
        let ledger = config
            .ledger
            .as_ref()
            .map(LedgerClient::new)
            .transpose()?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                catalog,
                ledger,
            }),
        })
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get a reference to the commerce API client.
    #[must_use]
    pub fn catalog(&self) -> &CatalogClient {
        &self.inner.catalog
    }

    /// Get a reference to the ledger relay client, when configured.
    #[must_use]
    pub fn ledger(&self) -> Option<&LedgerClient> {
        self.inner.ledger.as_ref()
    }
}
