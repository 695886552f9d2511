//! Typed client for the remote commerce API.
//!
//! # Architecture
//!
//! - The commerce API is the source of truth for stores, products, and
//!   orders - the storefront holds no product rows of its own
//! - REST over `reqwest` with bearer-token auth
//! - In-memory caching via `moka` for product listings (5 minute TTL)
//! - Responses are parsed into wire structs and then validated into domain
//!   types; nothing untyped crosses this boundary
//!
//! # Example
//!
//! ```rust,ignore
//! use stablemart_storefront::catalog::CatalogClient;
//!
//! let client = CatalogClient::new(&config.catalog, config.checkout.currency)?;
//! let products = client.products(store_id).await?;
//! ```

mod client;
pub mod types;

pub use client::CatalogClient;
pub use types::Product;

use thiserror::Error;

/// Errors that can occur when interacting with the commerce API.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Response did not match the expected schema or failed validation.
    #[error("parse error: {0}")]
    Parse(String),

    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_error_display() {
        let err = CatalogError::NotFound("store 42".to_string());
        assert_eq!(err.to_string(), "not found: store 42");

        let err = CatalogError::Api {
            status: 502,
            message: "upstream down".to_string(),
        };
        assert_eq!(err.to_string(), "API error: 502 - upstream down");
    }
}
