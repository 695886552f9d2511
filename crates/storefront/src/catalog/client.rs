//! Commerce API client implementation.
//!
//! Thin JSON client over `reqwest` 0.13. Product listings are cached with
//! `moka` (5-minute TTL) since the storefront renders them on every page
//! view; order creation always goes straight to the API.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use tracing::{debug, instrument};

use stablemart_core::{Currency, StoreId};

use crate::checkout::{BoxError, CatalogOrderGateway, OrderAck, OrderPayload};
use crate::config::CatalogConfig;

use super::CatalogError;
use super::types::{Product, WireProduct};

/// Client for the commerce API.
///
/// Cheap to clone; the HTTP client and cache are shared behind an `Arc`.
#[derive(Clone)]
pub struct CatalogClient {
    inner: Arc<CatalogClientInner>,
}

struct CatalogClientInner {
    client: reqwest::Client,
    base_url: String,
    currency: Currency,
    products: Cache<StoreId, Arc<Vec<Product>>>,
}

impl CatalogClient {
    /// Create a new commerce API client.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Parse`] if the configured API token is not a
    /// valid header value, or `Http` if the client fails to build.
    pub fn new(config: &CatalogConfig, currency: Currency) -> Result<Self, CatalogError> {
        let mut headers = HeaderMap::new();
        if let Some(token) = &config.api_token {
            let auth_value = format!("Bearer {}", token.expose_secret());
            let mut value = HeaderValue::from_str(&auth_value)
                .map_err(|e| CatalogError::Parse(format!("invalid API token: {e}")))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(10))
            .build()?;

        let products = Cache::builder()
            .max_capacity(1000)
            .time_to_live(Duration::from_secs(300)) // 5 minutes
            .build();

        Ok(Self {
            inner: Arc::new(CatalogClientInner {
                client,
                base_url: config.api_url.as_str().trim_end_matches('/').to_string(),
                currency,
                products,
            }),
        })
    }

    /// List a store's products, served from cache when fresh.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails or returns invalid products.
    #[instrument(skip(self))]
    pub async fn products(&self, store_id: StoreId) -> Result<Arc<Vec<Product>>, CatalogError> {
        if let Some(cached) = self.inner.products.get(&store_id).await {
            debug!(%store_id, "product cache hit");
            return Ok(cached);
        }

        let products = Arc::new(self.list_products(store_id).await?);
        self.inner.products.insert(store_id, products.clone()).await;
        Ok(products)
    }

    /// List a store's products, bypassing the cache.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails or returns invalid products.
    #[instrument(skip(self))]
    pub async fn list_products(&self, store_id: StoreId) -> Result<Vec<Product>, CatalogError> {
        let url = format!("{}/stores/{store_id}/products", self.inner.base_url);
        let response = self.inner.client.get(&url).send().await?;
        let wire: Vec<WireProduct> = Self::parse(response).await?;

        wire.into_iter()
            .map(|w| Product::from_wire(w, self.inner.currency))
            .collect()
    }

    /// Submit an order for creation.
    ///
    /// # Errors
    ///
    /// Returns error if the API rejects the order or is unreachable.
    #[instrument(skip(self, payload), fields(store_id = %payload.store_id))]
    pub async fn create_order(&self, payload: &OrderPayload) -> Result<OrderAck, CatalogError> {
        let url = format!("{}/orders", self.inner.base_url);
        let response = self.inner.client.post(&url).json(payload).send().await?;
        let ack: OrderAck = Self::parse(response).await?;

        // The order changed stock; drop the stale listing.
        self.inner.products.invalidate(&payload.store_id).await;
        debug!(order_id = %ack.order_id, "order created");
        Ok(ack)
    }

    async fn parse<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, CatalogError> {
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(CatalogError::NotFound(
                response.text().await.unwrap_or_default(),
            ));
        }
        if !status.is_success() {
            return Err(CatalogError::Api {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }
        response
            .json()
            .await
            .map_err(|e| CatalogError::Parse(e.to_string()))
    }
}

#[async_trait]
impl CatalogOrderGateway for CatalogClient {
    async fn fetch_products(&self, store_id: StoreId) -> Result<Vec<Product>, BoxError> {
        Ok(self.list_products(store_id).await?)
    }

    async fn submit_order(&self, payload: &OrderPayload) -> Result<OrderAck, BoxError> {
        Ok(self.create_order(payload).await?)
    }
}
