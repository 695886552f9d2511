//! Ledger relay client for stablecoin transfers.
//!
//! The relay accepts a transfer request, submits it on-chain, and blocks
//! until the transfer finalizes, so one POST maps to one settled payment.
//! Amounts cross the wire in base units (decimal-free integers).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;

use stablemart_core::{Money, MoneyError};

use crate::checkout::{BoxError, PaymentGateway, TransferReceipt};
use crate::config::LedgerConfig;

/// Relay transfers finalize within a block or two; anything slower is a
/// problem we want surfaced, not waited out.
const TRANSFER_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors that can occur when interacting with the ledger relay.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Relay returned an error response.
    #[error("relay error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Amount could not be converted to base units.
    #[error("amount error: {0}")]
    Amount(#[from] MoneyError),

    /// Failed to parse a relay response.
    #[error("parse error: {0}")]
    Parse(String),
}

#[derive(Serialize)]
struct TransferRequest<'a> {
    recipient: &'a str,
    amount: String,
    token: &'a str,
}

#[derive(Deserialize)]
struct TransferResponse {
    transaction_hash: String,
}

/// Client for the ledger relay.
#[derive(Clone)]
pub struct LedgerClient {
    client: reqwest::Client,
    relay_url: String,
    token_decimals: u32,
}

impl LedgerClient {
    /// Create a new ledger relay client.
    ///
    /// # Errors
    ///
    /// Returns error if the API key is not a valid header value or the HTTP
    /// client fails to build.
    pub fn new(config: &LedgerConfig) -> Result<Self, LedgerError> {
        let mut headers = HeaderMap::new();
        if let Some(key) = &config.api_key {
            let auth_value = format!("Bearer {}", key.expose_secret());
            let mut value = HeaderValue::from_str(&auth_value)
                .map_err(|e| LedgerError::Parse(format!("invalid API key format: {e}")))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(TRANSFER_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            relay_url: config.relay_url.as_str().trim_end_matches('/').to_string(),
            token_decimals: config.token_decimals,
        })
    }

    /// Transfer `amount` to `recipient`, waiting for finalization.
    ///
    /// # Errors
    ///
    /// Returns error if the amount cannot be expressed in base units, the
    /// relay rejects the transfer, or the request times out.
    #[instrument(skip(self), fields(token = amount.currency.code()))]
    pub async fn submit_transfer(
        &self,
        recipient: &str,
        amount: Money,
    ) -> Result<TransferReceipt, LedgerError> {
        let base_units = amount.to_base_units(self.token_decimals)?;
        let request = TransferRequest {
            recipient,
            amount: base_units.to_string(),
            token: amount.currency.code(),
        };

        let url = format!("{}/transfers", self.relay_url);
        let response = self.client.post(&url).json(&request).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(LedgerError::Api {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let body: TransferResponse = response
            .json()
            .await
            .map_err(|e| LedgerError::Parse(e.to_string()))?;
        Ok(TransferReceipt {
            transaction_hash: body.transaction_hash,
        })
    }
}

#[async_trait]
impl PaymentGateway for LedgerClient {
    async fn transfer(&self, recipient: &str, amount: Money) -> Result<TransferReceipt, BoxError> {
        Ok(self.submit_transfer(recipient, amount).await?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use stablemart_core::Currency;

    #[test]
    fn test_transfer_request_wire_shape() {
        let amount = Money::new("1.50".parse::<Decimal>().unwrap(), Currency::Cusd);
        let base_units = amount.to_base_units(18).unwrap();
        let request = TransferRequest {
            recipient: "0xmerchant",
            amount: base_units.to_string(),
            token: amount.currency.code(),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["amount"], "1500000000000000000");
        assert_eq!(json["token"], "CUSD");
    }
}
