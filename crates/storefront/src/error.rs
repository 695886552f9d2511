//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::catalog::CatalogError;
use crate::checkout::CheckoutError;
use crate::db::RepositoryError;
use crate::ledger::LedgerError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Commerce API operation failed.
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Ledger relay operation failed.
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Checkout attempt failed.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// Session store operation failed.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Database(_) | Self::Session(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Catalog(CatalogError::NotFound(_)) | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Catalog(_) | Self::Ledger(_) => StatusCode::BAD_GATEWAY,
            Self::Checkout(err) => match err {
                CheckoutError::EmptyCart => StatusCode::BAD_REQUEST,
                CheckoutError::AlreadySubmitting | CheckoutError::StaleStock { .. } => {
                    StatusCode::CONFLICT
                }
                CheckoutError::Pricing(_) | CheckoutError::Persistence(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
                CheckoutError::Revalidation(_)
                | CheckoutError::Submission(_)
                | CheckoutError::Payment(_) => StatusCode::BAD_GATEWAY,
            },
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Client-facing message. Internal details stay in logs and Sentry.
    fn client_message(&self) -> String {
        match self {
            Self::Database(_) | Self::Session(_) | Self::Internal(_) => {
                "Internal server error".to_string()
            }
            Self::Catalog(CatalogError::NotFound(_)) => "Store or product not found".to_string(),
            Self::Catalog(_) => "Catalog service error".to_string(),
            Self::Ledger(_) => "Payment service error".to_string(),
            Self::Checkout(err) => match err {
                CheckoutError::EmptyCart => "Your cart is empty".to_string(),
                CheckoutError::AlreadySubmitting => {
                    "A checkout is already in progress".to_string()
                }
                CheckoutError::StaleStock {
                    requested,
                    available,
                    ..
                } => format!(
                    "Stock changed while you were checking out: requested {requested}, only {available} available"
                ),
                CheckoutError::Pricing(_) | CheckoutError::Persistence(_) => {
                    "Internal server error".to_string()
                }
                CheckoutError::Revalidation(_) | CheckoutError::Submission(_) => {
                    "Order could not be placed, please try again".to_string()
                }
                CheckoutError::Payment(_) => "Payment failed, please try again".to_string(),
            },
            Self::NotFound(msg) | Self::BadRequest(msg) => msg.clone(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server-side failures to Sentry; client errors are noise.
        let status = self.status();
        if status.is_server_error() || status == StatusCode::BAD_GATEWAY {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let body = Json(json!({ "error": self.client_message() }));
        (status, body).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkout_statuses() {
        assert_eq!(
            AppError::from(CheckoutError::EmptyCart).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::from(CheckoutError::AlreadySubmitting).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::from(CheckoutError::Submission("down".into())).status(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_internal_details_are_hidden() {
        let err = AppError::Internal("pool exhausted at 10.0.0.3".to_string());
        assert_eq!(err.client_message(), "Internal server error");
    }
}
