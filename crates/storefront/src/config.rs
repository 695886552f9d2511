//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string
//! - `STOREFRONT_BASE_URL` - Public URL for the storefront
//! - `STOREFRONT_SESSION_SECRET` - Session signing secret (min 32 chars, high entropy)
//! - `CATALOG_API_URL` - Base URL of the commerce API (stores, products, orders)
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `CATALOG_API_TOKEN` - Bearer token for the commerce API
//! - `LEDGER_RELAY_URL` - Payment relay endpoint; payments are skipped when unset
//! - `LEDGER_API_KEY` - API key for the payment relay
//! - `LEDGER_TOKEN_DECIMALS` - Token base-unit scale (default: 18)
//! - `MERCHANT_WALLET_ADDRESS` - Recipient wallet for checkout transfers
//! - `CHECKOUT_TAX_RATE` - Decimal tax rate in `[0, 1)` (default: 0.10)
//! - `CHECKOUT_CURRENCY` - Stablecoin ticker (default: CUSD)
//! - `CHECKOUT_REVALIDATE_STOCK` - Re-check catalog stock before submitting (default: false)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment tag

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

use stablemart_core::Currency;

const MIN_SESSION_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront
    pub base_url: String,
    /// Session signing secret
    pub session_secret: SecretString,
    /// Commerce API configuration
    pub catalog: CatalogConfig,
    /// Payment relay configuration; `None` disables on-ledger payment
    pub ledger: Option<LedgerConfig>,
    /// Checkout business rules
    pub checkout: CheckoutConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment tag
    pub sentry_environment: Option<String>,
}

/// Remote commerce API (catalog + orders) configuration.
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    /// Base URL, e.g. `https://api.example.com`
    pub api_url: Url,
    /// Bearer token attached to every request, when set
    pub api_token: Option<SecretString>,
}

/// Payment relay configuration.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Relay endpoint that executes wallet transfers
    pub relay_url: Url,
    /// API key for the relay
    pub api_key: Option<SecretString>,
    /// Token base-unit scale (18 for cUSD)
    pub token_decimals: u32,
}

/// Checkout business rules.
#[derive(Debug, Clone)]
pub struct CheckoutConfig {
    /// Tax rate applied to the subtotal
    pub tax_rate: Decimal,
    /// Stablecoin prices and totals are denominated in
    pub currency: Currency,
    /// Re-fetch catalog stock before submitting an order
    pub revalidate_stock: bool,
    /// Recipient wallet for checkout transfers; payment is skipped when unset
    pub merchant_wallet: Option<String>,
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("STOREFRONT_DATABASE_URL")?;
        let host = get_env_or_default("STOREFRONT_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("STOREFRONT_HOST".to_string(), e.to_string())
            })?;
        let port = get_env_or_default("STOREFRONT_PORT", "3000")
            .parse::<u16>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("STOREFRONT_PORT".to_string(), e.to_string())
            })?;
        let base_url = get_required_env("STOREFRONT_BASE_URL")?;
        let session_secret = get_validated_secret("STOREFRONT_SESSION_SECRET")?;
        validate_session_secret(&session_secret, "STOREFRONT_SESSION_SECRET")?;

        let catalog = CatalogConfig::from_env()?;
        let ledger = LedgerConfig::from_env()?;
        let checkout = CheckoutConfig::from_env()?;
        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            session_secret,
            catalog,
            ledger,
            checkout,
            sentry_dsn,
            sentry_environment,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl CatalogConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let api_url = get_url("CATALOG_API_URL", get_required_env("CATALOG_API_URL")?)?;
        let api_token = get_optional_env("CATALOG_API_TOKEN").map(SecretString::from);
        Ok(Self { api_url, api_token })
    }
}

impl LedgerConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(raw) = get_optional_env("LEDGER_RELAY_URL") else {
            return Ok(None);
        };
        let relay_url = get_url("LEDGER_RELAY_URL", raw)?;
        let api_key = get_optional_env("LEDGER_API_KEY").map(SecretString::from);
        let token_decimals = get_env_or_default("LEDGER_TOKEN_DECIMALS", "18")
            .parse::<u32>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("LEDGER_TOKEN_DECIMALS".to_string(), e.to_string())
            })?;
        Ok(Some(Self {
            relay_url,
            api_key,
            token_decimals,
        }))
    }
}

impl CheckoutConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let tax_rate = parse_tax_rate(&get_env_or_default("CHECKOUT_TAX_RATE", "0.10"))?;
        let currency_code = get_env_or_default("CHECKOUT_CURRENCY", "CUSD");
        let currency = Currency::from_code(&currency_code).ok_or_else(|| {
            ConfigError::InvalidEnvVar(
                "CHECKOUT_CURRENCY".to_string(),
                format!("unknown stablecoin ticker '{currency_code}'"),
            )
        })?;
        let revalidate_stock = get_env_or_default("CHECKOUT_REVALIDATE_STOCK", "false")
            .parse::<bool>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("CHECKOUT_REVALIDATE_STOCK".to_string(), e.to_string())
            })?;
        let merchant_wallet = get_optional_env("MERCHANT_WALLET_ADDRESS");

        Ok(Self {
            tax_rate,
            currency,
            revalidate_stock,
            merchant_wallet,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL` (used by managed postgres attach).
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse a URL-valued variable.
fn get_url(key: &str, raw: String) -> Result<Url, ConfigError> {
    Url::parse(&raw).map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Parse and range-check a tax rate.
fn parse_tax_rate(raw: &str) -> Result<Decimal, ConfigError> {
    let rate = raw.parse::<Decimal>().map_err(|e| {
        ConfigError::InvalidEnvVar("CHECKOUT_TAX_RATE".to_string(), e.to_string())
    })?;
    if rate.is_sign_negative() || rate >= Decimal::ONE {
        return Err(ConfigError::InvalidEnvVar(
            "CHECKOUT_TAX_RATE".to_string(),
            format!("rate {rate} must be in [0, 1)"),
        ));
    }
    Ok(rate)
}

/// Validate that a session secret meets minimum length requirements.
fn validate_session_secret(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_SESSION_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_SESSION_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    // Real session secrets and API keys have high entropy
    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_single_char() {
        // All same character = 0 entropy
        assert!((shannon_entropy("aaaaaaa") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_high() {
        let entropy = shannon_entropy("aB3$xY9!mK2@nL5#");
        assert!(entropy > 3.3);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("your-api-key-here", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        let result = validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "TEST_VAR");
        assert!(result.is_ok());
    }

    #[test]
    fn test_validate_session_secret_too_short() {
        let secret = SecretString::from("short");
        assert!(validate_session_secret(&secret, "TEST_SESSION").is_err());
    }

    #[test]
    fn test_parse_tax_rate_default() {
        assert_eq!(parse_tax_rate("0.10").unwrap(), "0.10".parse().unwrap());
    }

    #[test]
    fn test_parse_tax_rate_rejects_out_of_range() {
        assert!(parse_tax_rate("1.0").is_err());
        assert!(parse_tax_rate("-0.1").is_err());
    }

    #[test]
    fn test_socket_addr() {
        let config = StorefrontConfig {
            database_url: SecretString::from("postgres://localhost/test"),
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            base_url: "http://localhost:3000".to_string(),
            session_secret: SecretString::from("x".repeat(32)),
            catalog: CatalogConfig {
                api_url: Url::parse("https://api.test.local").unwrap(),
                api_token: None,
            },
            ledger: None,
            checkout: CheckoutConfig {
                tax_rate: "0.10".parse().unwrap(),
                currency: Currency::Cusd,
                revalidate_stock: false,
                merchant_wallet: None,
            },
            sentry_dsn: None,
            sentry_environment: None,
        };

        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 3000);
    }
}
