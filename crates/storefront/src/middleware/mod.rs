//! HTTP middleware stack for the storefront.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layer (capture errors)
//! 2. `TraceLayer` (request tracing)
//! 3. CORS (the storefront serves browser clients on other origins)
//! 4. Session layer (tower-sessions with `PostgreSQL` store)

pub mod session;

pub use session::create_session_layer;
