//! HTTP route handlers for the storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                          - Liveness check
//! GET  /health/ready                    - Readiness check (database ping)
//!
//! # Products
//! GET  /stores/{store_id}/products      - Product listing with stock badges
//!
//! # Cart (session-scoped)
//! GET    /cart                          - Cart contents and totals
//! POST   /cart/add                      - Add one unit of a product
//! POST   /cart/update                   - Set a line's quantity
//! POST   /cart/remove                   - Remove a line
//! DELETE /cart                          - Clear the cart
//!
//! # Checkout
//! POST /checkout                        - Submit the cart as an order
//!
//! # Notifications (merchant dashboard)
//! GET    /notifications                 - Recent notifications
//! GET    /notifications/unread-count    - Unread badge count
//! POST   /notifications/{id}/read       - Mark one as read
//! POST   /notifications/read-all        - Mark all as read
//! DELETE /notifications/{id}            - Delete one
//! ```
//!
//! Every response body is JSON. Rejected cart mutations respond 200 with the
//! unchanged cart; only infrastructure failures surface as errors.

pub mod cart;
pub mod checkout;
pub mod notifications;
pub mod products;

use axum::{
    Router,
    routing::{delete, get, post},
};

use crate::state::AppState;

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new().route("/stores/{store_id}/products", get(products::list))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/cart", get(cart::show).delete(cart::clear))
        .route("/cart/add", post(cart::add))
        .route("/cart/update", post(cart::update))
        .route("/cart/remove", post(cart::remove))
}

/// Create the checkout routes router.
pub fn checkout_routes() -> Router<AppState> {
    Router::new().route("/checkout", post(checkout::submit))
}

/// Create the notification routes router.
pub fn notification_routes() -> Router<AppState> {
    Router::new()
        .route("/notifications", get(notifications::list))
        .route(
            "/notifications/unread-count",
            get(notifications::unread_count),
        )
        .route("/notifications/{id}/read", post(notifications::mark_read))
        .route("/notifications/read-all", post(notifications::mark_all_read))
        .route("/notifications/{id}", delete(notifications::remove))
}
