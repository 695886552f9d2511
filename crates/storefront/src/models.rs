//! Session-persisted visitor state.
//!
//! The cart and checkout flow are per-visitor and survive page loads, so
//! they live in the tower-sessions session rather than in handler state.
//! Loading an absent key yields the empty default.

use async_trait::async_trait;
use tower_sessions::Session;

use crate::cart::Cart;
use crate::checkout::{BoxError, CheckoutFlow, FlowStore};
use crate::error::Result;

/// Session key for the visitor's cart.
const CART_KEY: &str = "cart";

/// Session key for the visitor's checkout state machine.
const CHECKOUT_FLOW_KEY: &str = "checkout_flow";

/// Load the visitor's cart, empty when none is stored.
///
/// # Errors
///
/// Returns error if the session store is unreachable.
pub async fn load_cart(session: &Session) -> Result<Cart> {
    Ok(session.get(CART_KEY).await?.unwrap_or_default())
}

/// Persist the visitor's cart.
///
/// # Errors
///
/// Returns error if the session store is unreachable.
pub async fn save_cart(session: &Session, cart: &Cart) -> Result<()> {
    session.insert(CART_KEY, cart).await?;
    Ok(())
}

/// Load the visitor's checkout flow, `Idle` when none is stored.
///
/// # Errors
///
/// Returns error if the session store is unreachable.
pub async fn load_checkout_flow(session: &Session) -> Result<CheckoutFlow> {
    Ok(session.get(CHECKOUT_FLOW_KEY).await?.unwrap_or_default())
}

/// [`FlowStore`] backed by the visitor's session.
///
/// `persist` flushes to the session store immediately instead of waiting for
/// the end-of-request save, so a concurrent request loading the same session
/// observes the `Submitting` phase while this one is still awaiting the
/// commerce API or the ledger.
pub struct SessionFlowStore<'a> {
    session: &'a Session,
}

impl<'a> SessionFlowStore<'a> {
    #[must_use]
    pub const fn new(session: &'a Session) -> Self {
        Self { session }
    }
}

#[async_trait]
impl FlowStore for SessionFlowStore<'_> {
    async fn persist(&self, flow: &CheckoutFlow) -> std::result::Result<(), BoxError> {
        self.session.insert(CHECKOUT_FLOW_KEY, flow).await?;
        self.session.save().await?;
        Ok(())
    }
}
