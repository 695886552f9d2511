//! Cart route handlers.
//!
//! All mutations follow the same shape: load the cart from the session,
//! apply the mutation against the current catalog snapshot, persist, and
//! return the full cart view. A rejected mutation is not an HTTP error --
//! the response carries the outcome and the unchanged cart.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::{debug, instrument};

use stablemart_core::{ProductId, StoreId};

use crate::cart::{Cart, CartMutation, OrderSummary};
use crate::error::Result;
use crate::models::{load_cart, save_cart};
use crate::state::AppState;

/// Cart contents and totals, as returned by every cart endpoint.
#[derive(Debug, Serialize)]
pub struct CartView {
    pub lines: Vec<CartLineView>,
    pub item_count: u32,
    pub subtotal: String,
    pub tax: String,
    pub total: String,
    /// Outcome of the mutation that produced this view (`accepted` for reads).
    pub result: &'static str,
}

/// One cart line.
#[derive(Debug, Serialize)]
pub struct CartLineView {
    pub product_id: ProductId,
    pub name: String,
    pub unit_price: String,
    pub quantity: u32,
    pub line_total: String,
}

impl CartView {
    fn build(state: &AppState, cart: &Cart, result: CartMutation) -> Result<Self> {
        let checkout = &state.config().checkout;
        let summary = OrderSummary::for_cart(cart, checkout.tax_rate, checkout.currency)
            .map_err(crate::checkout::CheckoutError::Pricing)?;

        let lines = cart
            .lines()
            .iter()
            .map(|line| {
                Ok(CartLineView {
                    product_id: line.product_id,
                    name: line.name.clone(),
                    unit_price: line.unit_price.display(),
                    quantity: line.quantity,
                    line_total: line
                        .line_total()
                        .map_err(crate::checkout::CheckoutError::Pricing)?
                        .display(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            lines,
            item_count: cart.item_count(),
            subtotal: summary.subtotal.display(),
            tax: summary.tax.display(),
            total: summary.total.display(),
            result: result.as_str(),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct AddRequest {
    pub store_id: StoreId,
    pub product_id: ProductId,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRequest {
    pub store_id: StoreId,
    pub product_id: ProductId,
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
pub struct RemoveRequest {
    pub product_id: ProductId,
}

/// `GET /cart`
#[instrument(skip(state, session))]
pub async fn show(State(state): State<AppState>, session: Session) -> Result<Json<CartView>> {
    let cart = load_cart(&session).await?;
    Ok(Json(CartView::build(&state, &cart, CartMutation::Accepted)?))
}

/// `POST /cart/add`
#[instrument(skip(state, session), fields(product_id = %request.product_id))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<AddRequest>,
) -> Result<Json<CartView>> {
    let mut cart = load_cart(&session).await?;

    let products = state.catalog().products(request.store_id).await?;
    let result = products
        .iter()
        .find(|p| p.id == request.product_id)
        .map_or(CartMutation::RejectedUnknownProduct, |product| {
            cart.add(product)
        });

    finish_mutation(&state, &session, cart, result).await
}

/// `POST /cart/update`
#[instrument(skip(state, session), fields(product_id = %request.product_id, quantity = request.quantity))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<UpdateRequest>,
) -> Result<Json<CartView>> {
    let mut cart = load_cart(&session).await?;

    let products = state.catalog().products(request.store_id).await?;
    let result = products
        .iter()
        .find(|p| p.id == request.product_id)
        .map_or(CartMutation::RejectedUnknownProduct, |product| {
            cart.update_quantity(product, request.quantity)
        });

    finish_mutation(&state, &session, cart, result).await
}

/// `POST /cart/remove`
#[instrument(skip(state, session), fields(product_id = %request.product_id))]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<RemoveRequest>,
) -> Result<Json<CartView>> {
    let mut cart = load_cart(&session).await?;
    let result = cart.remove(request.product_id);
    finish_mutation(&state, &session, cart, result).await
}

/// `DELETE /cart`
#[instrument(skip(state, session))]
pub async fn clear(State(state): State<AppState>, session: Session) -> Result<Json<CartView>> {
    let mut cart = load_cart(&session).await?;
    cart.clear();
    finish_mutation(&state, &session, cart, CartMutation::Accepted).await
}

async fn finish_mutation(
    state: &AppState,
    session: &Session,
    cart: Cart,
    result: CartMutation,
) -> Result<Json<CartView>> {
    if result.accepted() {
        save_cart(session, &cart).await?;
    } else {
        debug!(result = result.as_str(), "cart mutation rejected");
    }
    Ok(Json(CartView::build(state, &cart, result)?))
}
