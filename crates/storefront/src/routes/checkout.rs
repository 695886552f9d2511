//! Checkout route handler.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use stablemart_core::{OrderId, OrderStatus, PaymentStatus, StoreId};

use crate::checkout::{CheckoutDispatcher, CheckoutOptions, PaymentRoute, TransferReceipt};
use crate::error::Result;
use crate::models::{SessionFlowStore, load_cart, load_checkout_flow, save_cart};
use crate::notifications::NotificationRepository;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub store_id: StoreId,
}

/// Confirmation returned for a successful checkout.
#[derive(Debug, Serialize)]
pub struct CheckoutView {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub transaction_hash: Option<String>,
    pub subtotal: String,
    pub tax: String,
    pub total: String,
    pub transfer: Option<TransferReceipt>,
}

/// `POST /checkout`
///
/// Submits the session cart as an order. On success the cart is cleared; on
/// any failure the cart survives untouched so the visitor can retry.
#[instrument(skip(state, session), fields(store_id = %request.store_id))]
pub async fn submit(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<CheckoutRequest>,
) -> Result<Json<CheckoutView>> {
    let mut cart = load_cart(&session).await?;
    let mut flow = load_checkout_flow(&session).await?;

    let checkout = &state.config().checkout;
    let options = CheckoutOptions {
        tax_rate: checkout.tax_rate,
        currency: checkout.currency,
        revalidate_stock: checkout.revalidate_stock,
    };

    let notifications = NotificationRepository::new(state.pool());
    let mut dispatcher = CheckoutDispatcher::new(state.catalog(), &notifications, options);
    if let (Some(ledger), Some(wallet)) = (state.ledger(), checkout.merchant_wallet.as_deref()) {
        dispatcher = dispatcher.with_payment(PaymentRoute {
            gateway: ledger,
            recipient: wallet,
        });
    }

    let snapshot = state
        .catalog()
        .products(request.store_id)
        .await?
        .as_ref()
        .clone();

    // The dispatcher writes the flow through the session store itself, so a
    // concurrent request for this session sees Submitting before any
    // external call here has resolved.
    let outcome = dispatcher
        .dispatch(
            request.store_id,
            &mut cart,
            snapshot,
            &mut flow,
            &SessionFlowStore::new(&session),
        )
        .await;

    match outcome {
        Ok(receipt) => {
            // The order is created and any payment has settled. A session
            // write failure must not turn that into an error response that
            // invites the visitor to pay again.
            if let Err(e) = save_cart(&session, &cart).await {
                sentry::capture_error(&e);
                tracing::error!(
                    order_id = %receipt.ack.order_id,
                    error = %e,
                    "failed to clear cart after settled checkout"
                );
            }
            Ok(Json(CheckoutView {
                order_id: receipt.ack.order_id,
                status: receipt.ack.status,
                payment_status: receipt.ack.payment_status,
                transaction_hash: receipt.ack.transaction_hash,
                subtotal: receipt.summary.subtotal.display(),
                tax: receipt.summary.tax.display(),
                total: receipt.summary.total.display(),
                transfer: receipt.transfer,
            }))
        }
        Err(e) => Err(e.into()),
    }
}
