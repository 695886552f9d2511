//! Checkout orchestration: order submission, payment, and notification fan-out.
//!
//! Checkout is a linear, non-resumable flow. [`CheckoutFlow`] is the explicit
//! state machine (`Idle -> Submitting -> Succeeded | Failed`); its `begin`
//! guard is what prevents double-submission, since the order payload carries
//! no idempotency key. [`CheckoutDispatcher`] drives one attempt: submit the
//! order, optionally transfer the total on-ledger, then apply the success
//! side effects (stock decrement, merchant notifications, cart clear).
//!
//! The external collaborators are injected as trait objects so the dispatcher
//! can be exercised against in-memory fakes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use rust_decimal::Decimal;
use stablemart_core::{
    LOW_STOCK_THRESHOLD, Currency, Money, MoneyError, OrderId, OrderStatus, PaymentStatus,
    ProductId, StoreId,
};

use crate::cart::{Cart, OrderSummary};
use crate::catalog::Product;
use crate::notifications::NewNotification;

/// Boxed error for gateway implementations.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

// =============================================================================
// Wire types
// =============================================================================

/// One line of an order payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderItem {
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Decimal,
}

/// Order payload sent to `POST /orders`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderPayload {
    pub store_id: StoreId,
    pub items: Vec<OrderItem>,
    pub total_amount: Decimal,
    pub currency: Currency,
}

/// Acknowledgment returned by the commerce API for a created order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAck {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    #[serde(default)]
    pub transaction_hash: Option<String>,
}

/// Confirmation receipt for a finalized ledger transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferReceipt {
    pub transaction_hash: String,
}

// =============================================================================
// Gateways
// =============================================================================

/// The catalog/order collaborator: one external service, two endpoints.
#[async_trait]
pub trait CatalogOrderGateway: Send + Sync {
    /// Fetch a fresh (uncached) product snapshot for a store.
    async fn fetch_products(&self, store_id: StoreId) -> Result<Vec<Product>, BoxError>;

    /// Submit an order for creation.
    async fn submit_order(&self, payload: &OrderPayload) -> Result<OrderAck, BoxError>;
}

/// The payment transfer collaborator.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Transfer `amount` to `recipient`, resolving once the ledger finalizes.
    async fn transfer(&self, recipient: &str, amount: Money) -> Result<TransferReceipt, BoxError>;
}

/// The append-only notification collaborator.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn append(&self, notification: NewNotification) -> Result<(), BoxError>;
}

// =============================================================================
// State machine
// =============================================================================

/// Phase of the checkout state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutPhase {
    #[default]
    Idle,
    Submitting,
    Succeeded,
    Failed,
}

/// A persisted `Submitting` phase older than this is treated as abandoned:
/// the request that set it died before resolving. Every external call the
/// dispatcher makes is bounded by a client timeout well under this window.
const SUBMITTING_GRACE_SECS: i64 = 120;

/// Explicit checkout state machine, persisted in the session so the
/// double-submit guard holds across concurrent requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CheckoutFlow {
    phase: CheckoutPhase,
    #[serde(default)]
    since: Option<DateTime<Utc>>,
}

impl CheckoutFlow {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            phase: CheckoutPhase::Idle,
            since: None,
        }
    }

    #[must_use]
    pub const fn phase(&self) -> CheckoutPhase {
        self.phase
    }

    /// Enter `Submitting`.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::EmptyCart`] for an empty cart and
    /// [`CheckoutError::AlreadySubmitting`] while a submission is in flight.
    /// A `Submitting` phase past [`SUBMITTING_GRACE_SECS`] no longer counts
    /// as in flight, so a session wedged by a crashed request can retry.
    pub fn begin(&mut self, cart: &Cart) -> Result<(), CheckoutError> {
        if self.phase == CheckoutPhase::Submitting && !self.is_abandoned() {
            return Err(CheckoutError::AlreadySubmitting);
        }
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }
        self.phase = CheckoutPhase::Submitting;
        self.since = Some(Utc::now());
        Ok(())
    }

    fn is_abandoned(&self) -> bool {
        self.since
            .is_none_or(|t| (Utc::now() - t).num_seconds() > SUBMITTING_GRACE_SECS)
    }

    fn succeed(&mut self) {
        self.phase = CheckoutPhase::Succeeded;
        self.since = None;
    }

    fn fail(&mut self) {
        self.phase = CheckoutPhase::Failed;
        self.since = None;
    }
}

/// Write-through persistence for [`CheckoutFlow`].
///
/// The dispatcher flushes the `Submitting` phase through this seam before any
/// external call suspends, making it visible to concurrent requests that load
/// their own snapshot of the same session.
#[async_trait]
pub trait FlowStore: Send + Sync {
    async fn persist(&self, flow: &CheckoutFlow) -> Result<(), BoxError>;
}

// =============================================================================
// Errors
// =============================================================================

/// Errors from a checkout attempt.
///
/// Every error leaves the cart untouched so the visitor can retry.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Dispatch on an empty cart.
    #[error("cart is empty")]
    EmptyCart,

    /// A submission is already in flight for this session.
    #[error("checkout already in progress")]
    AlreadySubmitting,

    /// Totals could not be computed.
    #[error("pricing error: {0}")]
    Pricing(#[from] MoneyError),

    /// Stock re-validation found the catalog has moved under the cart.
    #[error("stock changed for product {product_id}: requested {requested}, available {available}")]
    StaleStock {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },

    /// Stock re-validation itself failed.
    #[error("stock re-validation failed: {0}")]
    Revalidation(#[source] BoxError),

    /// Order creation was rejected or unreachable.
    #[error("order submission failed: {0}")]
    Submission(#[source] BoxError),

    /// Ledger transfer was rejected or unreachable.
    #[error("payment transfer failed: {0}")]
    Payment(#[source] BoxError),

    /// The `Submitting` phase could not be written to the session store, so
    /// the double-submit guard would not hold. Nothing external was called.
    #[error("checkout state could not be persisted: {0}")]
    Persistence(#[source] BoxError),
}

// =============================================================================
// Dispatcher
// =============================================================================

/// Checkout business rules.
#[derive(Debug, Clone, Copy)]
pub struct CheckoutOptions {
    pub tax_rate: Decimal,
    pub currency: Currency,
    /// Re-fetch catalog stock before submitting; off preserves the legacy
    /// behavior of trusting the page-load snapshot.
    pub revalidate_stock: bool,
}

/// Payment destination for deployments that settle on-ledger at checkout.
#[derive(Clone, Copy)]
pub struct PaymentRoute<'a> {
    pub gateway: &'a dyn PaymentGateway,
    pub recipient: &'a str,
}

/// Result of a successful checkout.
#[derive(Debug)]
pub struct CheckoutReceipt {
    pub ack: OrderAck,
    pub transfer: Option<TransferReceipt>,
    pub summary: OrderSummary,
    /// Product snapshot with the optimistic post-checkout stock decrements
    /// applied. Authoritative stock still lives in the catalog.
    pub products: Vec<Product>,
}

/// Drives one checkout attempt against the injected collaborators.
pub struct CheckoutDispatcher<'a> {
    orders: &'a dyn CatalogOrderGateway,
    payment: Option<PaymentRoute<'a>>,
    notifications: &'a dyn NotificationSink,
    options: CheckoutOptions,
}

impl<'a> CheckoutDispatcher<'a> {
    #[must_use]
    pub const fn new(
        orders: &'a dyn CatalogOrderGateway,
        notifications: &'a dyn NotificationSink,
        options: CheckoutOptions,
    ) -> Self {
        Self {
            orders,
            payment: None,
            notifications,
            options,
        }
    }

    /// Route the order total through a ledger transfer to `recipient`.
    #[must_use]
    pub const fn with_payment(mut self, route: PaymentRoute<'a>) -> Self {
        self.payment = Some(route);
        self
    }

    /// Run the checkout flow for `cart` against the `products` snapshot.
    ///
    /// `Submitting` is written through `flow_store` before the first external
    /// call, so a concurrent request loading the same session sees it and is
    /// rejected by `begin`. On success the cart is cleared and the flow lands
    /// in `Succeeded`; on any failure the cart is preserved and the flow lands
    /// in `Failed` so a retry can `begin` again.
    ///
    /// # Errors
    ///
    /// See [`CheckoutError`]. No partial-success handling: order submission is
    /// a single atomic call from the storefront's point of view.
    pub async fn dispatch(
        &self,
        store_id: StoreId,
        cart: &mut Cart,
        products: Vec<Product>,
        flow: &mut CheckoutFlow,
        flow_store: &dyn FlowStore,
    ) -> Result<CheckoutReceipt, CheckoutError> {
        flow.begin(cart)?;
        if let Err(e) = flow_store.persist(flow).await {
            // Fail closed: without the persisted guard, nothing external runs.
            flow.fail();
            return Err(CheckoutError::Persistence(e));
        }

        match self
            .submit(store_id, cart, products)
            .await
        {
            Ok(receipt) => {
                // Cart is cleared only on this path.
                cart.clear();
                flow.succeed();
                self.persist_terminal(flow_store, flow).await;
                Ok(receipt)
            }
            Err(e) => {
                flow.fail();
                self.persist_terminal(flow_store, flow).await;
                Err(e)
            }
        }
    }

    /// The session layer writes the flow back at end of request anyway; a
    /// terminal-phase persist failure here is logged, not fatal.
    async fn persist_terminal(&self, flow_store: &dyn FlowStore, flow: &CheckoutFlow) {
        if let Err(e) = flow_store.persist(flow).await {
            tracing::warn!("failed to persist checkout phase: {e}");
        }
    }

    async fn submit(
        &self,
        store_id: StoreId,
        cart: &Cart,
        mut products: Vec<Product>,
    ) -> Result<CheckoutReceipt, CheckoutError> {
        let summary = OrderSummary::for_cart(cart, self.options.tax_rate, self.options.currency)?;

        if self.options.revalidate_stock {
            products = self
                .orders
                .fetch_products(store_id)
                .await
                .map_err(CheckoutError::Revalidation)?;
            self.check_stock(cart, &products)?;
        }

        let payload = build_payload(store_id, cart, &summary);
        tracing::debug!(
            store_id = %store_id,
            items = payload.items.len(),
            total = %payload.total_amount,
            "submitting order"
        );
        let ack = self
            .orders
            .submit_order(&payload)
            .await
            .map_err(CheckoutError::Submission)?;

        let transfer = match self.payment {
            Some(route) => {
                let receipt = route
                    .gateway
                    .transfer(route.recipient, summary.total)
                    .await
                    .map_err(CheckoutError::Payment)?;
                tracing::info!(
                    order_id = %ack.order_id,
                    transaction_hash = %receipt.transaction_hash,
                    "payment transfer confirmed"
                );
                Some(receipt)
            }
            None => None,
        };

        self.apply_stock_and_notify(cart, &mut products).await;

        Ok(CheckoutReceipt {
            ack,
            transfer,
            summary,
            products,
        })
    }

    fn check_stock(&self, cart: &Cart, products: &[Product]) -> Result<(), CheckoutError> {
        for line in cart.lines() {
            let available = products
                .iter()
                .find(|p| p.id == line.product_id)
                .map_or(0, |p| p.available_stock);
            if line.quantity > available {
                return Err(CheckoutError::StaleStock {
                    product_id: line.product_id,
                    requested: line.quantity,
                    available,
                });
            }
        }
        Ok(())
    }

    /// Decrement the local snapshot and emit merchant notifications.
    ///
    /// Notifications are a best-effort side channel: once the order is
    /// accepted, a sink failure is logged and does not fail the checkout.
    async fn apply_stock_and_notify(&self, cart: &Cart, products: &mut [Product]) {
        for line in cart.lines() {
            self.append_notification(NewNotification::order(&line.name, line.quantity))
                .await;

            let Some(product) = products.iter_mut().find(|p| p.id == line.product_id) else {
                continue;
            };
            product.available_stock = product.available_stock.saturating_sub(line.quantity);

            let remaining = product.available_stock;
            if remaining == 0 {
                self.append_notification(NewNotification::out_of_stock(&product.name))
                    .await;
            } else if remaining <= LOW_STOCK_THRESHOLD {
                self.append_notification(NewNotification::low_stock(&product.name, remaining))
                    .await;
            }
        }
    }

    async fn append_notification(&self, notification: NewNotification) {
        if let Err(e) = self.notifications.append(notification).await {
            tracing::warn!("failed to append notification: {e}");
        }
    }
}

fn build_payload(store_id: StoreId, cart: &Cart, summary: &OrderSummary) -> OrderPayload {
    OrderPayload {
        store_id,
        items: cart
            .lines()
            .iter()
            .map(|line| OrderItem {
                product_id: line.product_id,
                quantity: line.quantity,
                unit_price: line.unit_price.amount,
            })
            .collect(),
        total_amount: summary.total.amount,
        currency: summary.total.currency,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use stablemart_core::NotificationKind;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn options() -> CheckoutOptions {
        CheckoutOptions {
            tax_rate: dec("0.10"),
            currency: Currency::Cusd,
            revalidate_stock: false,
        }
    }

    fn product(name: &str, price: &str, stock: u32) -> Product {
        Product {
            id: ProductId::generate(),
            store_id: StoreId::generate(),
            name: name.to_string(),
            description: String::new(),
            price: Money::new(dec(price), Currency::Cusd),
            available_stock: stock,
            category: "general".to_string(),
            image_ref: None,
        }
    }

    #[derive(Default)]
    struct FakeCommerce {
        fresh_products: Mutex<Vec<Product>>,
        submitted: Mutex<Vec<OrderPayload>>,
        fail_submit: bool,
    }

    #[async_trait]
    impl CatalogOrderGateway for FakeCommerce {
        async fn fetch_products(&self, _store_id: StoreId) -> Result<Vec<Product>, BoxError> {
            Ok(self.fresh_products.lock().unwrap().clone())
        }

        async fn submit_order(&self, payload: &OrderPayload) -> Result<OrderAck, BoxError> {
            if self.fail_submit {
                return Err("commerce API unavailable".into());
            }
            self.submitted.lock().unwrap().push(payload.clone());
            Ok(OrderAck {
                order_id: OrderId::generate(),
                status: OrderStatus::Pending,
                payment_status: PaymentStatus::Pending,
                transaction_hash: None,
            })
        }
    }

    #[derive(Default)]
    struct FakeLedger {
        transfers: Mutex<Vec<(String, Money)>>,
        fail: bool,
    }

    #[async_trait]
    impl PaymentGateway for FakeLedger {
        async fn transfer(
            &self,
            recipient: &str,
            amount: Money,
        ) -> Result<TransferReceipt, BoxError> {
            if self.fail {
                return Err("relay timeout".into());
            }
            self.transfers
                .lock()
                .unwrap()
                .push((recipient.to_string(), amount));
            Ok(TransferReceipt {
                transaction_hash: "0xabc123".to_string(),
            })
        }
    }

    #[derive(Default)]
    struct MemoryFlowStore {
        persisted: Mutex<Vec<CheckoutPhase>>,
        fail: bool,
    }

    #[async_trait]
    impl FlowStore for MemoryFlowStore {
        async fn persist(&self, flow: &CheckoutFlow) -> Result<(), BoxError> {
            if self.fail {
                return Err("session store unavailable".into());
            }
            self.persisted.lock().unwrap().push(flow.phase());
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        notes: Mutex<Vec<NewNotification>>,
    }

    impl RecordingSink {
        fn titles(&self) -> Vec<String> {
            self.notes
                .lock()
                .unwrap()
                .iter()
                .map(|n| n.title.clone())
                .collect()
        }

        fn count_titled(&self, title: &str) -> usize {
            self.titles().iter().filter(|t| *t == title).count()
        }
    }

    #[async_trait]
    impl NotificationSink for RecordingSink {
        async fn append(&self, notification: NewNotification) -> Result<(), BoxError> {
            self.notes.lock().unwrap().push(notification);
            Ok(())
        }
    }

    fn cart_with(product: &Product, quantity: u32) -> Cart {
        let mut cart = Cart::new();
        for _ in 0..quantity {
            assert!(cart.add(product).accepted());
        }
        cart
    }

    #[tokio::test]
    async fn test_successful_checkout_emits_low_stock_alert() {
        // Scenario D: 3 of 4 units sold -> stock 1, one low-stock alert,
        // no out-of-stock alert, cart empty.
        let p3 = product("p3", "5.00", 4);
        let mut cart = cart_with(&p3, 3);
        let mut flow = CheckoutFlow::new();
        let commerce = FakeCommerce::default();
        let sink = RecordingSink::default();

        let dispatcher = CheckoutDispatcher::new(&commerce, &sink, options());
        let receipt = dispatcher
            .dispatch(
                p3.store_id,
                &mut cart,
                vec![p3.clone()],
                &mut flow,
                &MemoryFlowStore::default(),
            )
            .await
            .unwrap();

        assert!(cart.is_empty());
        assert_eq!(flow.phase(), CheckoutPhase::Succeeded);
        assert_eq!(receipt.products.first().unwrap().available_stock, 1);
        assert_eq!(sink.count_titled("New Order Received"), 1);
        assert_eq!(sink.count_titled("Low Stock Alert"), 1);
        assert_eq!(sink.count_titled("Out of Stock Alert"), 0);
    }

    #[tokio::test]
    async fn test_checkout_to_zero_emits_only_out_of_stock() {
        // Scenario E: stock 3 -> 0 emits exactly one out-of-stock alert and
        // no low-stock alert for the same product.
        let p4 = product("p4", "2.00", 3);
        let mut cart = cart_with(&p4, 3);
        let mut flow = CheckoutFlow::new();
        let commerce = FakeCommerce::default();
        let sink = RecordingSink::default();

        CheckoutDispatcher::new(&commerce, &sink, options())
            .dispatch(
                p4.store_id,
                &mut cart,
                vec![p4.clone()],
                &mut flow,
                &MemoryFlowStore::default(),
            )
            .await
            .unwrap();

        assert_eq!(sink.count_titled("Out of Stock Alert"), 1);
        assert_eq!(sink.count_titled("Low Stock Alert"), 0);
    }

    #[tokio::test]
    async fn test_one_order_notification_per_line() {
        let a = product("a", "1.00", 10);
        let b = product("b", "2.00", 10);
        let store_id = a.store_id;
        let mut cart = Cart::new();
        cart.add(&a);
        cart.add(&b);
        cart.add(&b);
        let mut flow = CheckoutFlow::new();
        let commerce = FakeCommerce::default();
        let sink = RecordingSink::default();

        CheckoutDispatcher::new(&commerce, &sink, options())
            .dispatch(
                store_id,
                &mut cart,
                vec![a, b],
                &mut flow,
                &MemoryFlowStore::default(),
            )
            .await
            .unwrap();

        assert_eq!(sink.count_titled("New Order Received"), 2);
        let kinds: Vec<NotificationKind> = sink
            .notes
            .lock()
            .unwrap()
            .iter()
            .map(|n| n.kind)
            .collect();
        assert!(kinds.contains(&NotificationKind::Order));
    }

    #[tokio::test]
    async fn test_submission_failure_preserves_cart() {
        let p = product("p", "10.00", 5);
        let mut cart = cart_with(&p, 2);
        let before = cart.clone();
        let mut flow = CheckoutFlow::new();
        let commerce = FakeCommerce {
            fail_submit: true,
            ..FakeCommerce::default()
        };
        let sink = RecordingSink::default();

        let result = CheckoutDispatcher::new(&commerce, &sink, options())
            .dispatch(
                p.store_id,
                &mut cart,
                vec![p.clone()],
                &mut flow,
                &MemoryFlowStore::default(),
            )
            .await;

        assert!(matches!(result, Err(CheckoutError::Submission(_))));
        assert_eq!(cart, before);
        assert_eq!(flow.phase(), CheckoutPhase::Failed);
        assert!(sink.titles().is_empty());

        // Retry is allowed after a failure.
        assert!(flow.begin(&cart).is_ok());
    }

    #[tokio::test]
    async fn test_empty_cart_is_rejected() {
        let mut cart = Cart::new();
        let mut flow = CheckoutFlow::new();
        let commerce = FakeCommerce::default();
        let sink = RecordingSink::default();

        let result = CheckoutDispatcher::new(&commerce, &sink, options())
            .dispatch(
                StoreId::generate(),
                &mut cart,
                vec![],
                &mut flow,
                &MemoryFlowStore::default(),
            )
            .await;

        assert!(matches!(result, Err(CheckoutError::EmptyCart)));
        assert_eq!(flow.phase(), CheckoutPhase::Idle);
    }

    #[tokio::test]
    async fn test_second_request_snapshot_is_rejected_while_submitting() {
        // Two requests for the same session each load their own snapshot of
        // the persisted flow. The first enters Submitting; the second loads
        // that persisted value and must be turned away without submitting.
        let p = product("p", "1.00", 5);
        let mut cart = cart_with(&p, 1);
        let mut first = CheckoutFlow::new();
        first.begin(&cart).unwrap();

        let mut second = first;
        let commerce = FakeCommerce::default();
        let sink = RecordingSink::default();
        let result = CheckoutDispatcher::new(&commerce, &sink, options())
            .dispatch(
                p.store_id,
                &mut cart,
                vec![p.clone()],
                &mut second,
                &MemoryFlowStore::default(),
            )
            .await;

        assert!(matches!(result, Err(CheckoutError::AlreadySubmitting)));
        assert!(!cart.is_empty());
        assert!(commerce.submitted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_submitting_phase_is_persisted_before_submission() {
        let p = product("p", "1.00", 5);
        let mut cart = cart_with(&p, 1);
        let mut flow = CheckoutFlow::new();
        let commerce = FakeCommerce::default();
        let sink = RecordingSink::default();
        let store = MemoryFlowStore::default();

        CheckoutDispatcher::new(&commerce, &sink, options())
            .dispatch(p.store_id, &mut cart, vec![p.clone()], &mut flow, &store)
            .await
            .unwrap();

        assert_eq!(
            *store.persisted.lock().unwrap(),
            vec![CheckoutPhase::Submitting, CheckoutPhase::Succeeded]
        );
    }

    #[tokio::test]
    async fn test_flow_persist_failure_blocks_submission() {
        let p = product("p", "1.00", 5);
        let mut cart = cart_with(&p, 1);
        let mut flow = CheckoutFlow::new();
        let commerce = FakeCommerce::default();
        let sink = RecordingSink::default();
        let store = MemoryFlowStore {
            fail: true,
            ..MemoryFlowStore::default()
        };

        let result = CheckoutDispatcher::new(&commerce, &sink, options())
            .dispatch(p.store_id, &mut cart, vec![p.clone()], &mut flow, &store)
            .await;

        assert!(matches!(result, Err(CheckoutError::Persistence(_))));
        assert_eq!(flow.phase(), CheckoutPhase::Failed);
        assert!(commerce.submitted.lock().unwrap().is_empty());
        assert!(!cart.is_empty());
    }

    #[test]
    fn test_abandoned_submitting_flow_can_begin_again() {
        let p = product("p", "1.00", 5);
        let cart = cart_with(&p, 1);
        let mut flow = CheckoutFlow::new();
        flow.begin(&cart).unwrap();
        assert!(matches!(
            flow.begin(&cart),
            Err(CheckoutError::AlreadySubmitting)
        ));

        // The request that set Submitting died; once the grace period has
        // passed the session is no longer wedged.
        flow.since = Some(Utc::now() - chrono::Duration::seconds(SUBMITTING_GRACE_SECS + 1));
        assert!(flow.begin(&cart).is_ok());
        assert_eq!(flow.phase(), CheckoutPhase::Submitting);
    }

    #[tokio::test]
    async fn test_revalidation_rejects_stale_stock() {
        let p = product("p", "1.00", 5);
        let mut cart = cart_with(&p, 3);
        let mut flow = CheckoutFlow::new();

        // The catalog has only 2 left by the time checkout runs.
        let mut fresh = p.clone();
        fresh.available_stock = 2;
        let commerce = FakeCommerce {
            fresh_products: Mutex::new(vec![fresh]),
            ..FakeCommerce::default()
        };
        let sink = RecordingSink::default();
        let opts = CheckoutOptions {
            revalidate_stock: true,
            ..options()
        };

        let result = CheckoutDispatcher::new(&commerce, &sink, opts)
            .dispatch(
                p.store_id,
                &mut cart,
                vec![p.clone()],
                &mut flow,
                &MemoryFlowStore::default(),
            )
            .await;

        match result {
            Err(CheckoutError::StaleStock {
                product_id,
                requested,
                available,
            }) => {
                assert_eq!(product_id, p.id);
                assert_eq!(requested, 3);
                assert_eq!(available, 2);
            }
            other => panic!("expected StaleStock, got {other:?}"),
        }
        assert!(commerce.submitted.lock().unwrap().is_empty());
        assert!(!cart.is_empty());
    }

    #[tokio::test]
    async fn test_payment_route_transfers_total() {
        let p = product("p1", "10.00", 5);
        let mut cart = cart_with(&p, 2);
        let mut flow = CheckoutFlow::new();
        let commerce = FakeCommerce::default();
        let ledger = FakeLedger::default();
        let sink = RecordingSink::default();

        let receipt = CheckoutDispatcher::new(&commerce, &sink, options())
            .with_payment(PaymentRoute {
                gateway: &ledger,
                recipient: "0xmerchant",
            })
            .dispatch(
                p.store_id,
                &mut cart,
                vec![p.clone()],
                &mut flow,
                &MemoryFlowStore::default(),
            )
            .await
            .unwrap();

        let transfers = ledger.transfers.lock().unwrap();
        let (recipient, amount) = transfers.first().unwrap();
        assert_eq!(recipient, "0xmerchant");
        // subtotal 20.00 + 10% tax
        assert_eq!(amount.amount, dec("22.00"));
        assert_eq!(
            receipt.transfer.unwrap().transaction_hash,
            "0xabc123"
        );
    }

    #[tokio::test]
    async fn test_payment_failure_preserves_cart() {
        let p = product("p", "10.00", 5);
        let mut cart = cart_with(&p, 1);
        let before = cart.clone();
        let mut flow = CheckoutFlow::new();
        let commerce = FakeCommerce::default();
        let ledger = FakeLedger {
            fail: true,
            ..FakeLedger::default()
        };
        let sink = RecordingSink::default();

        let result = CheckoutDispatcher::new(&commerce, &sink, options())
            .with_payment(PaymentRoute {
                gateway: &ledger,
                recipient: "0xmerchant",
            })
            .dispatch(
                p.store_id,
                &mut cart,
                vec![p.clone()],
                &mut flow,
                &MemoryFlowStore::default(),
            )
            .await;

        assert!(matches!(result, Err(CheckoutError::Payment(_))));
        assert_eq!(cart, before);
        assert_eq!(flow.phase(), CheckoutPhase::Failed);
    }

    #[test]
    fn test_payload_shape() {
        let p = product("p", "10.00", 5);
        let cart = cart_with(&p, 2);
        let summary =
            OrderSummary::for_cart(&cart, dec("0.10"), Currency::Cusd).unwrap();
        let payload = build_payload(p.store_id, &cart, &summary);

        assert_eq!(payload.items.len(), 1);
        let item = payload.items.first().unwrap();
        assert_eq!(item.quantity, 2);
        assert_eq!(item.unit_price, dec("10.00"));
        assert_eq!(payload.total_amount, dec("22.00"));
    }
}
