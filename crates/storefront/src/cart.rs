//! Session cart state and order totals.
//!
//! A [`Cart`] belongs to exactly one browsing session and is stored in the
//! session row, so it lives and dies with the session. Mutations are pure
//! in-memory transitions validated against the product snapshot the caller
//! passes in; nothing here touches the catalog or the database.
//!
//! Every mutation returns a [`CartMutation`] naming the rule that fired.
//! The HTTP layer deliberately swallows rejections (the storefront shows no
//! error, the cart just does not change), but tests and logs can see which
//! constraint declined the mutation.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stablemart_core::{Currency, Money, MoneyError, ProductId};

use crate::catalog::Product;

/// One product-and-quantity entry in a cart.
///
/// The unit price is a snapshot taken when the line was created; catalog
/// price changes do not retroactively reprice a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    /// Product name snapshot, used in order notifications.
    pub name: String,
    pub unit_price: Money,
    pub quantity: u32,
}

impl CartLine {
    /// Price of the whole line (`unit_price * quantity`).
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::Overflow`] on decimal overflow.
    pub fn line_total(&self) -> Result<Money, MoneyError> {
        self.unit_price.checked_mul_quantity(self.quantity)
    }
}

/// Outcome of a cart mutation.
///
/// Rejections mirror the storefront's validation rules; a rejected mutation
/// leaves the cart exactly as it was.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartMutation {
    /// The mutation was applied.
    Accepted,
    /// The product has no available stock at all.
    RejectedOutOfStock,
    /// Applying the mutation would push the quantity past available stock.
    RejectedStockExceeded,
    /// Quantity below 1 (use remove to delete a line).
    RejectedInvalidQuantity,
    /// No cart line exists for the product.
    RejectedUnknownProduct,
}

impl CartMutation {
    /// Whether the mutation was applied.
    #[must_use]
    pub const fn accepted(self) -> bool {
        matches!(self, Self::Accepted)
    }

    /// Short name for logging.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::RejectedOutOfStock => "out_of_stock",
            Self::RejectedStockExceeded => "stock_exceeded",
            Self::RejectedInvalidQuantity => "invalid_quantity",
            Self::RejectedUnknownProduct => "unknown_product",
        }
    }
}

/// The session-local shopping cart.
///
/// Lines keep insertion order (insertion order is display order) and there is
/// at most one line per product id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    /// Create an empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self { lines: Vec::new() }
    }

    /// Cart lines in display order.
    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Total units across all lines (the cart badge count).
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    /// Find the line for a product, if any.
    #[must_use]
    pub fn line(&self, product_id: ProductId) -> Option<&CartLine> {
        self.lines.iter().find(|l| l.product_id == product_id)
    }

    /// Add one unit of `product`.
    ///
    /// No-op when the product is out of stock or the existing line is already
    /// at the stock ceiling. Otherwise increments the existing line or appends
    /// a new line with quantity 1.
    pub fn add(&mut self, product: &Product) -> CartMutation {
        if product.available_stock == 0 {
            return CartMutation::RejectedOutOfStock;
        }

        if let Some(line) = self.lines.iter_mut().find(|l| l.product_id == product.id) {
            if line.quantity >= product.available_stock {
                return CartMutation::RejectedStockExceeded;
            }
            line.quantity += 1;
        } else {
            self.lines.push(CartLine {
                product_id: product.id,
                name: product.name.clone(),
                unit_price: product.price,
                quantity: 1,
            });
        }
        CartMutation::Accepted
    }

    /// Remove the line for `product_id`. Idempotent: removing an absent line
    /// is accepted and changes nothing.
    pub fn remove(&mut self, product_id: ProductId) -> CartMutation {
        self.lines.retain(|l| l.product_id != product_id);
        CartMutation::Accepted
    }

    /// Replace the quantity of the line for `product`.
    ///
    /// No-op when the new quantity is below 1 (use [`Cart::remove`] instead),
    /// exceeds available stock, or the product has no line.
    pub fn update_quantity(&mut self, product: &Product, quantity: u32) -> CartMutation {
        if quantity < 1 {
            return CartMutation::RejectedInvalidQuantity;
        }
        if quantity > product.available_stock {
            return CartMutation::RejectedStockExceeded;
        }
        match self.lines.iter_mut().find(|l| l.product_id == product.id) {
            Some(line) => {
                line.quantity = quantity;
                CartMutation::Accepted
            }
            None => CartMutation::RejectedUnknownProduct,
        }
    }

    /// Drop every line. Called by checkout on the success path only.
    pub fn clear(&mut self) {
        self.lines.clear();
    }
}

/// Derived order totals. Recomputed on every read, never cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OrderSummary {
    pub subtotal: Money,
    pub tax: Money,
    pub total: Money,
}

impl OrderSummary {
    /// Compute subtotal, tax, and total for a cart.
    ///
    /// An empty cart totals to zero in the configured currency.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError`] on currency mismatch between lines or on
    /// decimal overflow.
    pub fn for_cart(
        cart: &Cart,
        tax_rate: Decimal,
        currency: Currency,
    ) -> Result<Self, MoneyError> {
        let mut subtotal = Money::zero(currency);
        for line in cart.lines() {
            subtotal = subtotal.checked_add(line.line_total()?)?;
        }
        let tax = subtotal.checked_mul_rate(tax_rate)?;
        let total = subtotal.checked_add(tax)?;
        Ok(Self {
            subtotal,
            tax,
            total,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use stablemart_core::StoreId;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
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

    fn summary(cart: &Cart) -> OrderSummary {
        OrderSummary::for_cart(cart, dec("0.10"), Currency::Cusd).unwrap()
    }

    #[test]
    fn test_add_twice_merges_into_one_line() {
        // Scenario A: two adds of a stocked product total with 10% tax.
        let p1 = product("p1", "10.00", 5);
        let mut cart = Cart::new();
        assert!(cart.add(&p1).accepted());
        assert!(cart.add(&p1).accepted());

        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.line(p1.id).unwrap().quantity, 2);

        let s = summary(&cart);
        assert_eq!(s.subtotal.amount, dec("20.00"));
        assert_eq!(s.tax.amount, dec("2.000"));
        assert_eq!(s.total.amount, dec("22.000"));
    }

    #[test]
    fn test_add_respects_stock_ceiling() {
        // Scenario B: stock of 1 caps the line at quantity 1.
        let p2 = product("p2", "4.00", 1);
        let mut cart = Cart::new();
        assert!(cart.add(&p2).accepted());
        assert_eq!(cart.add(&p2), CartMutation::RejectedStockExceeded);
        assert_eq!(cart.line(p2.id).unwrap().quantity, 1);
    }

    #[test]
    fn test_add_is_idempotent_at_ceiling() {
        let p = product("p", "1.00", 3);
        let mut cart = Cart::new();
        for _ in 0..10 {
            cart.add(&p);
        }
        assert_eq!(cart.line(p.id).unwrap().quantity, 3);
    }

    #[test]
    fn test_add_out_of_stock_is_noop() {
        let p = product("sold-out", "9.00", 0);
        let mut cart = Cart::new();
        assert_eq!(cart.add(&p), CartMutation::RejectedOutOfStock);
        assert!(cart.is_empty());
    }

    #[test]
    fn test_remove_is_idempotent() {
        let p = product("p", "2.00", 2);
        let mut cart = Cart::new();
        cart.add(&p);
        assert!(cart.remove(p.id).accepted());
        assert!(cart.is_empty());
        // Second remove of the same id is a no-op, not an error.
        assert!(cart.remove(p.id).accepted());
        assert!(cart.is_empty());
    }

    #[test]
    fn test_update_quantity_zero_is_rejected() {
        let p = product("p", "2.00", 5);
        let mut cart = Cart::new();
        cart.add(&p);
        assert_eq!(
            cart.update_quantity(&p, 0),
            CartMutation::RejectedInvalidQuantity
        );
        assert_eq!(cart.line(p.id).unwrap().quantity, 1);
    }

    #[test]
    fn test_update_quantity_over_stock_is_rejected() {
        // Scenario C: raising quantity past stock leaves it unchanged.
        let p1 = product("p1", "10.00", 5);
        let mut cart = Cart::new();
        cart.add(&p1);
        cart.add(&p1);
        assert_eq!(
            cart.update_quantity(&p1, 6),
            CartMutation::RejectedStockExceeded
        );
        assert_eq!(cart.line(p1.id).unwrap().quantity, 2);
    }

    #[test]
    fn test_update_quantity_within_stock() {
        let p = product("p", "3.00", 5);
        let mut cart = Cart::new();
        cart.add(&p);
        assert!(cart.update_quantity(&p, 4).accepted());
        assert_eq!(cart.line(p.id).unwrap().quantity, 4);
    }

    #[test]
    fn test_update_quantity_unknown_product() {
        let in_cart = product("a", "1.00", 5);
        let other = product("b", "1.00", 5);
        let mut cart = Cart::new();
        cart.add(&in_cart);
        assert_eq!(
            cart.update_quantity(&other, 2),
            CartMutation::RejectedUnknownProduct
        );
    }

    #[test]
    fn test_add_then_remove_restores_prior_state() {
        let a = product("a", "1.00", 5);
        let b = product("b", "2.00", 5);
        let c = product("c", "3.00", 5);
        let mut cart = Cart::new();
        cart.add(&a);
        cart.add(&b);
        cart.add(&b);
        let before = cart.clone();

        cart.add(&c);
        cart.remove(c.id);
        // Same lines, same order, same quantities for everything else.
        assert_eq!(cart, before);
    }

    #[test]
    fn test_empty_cart_totals_are_zero() {
        let s = summary(&Cart::new());
        assert_eq!(s.subtotal.amount, Decimal::ZERO);
        assert_eq!(s.tax.amount, Decimal::ZERO);
        assert_eq!(s.total.amount, Decimal::ZERO);
    }

    #[test]
    fn test_subtotal_is_sum_of_line_totals() {
        let a = product("a", "1.25", 10);
        let b = product("b", "0.75", 10);
        let mut cart = Cart::new();
        for _ in 0..3 {
            cart.add(&a);
        }
        cart.add(&b);

        let s = summary(&cart);
        assert_eq!(s.subtotal.amount, dec("4.50"));
        assert!(s.subtotal.amount >= Decimal::ZERO);
        assert_eq!(cart.item_count(), 4);
    }
}
