//! Wire and domain types for the commerce API.
//!
//! Wire structs mirror the API's JSON exactly; domain types are what the rest
//! of the storefront sees. Conversion validates price and stock so invalid
//! payloads surface as [`CatalogError::Parse`](super::CatalogError::Parse)
//! instead of leaking into business logic.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use stablemart_core::{Currency, Money, ProductId, StockLevel, StoreId};

use super::CatalogError;

/// A product as returned by `GET /stores/{id}/products`.
#[derive(Debug, Clone, Deserialize)]
pub struct WireProduct {
    pub id: Uuid,
    pub store_id: Uuid,
    pub product_name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Decimal,
    pub quantity: i64,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub image_cid: Option<String>,
}

/// A catalog product snapshot as seen by the storefront.
///
/// Read-only within the cart/checkout flow; the commerce API owns mutation.
/// `available_stock` is the stock observed at fetch time and may go stale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Product {
    pub id: ProductId,
    pub store_id: StoreId,
    pub name: String,
    pub description: String,
    pub price: Money,
    pub available_stock: u32,
    pub category: String,
    /// Content identifier of the product image, when one was uploaded.
    pub image_ref: Option<String>,
}

impl Product {
    /// Validate a wire product into the domain type.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Parse`] for negative price or stock.
    pub fn from_wire(wire: WireProduct, currency: Currency) -> Result<Self, CatalogError> {
        if wire.price.is_sign_negative() {
            return Err(CatalogError::Parse(format!(
                "product {} has negative price {}",
                wire.id, wire.price
            )));
        }
        let available_stock = u32::try_from(wire.quantity).map_err(|_| {
            CatalogError::Parse(format!(
                "product {} has invalid stock {}",
                wire.id, wire.quantity
            ))
        })?;

        Ok(Self {
            id: ProductId::new(wire.id),
            store_id: StoreId::new(wire.store_id),
            name: wire.product_name,
            description: wire.description.unwrap_or_default(),
            price: Money::new(wire.price, currency),
            available_stock,
            category: wire.category.unwrap_or_else(|| "general".to_string()),
            image_ref: wire.image_cid,
        })
    }

    /// Stock badge band for this snapshot.
    #[must_use]
    pub const fn stock_level(&self) -> StockLevel {
        StockLevel::from_units(self.available_stock)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn wire(price: &str, quantity: i64) -> WireProduct {
        WireProduct {
            id: Uuid::new_v4(),
            store_id: Uuid::new_v4(),
            product_name: "Leather Wallet".to_string(),
            description: Some("Hand stitched".to_string()),
            price: price.parse().unwrap(),
            quantity,
            category: None,
            image_cid: Some("bafy123".to_string()),
        }
    }

    #[test]
    fn test_from_wire_valid() {
        let p = Product::from_wire(wire("25.00", 7), Currency::Cusd).unwrap();
        assert_eq!(p.name, "Leather Wallet");
        assert_eq!(p.available_stock, 7);
        assert_eq!(p.price.currency, Currency::Cusd);
        assert_eq!(p.category, "general");
        assert_eq!(p.stock_level(), StockLevel::InStock);
    }

    #[test]
    fn test_from_wire_rejects_negative_price() {
        let result = Product::from_wire(wire("-1.00", 7), Currency::Cusd);
        assert!(matches!(result, Err(CatalogError::Parse(_))));
    }

    #[test]
    fn test_from_wire_rejects_negative_stock() {
        let result = Product::from_wire(wire("1.00", -3), Currency::Cusd);
        assert!(matches!(result, Err(CatalogError::Parse(_))));
    }

    #[test]
    fn test_wire_product_deserializes_api_shape() {
        let json = serde_json::json!({
            "id": "0b9f3c47-4a2e-4a37-9c43-111111111111",
            "store_id": "0b9f3c47-4a2e-4a37-9c43-222222222222",
            "product_name": "Premium T-Shirt",
            "description": "Soft cotton",
            "price": "10.00",
            "quantity": 5,
            "image_cid": null
        });
        let wire: WireProduct = serde_json::from_value(json).unwrap();
        let p = Product::from_wire(wire, Currency::Cusd).unwrap();
        assert_eq!(p.price.amount, "10.00".parse::<Decimal>().unwrap());
        assert_eq!(p.available_stock, 5);
    }
}
