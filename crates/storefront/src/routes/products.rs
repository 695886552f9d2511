//! Product listing route handlers.

use axum::{Json, extract::Path, extract::State};
use serde::Serialize;
use tracing::instrument;

use stablemart_core::{ProductId, StockLevel, StoreId};

use crate::catalog::Product;
use crate::error::Result;
use crate::state::AppState;

/// Product display data.
#[derive(Debug, Serialize)]
pub struct ProductView {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub price: String,
    pub available_stock: u32,
    pub stock_level: StockLevel,
    pub category: String,
    pub image_ref: Option<String>,
}

impl From<&Product> for ProductView {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id,
            name: product.name.clone(),
            description: product.description.clone(),
            price: product.price.display(),
            available_stock: product.available_stock,
            stock_level: product.stock_level(),
            category: product.category.clone(),
            image_ref: product.image_ref.clone(),
        }
    }
}

/// `GET /stores/{store_id}/products`
#[instrument(skip(state))]
pub async fn list(
    State(state): State<AppState>,
    Path(store_id): Path<StoreId>,
) -> Result<Json<Vec<ProductView>>> {
    let products = state.catalog().products(store_id).await?;
    Ok(Json(products.iter().map(ProductView::from).collect()))
}
