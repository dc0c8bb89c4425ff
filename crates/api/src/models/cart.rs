//! Cart types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use shopfront_core::{Price, PriceError, ProductId, Quantity};

use super::Product;

/// One stored cart line: a product and how many units the shopper wants.
///
/// Each `(user, product)` pair has at most one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartLine {
    pub product_id: ProductId,
    pub quantity: Quantity,
    pub updated_at: DateTime<Utc>,
}

/// A cart line joined with current catalog data for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItemView {
    pub product_id: ProductId,
    pub title: String,
    pub image_url: Option<String>,
    pub price: Price,
    pub sale_price: Option<Price>,
    pub quantity: Quantity,
    /// Units currently in stock; may be below `quantity`.
    pub available: u32,
    pub line_total: Price,
}

impl CartItemView {
    /// Join a stored line with its product.
    ///
    /// # Errors
    ///
    /// Returns `PriceError::TooLarge` if the line total exceeds `Price::MAX`.
    pub fn new(line: &CartLine, product: &Product) -> Result<Self, PriceError> {
        Ok(Self {
            product_id: line.product_id,
            title: product.title.clone(),
            image_url: product.image_url.clone(),
            price: product.price,
            sale_price: product.sale_price,
            quantity: line.quantity,
            available: product.total_stock,
            line_total: product.effective_price().times(line.quantity)?,
        })
    }
}

/// The shopper's cart as returned by the cart endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    pub items: Vec<CartItemView>,
    pub subtotal: Price,
    pub item_count: u32,
}

impl CartView {
    /// Total the joined lines.
    ///
    /// # Errors
    ///
    /// Returns `PriceError::TooLarge` if the subtotal exceeds `Price::MAX`.
    pub fn from_items(items: Vec<CartItemView>) -> Result<Self, PriceError> {
        let subtotal = Price::total(items.iter().map(|item| item.line_total))?;
        let item_count = items
            .iter()
            .map(|item| item.quantity.get())
            .fold(0_u32, u32::saturating_add);
        Ok(Self {
            items,
            subtotal,
            item_count,
        })
    }
}
