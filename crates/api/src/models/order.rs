//! Order types.
//!
//! An [`Order`] is immutable once placed except for its status: line titles
//! and prices are snapshots taken at checkout and never follow later catalog
//! edits.

use chrono::{DateTime, Utc};
use serde::Serialize;

use shopfront_core::{OrderId, OrderStatus, Price, PriceError, ProductId, Quantity, UserId};

use super::Address;

/// A placed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub lines: Vec<OrderLine>,
    pub shipping: ShippingAddress,
    pub status: OrderStatus,
    /// Sum of `unit_price * quantity` over all lines.
    pub total: Price,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A product line captured at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub product_id: ProductId,
    pub title: String,
    pub image_url: Option<String>,
    /// Effective price at the moment of checkout.
    pub unit_price: Price,
    pub quantity: Quantity,
}

impl OrderLine {
    /// `unit_price * quantity`.
    ///
    /// # Errors
    ///
    /// Returns `PriceError::TooLarge` if the amount exceeds `Price::MAX`.
    pub fn line_total(&self) -> Result<Price, PriceError> {
        self.unit_price.times(self.quantity)
    }
}

/// Total of an order's lines.
///
/// # Errors
///
/// Returns `PriceError::TooLarge` if any line or the sum exceeds `Price::MAX`.
pub fn order_total(lines: &[OrderLine]) -> Result<Price, PriceError> {
    let line_totals = lines
        .iter()
        .map(OrderLine::line_total)
        .collect::<Result<Vec<_>, _>>()?;
    Price::total(line_totals)
}

/// Copy of the shipping address taken at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    pub address: String,
    pub city: String,
    pub pincode: String,
    pub phone: String,
    pub notes: Option<String>,
}

impl From<&Address> for ShippingAddress {
    fn from(address: &Address) -> Self {
        Self {
            address: address.address.clone(),
            city: address.city.clone(),
            pincode: address.pincode.clone(),
            phone: address.phone.clone(),
            notes: address.notes.clone(),
        }
    }
}

/// Everything the order store needs to place an order atomically.
///
/// Prices are not part of the draft: the store reads them under the same
/// transaction that decrements stock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderDraft {
    pub user_id: UserId,
    /// One entry per product, sorted by product ID.
    pub lines: Vec<(ProductId, Quantity)>,
    pub shipping: ShippingAddress,
}

/// A cart line that cannot be fulfilled from current stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockShortfall {
    pub product_id: ProductId,
    pub title: String,
    pub requested: u32,
    pub available: u32,
}
