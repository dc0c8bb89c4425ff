//! Order assembly and order lifecycle.
//!
//! Checkout turns the shopper's cart into an order in one atomic store
//! operation. A pre-check reports every short line at once; the store's
//! conditional decrement is what actually guarantees stock never goes
//! negative when checkouts race.

use thiserror::Error;
use tracing::instrument;

use shopfront_core::{AddressId, OrderId, OrderStatus, Price, PriceError, ProductId, UserId};

use crate::db::{
    AddressRepository, CartRepository, OrderRepository, ProductRepository, RepositoryError,
};
use crate::models::{CartLine, Order, OrderDraft, Product, ShippingAddress, StockShortfall};

/// Title reported for a cart line whose product has been deleted.
const UNAVAILABLE_TITLE: &str = "Unavailable product";

/// Errors from checkout and order operations.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Nothing to order.
    #[error("cart is empty")]
    EmptyCart,

    /// The address does not exist or belongs to someone else.
    #[error("address not found")]
    AddressNotFound,

    /// One or more lines exceed available stock.
    #[error("insufficient stock for {} item(s)", .0.len())]
    InsufficientStock(Vec<StockShortfall>),

    /// The order total would exceed the largest storable amount.
    #[error("order total exceeds {}", Price::MAX)]
    TotalTooLarge,

    /// The order does not exist or belongs to someone else.
    #[error("order not found")]
    OrderNotFound,

    /// The requested status change is not allowed from the current status.
    #[error("cannot change order status from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Repositories needed by [`CheckoutService`].
pub struct CheckoutService<'a> {
    carts: &'a dyn CartRepository,
    products: &'a dyn ProductRepository,
    addresses: &'a dyn AddressRepository,
    orders: &'a dyn OrderRepository,
}

impl<'a> CheckoutService<'a> {
    #[must_use]
    pub const fn new(
        carts: &'a dyn CartRepository,
        products: &'a dyn ProductRepository,
        addresses: &'a dyn AddressRepository,
        orders: &'a dyn OrderRepository,
    ) -> Self {
        Self {
            carts,
            products,
            addresses,
            orders,
        }
    }

    /// Place an order for everything in the user's cart.
    ///
    /// On success stock is decremented, prices and the shipping address are
    /// snapshotted onto the order, and the ordered lines leave the cart. On
    /// failure nothing changes.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::AddressNotFound`, `CheckoutError::EmptyCart`,
    /// `CheckoutError::InsufficientStock` (listing each short line) or
    /// `CheckoutError::TotalTooLarge`.
    #[instrument(skip(self), fields(user_id = %user, address_id = %address_id))]
    pub async fn place_order(
        &self,
        user: UserId,
        address_id: AddressId,
    ) -> Result<Order, CheckoutError> {
        let address = self
            .addresses
            .get(user, address_id)
            .await?
            .ok_or(CheckoutError::AddressNotFound)?;

        let lines = self.carts.lines(user).await?;
        if lines.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let ids: Vec<ProductId> = lines.iter().map(|l| l.product_id).collect();
        let products = self.products.get_many(&ids).await?;

        let shortfalls = find_shortfalls(&lines, &products);
        if !shortfalls.is_empty() {
            tracing::warn!(user_id = %user, short_lines = shortfalls.len(), "Checkout rejected: insufficient stock");
            return Err(CheckoutError::InsufficientStock(shortfalls));
        }
        if priced_total(&lines, &products).is_err() {
            tracing::warn!(user_id = %user, "Checkout rejected: total too large");
            return Err(CheckoutError::TotalTooLarge);
        }

        let mut draft_lines: Vec<_> = lines.iter().map(|l| (l.product_id, l.quantity)).collect();
        draft_lines.sort_by_key(|(id, _)| *id);

        let draft = OrderDraft {
            user_id: user,
            lines: draft_lines,
            shipping: ShippingAddress::from(&address),
        };

        match self.orders.place(draft).await {
            Ok(order) => {
                tracing::info!(
                    order_id = %order.id,
                    user_id = %user,
                    total = %order.total,
                    lines = order.lines.len(),
                    "Order placed"
                );
                Ok(order)
            }
            // Another checkout took the stock after the pre-check passed.
            Err(e @ (RepositoryError::OutOfStock(_) | RepositoryError::NotFound)) => {
                tracing::warn!(user_id = %user, error = %e, "Checkout lost a stock race");
                let products = self.products.get_many(&ids).await?;
                let mut shortfalls = find_shortfalls(&lines, &products);
                if shortfalls.is_empty()
                    && let RepositoryError::OutOfStock(product_id) = e
                    && let Some(line) = lines.iter().find(|l| l.product_id == product_id)
                {
                    shortfalls.push(shortfall(line, products.iter().find(|p| p.id == product_id)));
                }
                Err(CheckoutError::InsufficientStock(shortfalls))
            }
            Err(RepositoryError::OutOfRange(_)) => Err(CheckoutError::TotalTooLarge),
            Err(e) => Err(e.into()),
        }
    }

    /// A user's own orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::Repository` if the query fails.
    pub async fn list_for_user(&self, user: UserId) -> Result<Vec<Order>, CheckoutError> {
        Ok(self.orders.list_for_user(user).await?)
    }

    /// One of the user's own orders.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::OrderNotFound` if it does not exist or is not
    /// the user's.
    pub async fn get_for_user(&self, user: UserId, id: OrderId) -> Result<Order, CheckoutError> {
        self.orders
            .get(id)
            .await?
            .filter(|order| order.user_id == user)
            .ok_or(CheckoutError::OrderNotFound)
    }

    /// Every order, newest first.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::Repository` if the query fails.
    pub async fn list_all(&self) -> Result<Vec<Order>, CheckoutError> {
        Ok(self.orders.list_all().await?)
    }

    /// Any order by ID.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::OrderNotFound` if it does not exist.
    pub async fn get(&self, id: OrderId) -> Result<Order, CheckoutError> {
        self.orders
            .get(id)
            .await?
            .ok_or(CheckoutError::OrderNotFound)
    }

    /// Move an order to `to` following the status lifecycle.
    ///
    /// Cancelling returns the ordered units to stock.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::OrderNotFound` or, when `to` is not reachable
    /// from the current status (or the status changed concurrently),
    /// `CheckoutError::InvalidTransition`.
    #[instrument(skip(self), fields(order_id = %id, to = %to))]
    pub async fn update_status(&self, id: OrderId, to: OrderStatus) -> Result<Order, CheckoutError> {
        let order = self.get(id).await?;
        self.transition(order, to).await
    }

    /// Cancel one of the user's own orders while it is still cancellable.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::OrderNotFound` if the order is not the user's
    /// and `CheckoutError::InvalidTransition` once it has shipped.
    #[instrument(skip(self), fields(user_id = %user, order_id = %id))]
    pub async fn cancel_for_user(&self, user: UserId, id: OrderId) -> Result<Order, CheckoutError> {
        let order = self.get_for_user(user, id).await?;
        self.transition(order, OrderStatus::Cancelled).await
    }

    async fn transition(&self, order: Order, to: OrderStatus) -> Result<Order, CheckoutError> {
        let from = order.status;
        if !from.can_transition_to(to) {
            return Err(CheckoutError::InvalidTransition { from, to });
        }

        let updated = self
            .orders
            .transition(order.id, from, to)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => CheckoutError::OrderNotFound,
                RepositoryError::Conflict(_) => CheckoutError::InvalidTransition { from, to },
                other => CheckoutError::Repository(other),
            })?;

        tracing::info!(order_id = %order.id, %from, %to, "Order status changed");
        Ok(updated)
    }
}

/// Lines whose product is gone or has fewer units than requested.
fn find_shortfalls(lines: &[CartLine], products: &[Product]) -> Vec<StockShortfall> {
    lines
        .iter()
        .filter_map(|line| {
            let product = products.iter().find(|p| p.id == line.product_id);
            match product {
                Some(p) if p.has_stock_for(line.quantity) => None,
                _ => Some(shortfall(line, product)),
            }
        })
        .collect()
}

/// What the order would cost at current prices.
fn priced_total(lines: &[CartLine], products: &[Product]) -> Result<Price, PriceError> {
    let mut total = Price::ZERO;
    for line in lines {
        if let Some(product) = products.iter().find(|p| p.id == line.product_id) {
            total = total.checked_add(product.effective_price().times(line.quantity)?)?;
        }
    }
    Ok(total)
}

fn shortfall(line: &CartLine, product: Option<&Product>) -> StockShortfall {
    StockShortfall {
        product_id: line.product_id,
        title: product.map_or_else(|| UNAVAILABLE_TITLE.to_string(), |p| p.title.clone()),
        requested: line.quantity.get(),
        available: product.map_or(0, |p| p.total_stock),
    }
}
