//! Cart aggregate.
//!
//! A cart holds at most one line per product. Adding a product that is
//! already present merges into the existing line by summing quantities;
//! updating a line sets its quantity exactly. Stock is not reserved: the
//! cart may hold more than is available, and checkout is where stock is
//! enforced.

use chrono::Utc;
use thiserror::Error;
use tracing::instrument;

use shopfront_core::{Price, PriceError, ProductId, Quantity, QuantityError, UserId};

use crate::db::{CartRepository, ProductRepository, RepositoryError};
use crate::models::{CartItemView, CartLine, CartView};

/// Errors from cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// Quantity is zero, negative or too large.
    #[error("invalid quantity: {0}")]
    InvalidQuantity(#[from] QuantityError),

    /// The cart subtotal would exceed the largest storable amount.
    #[error("cart total exceeds {}", Price::MAX)]
    TotalTooLarge(#[from] PriceError),

    /// Product does not exist.
    #[error("product not found")]
    ProductNotFound,

    /// The cart has no line for this product.
    #[error("cart item not found")]
    LineNotFound,

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Cart operations for one shopper at a time.
pub struct CartService<'a> {
    carts: &'a dyn CartRepository,
    products: &'a dyn ProductRepository,
}

impl<'a> CartService<'a> {
    #[must_use]
    pub const fn new(carts: &'a dyn CartRepository, products: &'a dyn ProductRepository) -> Self {
        Self { carts, products }
    }

    /// Add `quantity` units of a product, merging with an existing line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::InvalidQuantity` for `quantity <= 0` or when the
    /// merged line would exceed [`Quantity::MAX`], `CartError::TotalTooLarge`
    /// when the subtotal would exceed [`Price::MAX`] and
    /// `CartError::ProductNotFound` if the product does not exist.
    #[instrument(skip(self), fields(user_id = %user, product_id = %product))]
    pub async fn add(
        &self,
        user: UserId,
        product: ProductId,
        quantity: i64,
    ) -> Result<CartView, CartError> {
        let quantity = Quantity::try_from(quantity)?;
        if self.products.get(product).await?.is_none() {
            return Err(CartError::ProductNotFound);
        }

        let mut lines = self.carts.lines(user).await?;
        match lines.iter_mut().find(|l| l.product_id == product) {
            Some(line) => {
                line.quantity = line
                    .quantity
                    .checked_add(quantity)
                    .ok_or_else(too_many_units)?;
            }
            None => lines.push(CartLine {
                product_id: product,
                quantity,
                updated_at: Utc::now(),
            }),
        }
        self.priced(&lines).await?;

        let line = self
            .carts
            .add(user, product, quantity)
            .await
            .map_err(|e| match e {
                // Product deleted between the check and the insert.
                RepositoryError::NotFound => CartError::ProductNotFound,
                // A concurrent add pushed the line past the ceiling.
                RepositoryError::OutOfRange(_) => too_many_units(),
                other => CartError::Repository(other),
            })?;
        tracing::debug!(user_id = %user, product_id = %product, quantity = %line.quantity, "Cart line added");

        self.view(user).await
    }

    /// Set the quantity of an existing line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::InvalidQuantity` for `quantity <= 0`,
    /// `CartError::TotalTooLarge` when the subtotal would exceed
    /// [`Price::MAX`] and `CartError::LineNotFound` if the cart has no such
    /// line.
    #[instrument(skip(self), fields(user_id = %user, product_id = %product))]
    pub async fn update(
        &self,
        user: UserId,
        product: ProductId,
        quantity: i64,
    ) -> Result<CartView, CartError> {
        let quantity = Quantity::try_from(quantity)?;
        let mut lines = self.carts.lines(user).await?;
        let line = lines
            .iter_mut()
            .find(|l| l.product_id == product)
            .ok_or(CartError::LineNotFound)?;
        line.quantity = quantity;
        self.priced(&lines).await?;

        self.carts
            .set_quantity(user, product, quantity)
            .await?
            .ok_or(CartError::LineNotFound)?;

        self.view(user).await
    }

    /// Remove a line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::LineNotFound` if the cart has no such line.
    #[instrument(skip(self), fields(user_id = %user, product_id = %product))]
    pub async fn remove(&self, user: UserId, product: ProductId) -> Result<CartView, CartError> {
        if !self.carts.remove(user, product).await? {
            return Err(CartError::LineNotFound);
        }
        self.view(user).await
    }

    /// The cart joined with current catalog data.
    ///
    /// Lines whose product no longer exists are dropped from the view.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if a query fails and
    /// `CartError::TotalTooLarge` if repricing pushed the subtotal past
    /// [`Price::MAX`].
    pub async fn view(&self, user: UserId) -> Result<CartView, CartError> {
        let lines = self.carts.lines(user).await?;
        self.priced(&lines).await
    }

    /// Raw stored lines.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if the query fails.
    pub async fn lines(&self, user: UserId) -> Result<Vec<CartLine>, CartError> {
        Ok(self.carts.lines(user).await?)
    }

    async fn priced(&self, lines: &[CartLine]) -> Result<CartView, CartError> {
        let ids: Vec<ProductId> = lines.iter().map(|l| l.product_id).collect();
        let products = self.products.get_many(&ids).await?;

        let items = lines
            .iter()
            .filter_map(|line| {
                products
                    .iter()
                    .find(|p| p.id == line.product_id)
                    .map(|product| CartItemView::new(line, product))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(CartView::from_items(items)?)
    }
}

const fn too_many_units() -> CartError {
    CartError::InvalidQuantity(QuantityError::TooLarge { max: Quantity::MAX })
}
