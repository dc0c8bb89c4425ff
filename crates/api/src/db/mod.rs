//! Persistence for the API.
//!
//! # Database: `shopfront`
//!
//! All tables live in the `shop` schema:
//!
//! - `user` - Accounts with Argon2 password hashes and roles
//! - `product` - Catalog entries and their stock counters
//! - `cart_item` - One row per `(user, product)` cart line
//! - `address` - Saved shipping addresses
//! - `order` / `order_line` - Placed orders with price and address snapshots
//!
//! Handlers and services depend on the repository traits defined here, never on
//! a concrete backend. [`postgres::PgStore`] is the production implementation;
//! `memory::MemoryStore` backs unit and integration tests.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/api/migrations/` and run via:
//! ```bash
//! cargo run -p shopfront-cli -- migrate
//! ```

#[cfg(any(test, feature = "test-support"))]
pub mod memory;
pub mod postgres;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use shopfront_core::{AddressId, Email, OrderId, OrderStatus, ProductId, Quantity, Role, UserId};

use crate::models::{
    Address, AddressInput, CartLine, NewProduct, NewUser, Order, OrderDraft, Product,
    ProductFilter, ProductUpdate, User,
};

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email) or lost compare-and-set.
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// A conditional stock decrement matched no row.
    #[error("insufficient stock for product {0}")]
    OutOfStock(ProductId),

    /// A value does not fit its column, such as an order total above
    /// `Price::MAX` or a cart line above `Quantity::MAX`.
    #[error("value out of range: {0}")]
    OutOfRange(String),
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Account storage.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email is already registered.
    async fn create(&self, user: NewUser) -> Result<User, RepositoryError>;

    /// Look up a user by ID.
    async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError>;

    /// Look up a user together with their password hash.
    async fn get_with_password_hash(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError>;

    /// Replace a user's password hash.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    async fn update_password_hash(&self, id: UserId, hash: &str) -> Result<(), RepositoryError>;

    /// Change a user's role.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no user has this email.
    async fn set_role(&self, email: &Email, role: Role) -> Result<User, RepositoryError>;
}

/// Catalog storage.
#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn create(&self, product: NewProduct) -> Result<Product, RepositoryError>;

    /// Apply a partial update.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    async fn update(&self, id: ProductId, update: ProductUpdate)
    -> Result<Product, RepositoryError>;

    /// Delete a product and every cart line referencing it.
    ///
    /// Placed orders keep their snapshots.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    async fn delete(&self, id: ProductId) -> Result<(), RepositoryError>;

    async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError>;

    /// Fetch several products at once. Missing IDs are skipped.
    async fn get_many(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError>;

    async fn list(&self, filter: &ProductFilter) -> Result<Vec<Product>, RepositoryError>;

    /// Case-insensitive substring search over title, description, category
    /// and brand. `keyword` is already normalised.
    async fn search(&self, keyword: &str) -> Result<Vec<Product>, RepositoryError>;
}

/// Cart line storage, keyed by `(user, product)`.
#[async_trait]
pub trait CartRepository: Send + Sync {
    /// All lines of a user's cart, ordered by product ID.
    async fn lines(&self, user: UserId) -> Result<Vec<CartLine>, RepositoryError>;

    /// Add units to a line, creating it if needed.
    ///
    /// Returns the merged line. The sum saturates at `Quantity::MAX`.
    async fn add(
        &self,
        user: UserId,
        product: ProductId,
        quantity: Quantity,
    ) -> Result<CartLine, RepositoryError>;

    /// Overwrite the quantity of an existing line. `None` if there is no line.
    async fn set_quantity(
        &self,
        user: UserId,
        product: ProductId,
        quantity: Quantity,
    ) -> Result<Option<CartLine>, RepositoryError>;

    /// Remove a line. Returns whether a line existed.
    async fn remove(&self, user: UserId, product: ProductId) -> Result<bool, RepositoryError>;
}

/// Shipping address storage. Every operation is scoped to the owner.
#[async_trait]
pub trait AddressRepository: Send + Sync {
    async fn create(&self, user: UserId, input: AddressInput) -> Result<Address, RepositoryError>;

    async fn list(&self, user: UserId) -> Result<Vec<Address>, RepositoryError>;

    async fn get(&self, user: UserId, id: AddressId) -> Result<Option<Address>, RepositoryError>;

    async fn update(
        &self,
        user: UserId,
        id: AddressId,
        input: AddressInput,
    ) -> Result<Option<Address>, RepositoryError>;

    /// Returns whether an address was deleted.
    async fn delete(&self, user: UserId, id: AddressId) -> Result<bool, RepositoryError>;
}

/// Order storage.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Place an order as one atomic unit.
    ///
    /// For each draft line the product's stock is decremented only if enough
    /// units remain, and the current effective price is captured. The order
    /// and its lines are inserted and the ordered products are removed from
    /// the user's cart. Either everything happens or nothing does.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::OutOfStock` naming the first product whose
    /// conditional decrement failed, or `RepositoryError::NotFound` if a
    /// product no longer exists.
    async fn place(&self, draft: OrderDraft) -> Result<Order, RepositoryError>;

    async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError>;

    /// A user's orders, newest first.
    async fn list_for_user(&self, user: UserId) -> Result<Vec<Order>, RepositoryError>;

    /// Every order, newest first.
    async fn list_all(&self) -> Result<Vec<Order>, RepositoryError>;

    /// Move an order from `from` to `to` if it is still in `from`.
    ///
    /// A transition to `Cancelled` returns the ordered units to stock in the
    /// same transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist and
    /// `RepositoryError::Conflict` if its status is no longer `from`.
    async fn transition(
        &self,
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<Order, RepositoryError>;
}

/// Backend liveness check for `/health/ready`.
#[async_trait]
pub trait HealthCheck: Send + Sync {
    async fn ping(&self) -> Result<(), RepositoryError>;
}

/// The full set of repositories the API depends on.
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub products: Arc<dyn ProductRepository>,
    pub carts: Arc<dyn CartRepository>,
    pub addresses: Arc<dyn AddressRepository>,
    pub orders: Arc<dyn OrderRepository>,
    pub health: Arc<dyn HealthCheck>,
}

impl Repositories {
    /// Use one store for every repository.
    #[must_use]
    pub fn from_store<S>(store: S) -> Self
    where
        S: UserRepository
            + ProductRepository
            + CartRepository
            + AddressRepository
            + OrderRepository
            + HealthCheck
            + 'static,
    {
        let store = Arc::new(store);
        Self {
            users: store.clone(),
            products: store.clone(),
            carts: store.clone(),
            addresses: store.clone(),
            orders: store.clone(),
            health: store,
        }
    }
}
