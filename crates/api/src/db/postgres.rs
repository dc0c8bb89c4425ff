//! `PostgreSQL` implementation of the repository traits.
//!
//! Queries are checked at runtime (`query_as` + `FromRow`) so the crate builds
//! without a live database or offline query data.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};

use shopfront_core::{
    AddressId, Email, OrderId, OrderStatus, Price, ProductId, Quantity, Role, UserId,
};

use super::{
    AddressRepository, CartRepository, HealthCheck, OrderRepository, ProductRepository,
    RepositoryError, UserRepository,
};
use crate::models::product::effective_price;
use crate::models::{
    Address, AddressInput, CartLine, NewProduct, NewUser, Order, OrderDraft, OrderLine, Product,
    ProductFilter, ProductSort, ProductUpdate, ShippingAddress, User, order_total,
};

const USER_COLUMNS: &str = "id, email, user_name, role, created_at, updated_at";
const PRODUCT_COLUMNS: &str = "id, title, description, category, brand, price, sale_price, \
                               total_stock, image_url, created_at, updated_at";
const ADDRESS_COLUMNS: &str =
    "id, user_id, address, city, pincode, phone, notes, created_at, updated_at";
const ORDER_COLUMNS: &str = "id, user_id, status, total, ship_address, ship_city, ship_pincode, \
                             ship_phone, ship_notes, created_at, updated_at";

/// Repository backed by a `PostgreSQL` pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a store over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

// =============================================================================
// Row types
// =============================================================================

#[derive(sqlx::FromRow)]
struct UserRow {
    id: UserId,
    email: Email,
    user_name: String,
    role: Role,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            email: row.email,
            user_name: row.user_name,
            role: row.role,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct UserWithHashRow {
    #[sqlx(flatten)]
    user: UserRow,
    password_hash: String,
}

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: ProductId,
    title: String,
    description: String,
    category: String,
    brand: String,
    price: Price,
    sale_price: Option<Price>,
    total_stock: i32,
    image_url: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = RepositoryError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        let total_stock = u32::try_from(row.total_stock).map_err(|_| {
            RepositoryError::DataCorruption(format!(
                "negative stock {} for product {}",
                row.total_stock, row.id
            ))
        })?;
        Ok(Self {
            id: row.id,
            title: row.title,
            description: row.description,
            category: row.category,
            brand: row.brand,
            price: row.price,
            sale_price: row.sale_price,
            total_stock,
            image_url: row.image_url,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn products_from_rows(rows: Vec<ProductRow>) -> Result<Vec<Product>, RepositoryError> {
    rows.into_iter().map(Product::try_from).collect()
}

#[derive(sqlx::FromRow)]
struct CartRow {
    product_id: ProductId,
    quantity: i32,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CartRow> for CartLine {
    type Error = RepositoryError;

    fn try_from(row: CartRow) -> Result<Self, Self::Error> {
        Ok(Self {
            product_id: row.product_id,
            quantity: quantity_from_db(row.quantity)?,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct AddressRow {
    id: AddressId,
    user_id: UserId,
    address: String,
    city: String,
    pincode: String,
    phone: String,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<AddressRow> for Address {
    fn from(row: AddressRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            address: row.address,
            city: row.city,
            pincode: row.pincode,
            phone: row.phone,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    user_id: UserId,
    status: OrderStatus,
    total: Price,
    ship_address: String,
    ship_city: String,
    ship_pincode: String,
    ship_phone: String,
    ship_notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, lines: Vec<OrderLine>) -> Order {
        Order {
            id: self.id,
            user_id: self.user_id,
            lines,
            shipping: ShippingAddress {
                address: self.ship_address,
                city: self.ship_city,
                pincode: self.ship_pincode,
                phone: self.ship_phone,
                notes: self.ship_notes,
            },
            status: self.status,
            total: self.total,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct OrderLineRow {
    order_id: OrderId,
    product_id: ProductId,
    title: String,
    image_url: Option<String>,
    unit_price: Price,
    quantity: i32,
}

impl TryFrom<OrderLineRow> for OrderLine {
    type Error = RepositoryError;

    fn try_from(row: OrderLineRow) -> Result<Self, Self::Error> {
        Ok(Self {
            product_id: row.product_id,
            title: row.title,
            image_url: row.image_url,
            unit_price: row.unit_price,
            quantity: quantity_from_db(row.quantity)?,
        })
    }
}

/// Product columns returned by the conditional stock decrement.
#[derive(sqlx::FromRow)]
struct DecrementedRow {
    title: String,
    image_url: Option<String>,
    price: Price,
    sale_price: Option<Price>,
}

fn quantity_from_db(value: i32) -> Result<Quantity, RepositoryError> {
    Quantity::try_from(value)
        .map_err(|e| RepositoryError::DataCorruption(format!("invalid quantity {value}: {e}")))
}

fn stock_to_db(stock: u32) -> Result<i32, RepositoryError> {
    i32::try_from(stock)
        .map_err(|_| RepositoryError::OutOfRange(format!("stock {stock} exceeds storage range")))
}

fn unique_violation(e: sqlx::Error, message: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(message.to_owned());
    }
    RepositoryError::Database(e)
}

/// Escape `LIKE` wildcards so a keyword only matches literally.
fn like_pattern(keyword: &str) -> String {
    let escaped = keyword
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

// =============================================================================
// Users
// =============================================================================

#[async_trait]
impl UserRepository for PgStore {
    async fn create(&self, user: NewUser) -> Result<User, RepositoryError> {
        let row: UserRow = sqlx::query_as(&format!(
            "INSERT INTO shop.user (email, user_name, password_hash, role) \
             VALUES ($1, $2, $3, $4) RETURNING {USER_COLUMNS}"
        ))
        .bind(&user.email)
        .bind(&user.user_name)
        .bind(&user.password_hash)
        .bind(user.role)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| unique_violation(e, "email already exists"))?;

        Ok(row.into())
    }

    async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM shop.user WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(User::from))
    }

    async fn get_with_password_hash(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        let row: Option<UserWithHashRow> = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS}, password_hash FROM shop.user WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| (r.user.into(), r.password_hash)))
    }

    async fn update_password_hash(&self, id: UserId, hash: &str) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE shop.user SET password_hash = $2, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(hash)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn set_role(&self, email: &Email, role: Role) -> Result<User, RepositoryError> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            "UPDATE shop.user SET role = $2, updated_at = now() WHERE email = $1 \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(email)
        .bind(role)
        .fetch_optional(&self.pool)
        .await?;

        row.map(User::from).ok_or(RepositoryError::NotFound)
    }
}

// =============================================================================
// Products
// =============================================================================

#[async_trait]
impl ProductRepository for PgStore {
    async fn create(&self, product: NewProduct) -> Result<Product, RepositoryError> {
        let row: ProductRow = sqlx::query_as(&format!(
            "INSERT INTO shop.product \
             (title, description, category, brand, price, sale_price, total_stock, image_url) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(&product.title)
        .bind(&product.description)
        .bind(&product.category)
        .bind(&product.brand)
        .bind(product.price)
        .bind(product.sale_price)
        .bind(stock_to_db(product.total_stock)?)
        .bind(&product.image_url)
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn update(
        &self,
        id: ProductId,
        update: ProductUpdate,
    ) -> Result<Product, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let current: Option<ProductRow> = sqlx::query_as(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM shop.product WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
        let mut product = Product::try_from(current.ok_or(RepositoryError::NotFound)?)?;
        update.apply_to(&mut product);

        let row: ProductRow = sqlx::query_as(&format!(
            "UPDATE shop.product SET title = $2, description = $3, category = $4, brand = $5, \
             price = $6, sale_price = $7, total_stock = $8, image_url = $9, updated_at = now() \
             WHERE id = $1 RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(id)
        .bind(&product.title)
        .bind(&product.description)
        .bind(&product.category)
        .bind(&product.brand)
        .bind(product.price)
        .bind(product.sale_price)
        .bind(stock_to_db(product.total_stock)?)
        .bind(&product.image_url)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        row.try_into()
    }

    async fn delete(&self, id: ProductId) -> Result<(), RepositoryError> {
        // cart_item rows go with it (ON DELETE CASCADE)
        let result = sqlx::query("DELETE FROM shop.product WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row: Option<ProductRow> = sqlx::query_as(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM shop.product WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Product::try_from).transpose()
    }

    async fn get_many(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        let ids: Vec<i32> = ids.iter().map(ProductId::as_i32).collect();
        let rows: Vec<ProductRow> = sqlx::query_as(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM shop.product WHERE id = ANY($1) ORDER BY id"
        ))
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        products_from_rows(rows)
    }

    async fn list(&self, filter: &ProductFilter) -> Result<Vec<Product>, RepositoryError> {
        let mut query: QueryBuilder<'_, Postgres> = QueryBuilder::new(format!(
            "SELECT {PRODUCT_COLUMNS} FROM shop.product WHERE TRUE"
        ));
        if !filter.categories.is_empty() {
            query
                .push(" AND category = ANY(")
                .push_bind(&filter.categories)
                .push(")");
        }
        if !filter.brands.is_empty() {
            query
                .push(" AND brand = ANY(")
                .push_bind(&filter.brands)
                .push(")");
        }
        query.push(match filter.sort {
            ProductSort::PriceLowToHigh => {
                " ORDER BY LEAST(price, COALESCE(sale_price, price)) ASC, id ASC"
            }
            ProductSort::PriceHighToLow => {
                " ORDER BY LEAST(price, COALESCE(sale_price, price)) DESC, id ASC"
            }
            ProductSort::TitleAToZ => " ORDER BY lower(title) ASC, id ASC",
            ProductSort::TitleZToA => " ORDER BY lower(title) DESC, id ASC",
        });

        let rows: Vec<ProductRow> = query.build_query_as().fetch_all(&self.pool).await?;
        products_from_rows(rows)
    }

    async fn search(&self, keyword: &str) -> Result<Vec<Product>, RepositoryError> {
        let rows: Vec<ProductRow> = sqlx::query_as(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM shop.product \
             WHERE title ILIKE $1 OR description ILIKE $1 OR category ILIKE $1 OR brand ILIKE $1 \
             ORDER BY lower(title), id"
        ))
        .bind(like_pattern(keyword))
        .fetch_all(&self.pool)
        .await?;

        products_from_rows(rows)
    }
}

// =============================================================================
// Carts
// =============================================================================

#[async_trait]
impl CartRepository for PgStore {
    async fn lines(&self, user: UserId) -> Result<Vec<CartLine>, RepositoryError> {
        let rows: Vec<CartRow> = sqlx::query_as(
            "SELECT product_id, quantity, updated_at FROM shop.cart_item \
             WHERE user_id = $1 ORDER BY product_id",
        )
        .bind(user)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(CartLine::try_from).collect()
    }

    async fn add(
        &self,
        user: UserId,
        product: ProductId,
        quantity: Quantity,
    ) -> Result<CartLine, RepositoryError> {
        let max = i32::try_from(Quantity::MAX).unwrap_or(i32::MAX);
        // A merge past the per-line maximum updates nothing and returns no row.
        let row: Option<CartRow> = sqlx::query_as(
            "INSERT INTO shop.cart_item (user_id, product_id, quantity) VALUES ($1, $2, $3) \
             ON CONFLICT (user_id, product_id) DO UPDATE \
             SET quantity = shop.cart_item.quantity + EXCLUDED.quantity, \
                 updated_at = now() \
             WHERE shop.cart_item.quantity + EXCLUDED.quantity <= $4 \
             RETURNING product_id, quantity, updated_at",
        )
        .bind(user)
        .bind(product)
        .bind(quantity.as_i32())
        .bind(max)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_foreign_key_violation()
            {
                return RepositoryError::NotFound;
            }
            RepositoryError::Database(e)
        })?;

        row.ok_or_else(|| {
            RepositoryError::OutOfRange(format!("cart quantity above {}", Quantity::MAX))
        })?
        .try_into()
    }

    async fn set_quantity(
        &self,
        user: UserId,
        product: ProductId,
        quantity: Quantity,
    ) -> Result<Option<CartLine>, RepositoryError> {
        let row: Option<CartRow> = sqlx::query_as(
            "UPDATE shop.cart_item SET quantity = $3, updated_at = now() \
             WHERE user_id = $1 AND product_id = $2 \
             RETURNING product_id, quantity, updated_at",
        )
        .bind(user)
        .bind(product)
        .bind(quantity.as_i32())
        .fetch_optional(&self.pool)
        .await?;

        row.map(CartLine::try_from).transpose()
    }

    async fn remove(&self, user: UserId, product: ProductId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.cart_item WHERE user_id = $1 AND product_id = $2")
            .bind(user)
            .bind(product)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

// =============================================================================
// Addresses
// =============================================================================

#[async_trait]
impl AddressRepository for PgStore {
    async fn create(&self, user: UserId, input: AddressInput) -> Result<Address, RepositoryError> {
        let row: AddressRow = sqlx::query_as(&format!(
            "INSERT INTO shop.address (user_id, address, city, pincode, phone, notes) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {ADDRESS_COLUMNS}"
        ))
        .bind(user)
        .bind(&input.address)
        .bind(&input.city)
        .bind(&input.pincode)
        .bind(&input.phone)
        .bind(&input.notes)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn list(&self, user: UserId) -> Result<Vec<Address>, RepositoryError> {
        let rows: Vec<AddressRow> = sqlx::query_as(&format!(
            "SELECT {ADDRESS_COLUMNS} FROM shop.address WHERE user_id = $1 ORDER BY id"
        ))
        .bind(user)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Address::from).collect())
    }

    async fn get(&self, user: UserId, id: AddressId) -> Result<Option<Address>, RepositoryError> {
        let row: Option<AddressRow> = sqlx::query_as(&format!(
            "SELECT {ADDRESS_COLUMNS} FROM shop.address WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Address::from))
    }

    async fn update(
        &self,
        user: UserId,
        id: AddressId,
        input: AddressInput,
    ) -> Result<Option<Address>, RepositoryError> {
        let row: Option<AddressRow> = sqlx::query_as(&format!(
            "UPDATE shop.address SET address = $3, city = $4, pincode = $5, phone = $6, \
             notes = $7, updated_at = now() \
             WHERE id = $1 AND user_id = $2 RETURNING {ADDRESS_COLUMNS}"
        ))
        .bind(id)
        .bind(user)
        .bind(&input.address)
        .bind(&input.city)
        .bind(&input.pincode)
        .bind(&input.phone)
        .bind(&input.notes)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Address::from))
    }

    async fn delete(&self, user: UserId, id: AddressId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.address WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

// =============================================================================
// Orders
// =============================================================================

impl PgStore {
    /// Attach lines to order rows, preserving row order.
    async fn load_orders(&self, rows: Vec<OrderRow>) -> Result<Vec<Order>, RepositoryError> {
        let ids: Vec<i32> = rows.iter().map(|r| r.id.as_i32()).collect();
        let line_rows: Vec<OrderLineRow> = sqlx::query_as(
            "SELECT order_id, product_id, title, image_url, unit_price, quantity \
             FROM shop.order_line WHERE order_id = ANY($1) ORDER BY order_id, position",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut lines_by_order: HashMap<OrderId, Vec<OrderLine>> = HashMap::new();
        for line in line_rows {
            let order_id = line.order_id;
            lines_by_order
                .entry(order_id)
                .or_default()
                .push(OrderLine::try_from(line)?);
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let lines = lines_by_order.remove(&row.id).unwrap_or_default();
                row.into_order(lines)
            })
            .collect())
    }
}

async fn fetch_order_row(
    tx: &mut Transaction<'_, Postgres>,
    id: OrderId,
) -> Result<Option<OrderRow>, RepositoryError> {
    let row = sqlx::query_as(&format!(
        "SELECT {ORDER_COLUMNS} FROM shop.order WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(&mut **tx)
    .await?;
    Ok(row)
}

#[async_trait]
impl OrderRepository for PgStore {
    async fn place(&self, draft: OrderDraft) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        // Lines arrive sorted by product ID so concurrent checkouts lock
        // product rows in the same order.
        let mut lines = Vec::with_capacity(draft.lines.len());
        for (product_id, quantity) in &draft.lines {
            let row: Option<DecrementedRow> = sqlx::query_as(
                "UPDATE shop.product SET total_stock = total_stock - $2, updated_at = now() \
                 WHERE id = $1 AND total_stock >= $2 \
                 RETURNING title, image_url, price, sale_price",
            )
            .bind(product_id)
            .bind(quantity.as_i32())
            .fetch_optional(&mut *tx)
            .await?;

            let Some(row) = row else {
                let exists: Option<i32> =
                    sqlx::query_scalar("SELECT id FROM shop.product WHERE id = $1")
                        .bind(product_id)
                        .fetch_optional(&mut *tx)
                        .await?;
                // Dropping the transaction rolls back earlier decrements.
                return Err(match exists {
                    Some(_) => RepositoryError::OutOfStock(*product_id),
                    None => RepositoryError::NotFound,
                });
            };

            lines.push(OrderLine {
                product_id: *product_id,
                title: row.title,
                image_url: row.image_url,
                unit_price: effective_price(row.price, row.sale_price),
                quantity: *quantity,
            });
        }

        // Dropping the transaction on error rolls back the decrements.
        let total = order_total(&lines).map_err(|e| RepositoryError::OutOfRange(e.to_string()))?;
        let shipping = &draft.shipping;
        let order_row: OrderRow = sqlx::query_as(&format!(
            "INSERT INTO shop.order \
             (user_id, status, total, ship_address, ship_city, ship_pincode, ship_phone, ship_notes) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {ORDER_COLUMNS}"
        ))
        .bind(draft.user_id)
        .bind(OrderStatus::Pending)
        .bind(total)
        .bind(&shipping.address)
        .bind(&shipping.city)
        .bind(&shipping.pincode)
        .bind(&shipping.phone)
        .bind(&shipping.notes)
        .fetch_one(&mut *tx)
        .await?;

        for (position, line) in (0_i32..).zip(&lines) {
            sqlx::query(
                "INSERT INTO shop.order_line \
                 (order_id, position, product_id, title, image_url, unit_price, quantity) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(order_row.id)
            .bind(position)
            .bind(line.product_id)
            .bind(&line.title)
            .bind(&line.image_url)
            .bind(line.unit_price)
            .bind(line.quantity.as_i32())
            .execute(&mut *tx)
            .await?;
        }

        let ordered: Vec<i32> = draft.lines.iter().map(|(id, _)| id.as_i32()).collect();
        sqlx::query("DELETE FROM shop.cart_item WHERE user_id = $1 AND product_id = ANY($2)")
            .bind(draft.user_id)
            .bind(&ordered)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(order_row.into_order(lines))
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row: Option<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM shop.order WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(self.load_orders(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn list_for_user(&self, user: UserId) -> Result<Vec<Order>, RepositoryError> {
        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM shop.order WHERE user_id = $1 \
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(user)
        .fetch_all(&self.pool)
        .await?;

        self.load_orders(rows).await
    }

    async fn list_all(&self) -> Result<Vec<Order>, RepositoryError> {
        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM shop.order ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        self.load_orders(rows).await
    }

    async fn transition(
        &self,
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let updated: Option<OrderId> = sqlx::query_scalar(
            "UPDATE shop.order SET status = $3, updated_at = now() \
             WHERE id = $1 AND status = $2 RETURNING id",
        )
        .bind(id)
        .bind(from)
        .bind(to)
        .fetch_optional(&mut *tx)
        .await?;

        if updated.is_none() {
            return Err(match fetch_order_row(&mut tx, id).await? {
                Some(current) => RepositoryError::Conflict(format!(
                    "order {id} is {}, expected {from}",
                    current.status
                )),
                None => RepositoryError::NotFound,
            });
        }

        if to == OrderStatus::Cancelled {
            sqlx::query(
                "UPDATE shop.product p \
                 SET total_stock = LEAST(p.total_stock::BIGINT + l.quantity, 2147483647)::INTEGER, \
                 updated_at = now() \
                 FROM shop.order_line l WHERE l.order_id = $1 AND p.id = l.product_id",
            )
            .bind(id)
            .execute(&mut *tx)
            .await?;
        }

        let row = fetch_order_row(&mut tx, id)
            .await?
            .ok_or(RepositoryError::NotFound)?;
        tx.commit().await?;

        self.load_orders(vec![row])
            .await?
            .pop()
            .ok_or(RepositoryError::NotFound)
    }
}

#[async_trait]
impl HealthCheck for PgStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
