//! In-memory implementation of the repository traits.
//!
//! Every operation takes a single lock over the whole state, so multi-step
//! operations such as [`OrderRepository::place`] are atomic with respect to
//! each other just like their `PostgreSQL` transactions.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use shopfront_core::{AddressId, Email, OrderId, OrderStatus, ProductId, Quantity, Role, UserId};

use super::{
    AddressRepository, CartRepository, HealthCheck, OrderRepository, ProductRepository,
    RepositoryError, UserRepository,
};
use crate::models::product::MAX_STOCK;
use crate::models::{
    Address, AddressInput, CartLine, NewProduct, NewUser, Order, OrderDraft, OrderLine, Product,
    ProductFilter, ProductUpdate, User, order_total,
};

/// Repository backed by process memory. Cloning shares the same state.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

#[derive(Default)]
struct State {
    next_id: i32,
    users: BTreeMap<UserId, (User, String)>,
    products: BTreeMap<ProductId, Product>,
    carts: BTreeMap<(UserId, ProductId), CartLine>,
    addresses: BTreeMap<AddressId, Address>,
    orders: BTreeMap<OrderId, Order>,
}

impl State {
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn create(&self, user: NewUser) -> Result<User, RepositoryError> {
        let mut state = self.state.lock().await;
        if state.users.values().any(|(u, _)| u.email == user.email) {
            return Err(RepositoryError::Conflict("email already exists".to_owned()));
        }
        let now = Utc::now();
        let created = User {
            id: UserId::new(state.next_id()),
            email: user.email,
            user_name: user.user_name,
            role: user.role,
            created_at: now,
            updated_at: now,
        };
        state
            .users
            .insert(created.id, (created.clone(), user.password_hash));
        Ok(created)
    }

    async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state.users.get(&id).map(|(u, _)| u.clone()))
    }

    async fn get_with_password_hash(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state.users.values().find(|(u, _)| &u.email == email).cloned())
    }

    async fn update_password_hash(&self, id: UserId, hash: &str) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().await;
        let (user, stored) = state.users.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        hash.clone_into(stored);
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn set_role(&self, email: &Email, role: Role) -> Result<User, RepositoryError> {
        let mut state = self.state.lock().await;
        let (user, _) = state
            .users
            .values_mut()
            .find(|(u, _)| &u.email == email)
            .ok_or(RepositoryError::NotFound)?;
        user.role = role;
        user.updated_at = Utc::now();
        Ok(user.clone())
    }
}

#[async_trait]
impl ProductRepository for MemoryStore {
    async fn create(&self, product: NewProduct) -> Result<Product, RepositoryError> {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        let created = Product {
            id: ProductId::new(state.next_id()),
            title: product.title,
            description: product.description,
            category: product.category,
            brand: product.brand,
            price: product.price,
            sale_price: product.sale_price,
            total_stock: product.total_stock,
            image_url: product.image_url,
            created_at: now,
            updated_at: now,
        };
        state.products.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update(
        &self,
        id: ProductId,
        update: ProductUpdate,
    ) -> Result<Product, RepositoryError> {
        let mut state = self.state.lock().await;
        let product = state
            .products
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound)?;
        update.apply_to(product);
        product.updated_at = Utc::now();
        Ok(product.clone())
    }

    async fn delete(&self, id: ProductId) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().await;
        if state.products.remove(&id).is_none() {
            return Err(RepositoryError::NotFound);
        }
        state.carts.retain(|(_, product), _| *product != id);
        Ok(())
    }

    async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state.products.get(&id).cloned())
    }

    async fn get_many(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .products
            .values()
            .filter(|p| ids.contains(&p.id))
            .cloned()
            .collect())
    }

    async fn list(&self, filter: &ProductFilter) -> Result<Vec<Product>, RepositoryError> {
        let state = self.state.lock().await;
        let mut products: Vec<Product> = state
            .products
            .values()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect();
        filter.sort(&mut products);
        Ok(products)
    }

    async fn search(&self, keyword: &str) -> Result<Vec<Product>, RepositoryError> {
        let keyword = keyword.to_lowercase();
        let state = self.state.lock().await;
        let mut products: Vec<Product> = state
            .products
            .values()
            .filter(|p| {
                [&p.title, &p.description, &p.category, &p.brand]
                    .iter()
                    .any(|field| field.to_lowercase().contains(&keyword))
            })
            .cloned()
            .collect();
        ProductFilter::default().sort(&mut products);
        Ok(products)
    }
}

#[async_trait]
impl CartRepository for MemoryStore {
    async fn lines(&self, user: UserId) -> Result<Vec<CartLine>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .carts
            .range((user, ProductId::new(i32::MIN))..=(user, ProductId::new(i32::MAX)))
            .map(|(_, line)| *line)
            .collect())
    }

    async fn add(
        &self,
        user: UserId,
        product: ProductId,
        quantity: Quantity,
    ) -> Result<CartLine, RepositoryError> {
        let mut state = self.state.lock().await;
        if !state.products.contains_key(&product) {
            return Err(RepositoryError::NotFound);
        }
        let now = Utc::now();
        let merged = match state.carts.get(&(user, product)) {
            Some(line) => line.quantity.checked_add(quantity).ok_or_else(|| {
                RepositoryError::OutOfRange(format!("cart quantity above {}", Quantity::MAX))
            })?,
            None => quantity,
        };
        let line = CartLine {
            product_id: product,
            quantity: merged,
            updated_at: now,
        };
        state.carts.insert((user, product), line);
        Ok(line)
    }

    async fn set_quantity(
        &self,
        user: UserId,
        product: ProductId,
        quantity: Quantity,
    ) -> Result<Option<CartLine>, RepositoryError> {
        let mut state = self.state.lock().await;
        Ok(state.carts.get_mut(&(user, product)).map(|line| {
            line.quantity = quantity;
            line.updated_at = Utc::now();
            *line
        }))
    }

    async fn remove(&self, user: UserId, product: ProductId) -> Result<bool, RepositoryError> {
        let mut state = self.state.lock().await;
        Ok(state.carts.remove(&(user, product)).is_some())
    }
}

#[async_trait]
impl AddressRepository for MemoryStore {
    async fn create(&self, user: UserId, input: AddressInput) -> Result<Address, RepositoryError> {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        let address = Address {
            id: AddressId::new(state.next_id()),
            user_id: user,
            address: input.address,
            city: input.city,
            pincode: input.pincode,
            phone: input.phone,
            notes: input.notes,
            created_at: now,
            updated_at: now,
        };
        state.addresses.insert(address.id, address.clone());
        Ok(address)
    }

    async fn list(&self, user: UserId) -> Result<Vec<Address>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .addresses
            .values()
            .filter(|a| a.user_id == user)
            .cloned()
            .collect())
    }

    async fn get(&self, user: UserId, id: AddressId) -> Result<Option<Address>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .addresses
            .get(&id)
            .filter(|a| a.user_id == user)
            .cloned())
    }

    async fn update(
        &self,
        user: UserId,
        id: AddressId,
        input: AddressInput,
    ) -> Result<Option<Address>, RepositoryError> {
        let mut state = self.state.lock().await;
        Ok(state
            .addresses
            .get_mut(&id)
            .filter(|a| a.user_id == user)
            .map(|a| {
                a.address = input.address;
                a.city = input.city;
                a.pincode = input.pincode;
                a.phone = input.phone;
                a.notes = input.notes;
                a.updated_at = Utc::now();
                a.clone()
            }))
    }

    async fn delete(&self, user: UserId, id: AddressId) -> Result<bool, RepositoryError> {
        let mut state = self.state.lock().await;
        if state.addresses.get(&id).is_some_and(|a| a.user_id == user) {
            state.addresses.remove(&id);
            return Ok(true);
        }
        Ok(false)
    }
}

#[async_trait]
impl OrderRepository for MemoryStore {
    async fn place(&self, draft: OrderDraft) -> Result<Order, RepositoryError> {
        let mut state = self.state.lock().await;

        // Check every line and the total before touching anything so a
        // failure leaves no trace.
        let mut lines = Vec::with_capacity(draft.lines.len());
        for (product_id, quantity) in &draft.lines {
            let product = state
                .products
                .get(product_id)
                .ok_or(RepositoryError::NotFound)?;
            if !product.has_stock_for(*quantity) {
                return Err(RepositoryError::OutOfStock(*product_id));
            }
            lines.push(OrderLine {
                product_id: *product_id,
                title: product.title.clone(),
                image_url: product.image_url.clone(),
                unit_price: product.effective_price(),
                quantity: *quantity,
            });
        }
        let total = order_total(&lines).map_err(|e| RepositoryError::OutOfRange(e.to_string()))?;

        let now = Utc::now();
        for (product_id, quantity) in &draft.lines {
            if let Some(product) = state.products.get_mut(product_id) {
                product.total_stock -= quantity.get();
                product.updated_at = now;
            }
            state.carts.remove(&(draft.user_id, *product_id));
        }

        let order = Order {
            id: OrderId::new(state.next_id()),
            user_id: draft.user_id,
            lines,
            shipping: draft.shipping,
            status: OrderStatus::Pending,
            total,
            created_at: now,
            updated_at: now,
        };
        state.orders.insert(order.id, order.clone());
        Ok(order)
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state.orders.get(&id).cloned())
    }

    async fn list_for_user(&self, user: UserId) -> Result<Vec<Order>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .orders
            .values()
            .rev()
            .filter(|o| o.user_id == user)
            .cloned()
            .collect())
    }

    async fn list_all(&self) -> Result<Vec<Order>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state.orders.values().rev().cloned().collect())
    }

    async fn transition(
        &self,
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<Order, RepositoryError> {
        let mut state = self.state.lock().await;
        let order = state.orders.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        if order.status != from {
            return Err(RepositoryError::Conflict(format!(
                "order {id} is {}, expected {from}",
                order.status
            )));
        }
        order.status = to;
        order.updated_at = Utc::now();
        let order = order.clone();

        if to == OrderStatus::Cancelled {
            for line in &order.lines {
                // Deleted products have nothing to restock.
                if let Some(product) = state.products.get_mut(&line.product_id) {
                    product.total_stock = product
                        .total_stock
                        .saturating_add(line.quantity.get())
                        .min(MAX_STOCK);
                }
            }
        }
        Ok(order)
    }
}

#[async_trait]
impl HealthCheck for MemoryStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}
