//! End-to-end test harness for the Shopfront API.
//!
//! [`TestApp::spawn`] serves the real router on an ephemeral port, backed by
//! the in-memory store and a stub image host, so every test gets a fresh
//! database and talks to it over HTTP with a cookie-aware `reqwest` client.
//!
//! ```rust,ignore
//! let app = TestApp::spawn().await;
//! let client = TestApp::client();
//! app.register_and_login(&client, "jane@example.com", Role::Shopper).await;
//! let resp = client.get(app.url("/api/shop/cart/get")).send().await.unwrap();
//! ```

#![allow(clippy::missing_panics_doc)]

use std::net::SocketAddr;

use reqwest::{Client, StatusCode};
use serde_json::{Value, json};

use shopfront_api::db::memory::MemoryStore;
use shopfront_api::db::{AddressRepository, ProductRepository};
use shopfront_api::models::{Address, AddressInput, NewProduct, Product, User};
use shopfront_api::routes;
use shopfront_api::services::media::StubImageHost;
use shopfront_api::state::{AppState, test_support::test_state};
use shopfront_core::{Price, ProductId, Role, UserId};

/// Password used for every account the harness creates.
pub const PASSWORD: &str = "correct-horse-battery";

/// A running API server over a fresh in-memory store.
pub struct TestApp {
    pub base_url: String,
    pub store: MemoryStore,
    pub images: StubImageHost,
    pub state: AppState,
}

impl TestApp {
    /// Start a server on `127.0.0.1:0`.
    pub async fn spawn() -> Self {
        let store = MemoryStore::new();
        let images = StubImageHost::new();
        let state = test_state(store.clone(), images.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind ephemeral port");
        let addr = listener.local_addr().expect("local address");
        let app = routes::app(state.clone());

        tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .expect("test server");
        });

        Self {
            base_url: format!("http://{addr}"),
            store,
            images,
            state,
        }
    }

    /// A client that keeps the session cookie between requests.
    #[must_use]
    pub fn client() -> Client {
        Client::builder()
            .cookie_store(true)
            .build()
            .expect("build HTTP client")
    }

    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Create an account directly in the store with the given role.
    pub async fn create_user(&self, email: &str, role: Role) -> User {
        self.state
            .auth()
            .register_with_role(email, "Test User", PASSWORD, role)
            .await
            .expect("create user")
    }

    /// Log `client` in; the session cookie is kept by the client.
    pub async fn login(&self, client: &Client, email: &str) -> Value {
        let resp = client
            .post(self.url("/api/auth/login"))
            .json(&json!({ "email": email, "password": PASSWORD }))
            .send()
            .await
            .expect("login request");
        assert_eq!(resp.status(), StatusCode::OK, "login failed for {email}");
        resp.json().await.expect("login body")
    }

    /// Create a user and log `client` in as them.
    pub async fn register_and_login(&self, client: &Client, email: &str, role: Role) -> User {
        let user = self.create_user(email, role).await;
        self.login(client, email).await;
        user
    }

    /// Insert a product priced at `cents` with `stock` units.
    pub async fn seed_product(&self, title: &str, cents: u32, stock: u32) -> Product {
        ProductRepository::create(
            &self.store,
            NewProduct {
                title: title.to_string(),
                description: format!("{title} description"),
                category: "men".to_string(),
                brand: "nike".to_string(),
                price: Price::from_cents(cents),
                sale_price: None,
                total_stock: stock,
                image_url: None,
            },
        )
        .await
        .expect("seed product")
    }

    /// Current stock of a product.
    pub async fn stock(&self, id: ProductId) -> u32 {
        ProductRepository::get(&self.store, id)
            .await
            .expect("get product")
            .expect("product exists")
            .total_stock
    }

    /// Save a shipping address for `user`.
    pub async fn seed_address(&self, user: UserId) -> Address {
        AddressRepository::create(
            &self.store,
            user,
            AddressInput {
                address: "1 Main St".to_string(),
                city: "Springfield".to_string(),
                pincode: "12345".to_string(),
                phone: "555-0100".to_string(),
                notes: None,
            },
        )
        .await
        .expect("seed address")
    }

    /// Add a product to the cart of the user `client` is logged in as.
    pub async fn add_to_cart(&self, client: &Client, product: ProductId, quantity: i64) -> reqwest::Response {
        client
            .post(self.url("/api/shop/cart/add"))
            .json(&json!({ "productId": product, "quantity": quantity }))
            .send()
            .await
            .expect("add to cart")
    }

    /// Place an order shipped to `address`.
    pub async fn checkout(&self, client: &Client, address: &Address) -> reqwest::Response {
        client
            .post(self.url("/api/shop/order/create"))
            .json(&json!({ "addressId": address.id }))
            .send()
            .await
            .expect("create order")
    }
}
