//! Checkout over HTTP: all-or-nothing stock decrement, price snapshots,
//! the order lifecycle and saved addresses.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use reqwest::{Client, StatusCode};
use serde_json::{Value, json};

use shopfront_api::models::Address;
use shopfront_core::{AddressId, Role};
use shopfront_integration_tests::TestApp;

async fn shopper(app: &TestApp, email: &str) -> (Client, Address) {
    let client = TestApp::client();
    let user = app.register_and_login(&client, email, Role::Shopper).await;
    let address = app.seed_address(user.id).await;
    (client, address)
}

async fn set_status(app: &TestApp, admin: &Client, order_id: &Value, status: &str) -> StatusCode {
    admin
        .put(app.url(&format!("/api/admin/orders/update/{order_id}")))
        .json(&json!({ "status": status }))
        .send()
        .await
        .unwrap()
        .status()
}

#[tokio::test]
async fn test_checkout_decrements_stock_and_clears_cart() {
    let app = TestApp::spawn().await;
    let shoe = app.seed_product("Runner", 2000, 5).await;
    let sock = app.seed_product("Sock", 500, 10).await;
    let (client, address) = shopper(&app, "jane@example.com").await;

    app.add_to_cart(&client, shoe.id, 2).await;
    app.add_to_cart(&client, sock.id, 3).await;

    let resp = app.checkout(&client, &address).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["status"], "pending");
    assert_eq!(body["data"]["total"], "55.00");
    assert_eq!(body["data"]["lines"].as_array().unwrap().len(), 2);
    assert_eq!(body["data"]["shipping"]["city"], "Springfield");

    assert_eq!(app.stock(shoe.id).await, 3);
    assert_eq!(app.stock(sock.id).await, 7);

    let cart: Value = client
        .get(app.url("/api/shop/cart/get"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(cart["data"]["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_insufficient_stock_changes_nothing() {
    let app = TestApp::spawn().await;
    let shoe = app.seed_product("Runner", 2000, 5).await;
    let hat = app.seed_product("Cap", 1500, 1).await;
    let (client, address) = shopper(&app, "jane@example.com").await;

    app.add_to_cart(&client, shoe.id, 2).await;
    app.add_to_cart(&client, hat.id, 3).await;

    let resp = app.checkout(&client, &address).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);

    let shortfalls = body["shortfalls"].as_array().unwrap();
    assert_eq!(shortfalls.len(), 1);
    assert_eq!(shortfalls[0]["productId"], hat.id.as_i32());
    assert_eq!(shortfalls[0]["requested"], 3);
    assert_eq!(shortfalls[0]["available"], 1);

    // Neither line was decremented and no order exists
    assert_eq!(app.stock(shoe.id).await, 5);
    assert_eq!(app.stock(hat.id).await, 1);
    let orders: Value = client
        .get(app.url("/api/shop/order/list"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(orders["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_concurrent_checkouts_for_last_unit() {
    let app = TestApp::spawn().await;
    let shoe = app.seed_product("Last pair", 9900, 1).await;
    let (jane, jane_address) = shopper(&app, "jane@example.com").await;
    let (john, john_address) = shopper(&app, "john@example.com").await;

    app.add_to_cart(&jane, shoe.id, 1).await;
    app.add_to_cart(&john, shoe.id, 1).await;

    let (a, b) = tokio::join!(
        app.checkout(&jane, &jane_address),
        app.checkout(&john, &john_address)
    );
    let mut statuses = [a.status(), b.status()];
    statuses.sort();

    assert_eq!(statuses, [StatusCode::CREATED, StatusCode::CONFLICT]);
    assert_eq!(app.stock(shoe.id).await, 0);
}

#[tokio::test]
async fn test_order_keeps_checkout_price() {
    let app = TestApp::spawn().await;
    let shoe = app.seed_product("Runner", 4000, 5).await;
    let (client, address) = shopper(&app, "jane@example.com").await;
    let admin = TestApp::client();
    app.register_and_login(&admin, "admin@example.com", Role::Admin)
        .await;

    app.add_to_cart(&client, shoe.id, 1).await;
    let order: Value = app.checkout(&client, &address).await.json().await.unwrap();
    let order_id = &order["data"]["id"];

    let resp = admin
        .put(app.url(&format!("/api/admin/products/edit/{}", shoe.id)))
        .json(&json!({ "price": 99, "title": "Runner v2" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let details: Value = client
        .get(app.url(&format!("/api/shop/order/details/{order_id}")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(details["data"]["lines"][0]["unitPrice"], "40.00");
    assert_eq!(details["data"]["lines"][0]["title"], "Runner");
    assert_eq!(details["data"]["total"], "40.00");
}

#[tokio::test]
async fn test_sale_price_is_charged() {
    let app = TestApp::spawn().await;
    let shoe = app.seed_product("Runner", 4000, 5).await;
    let (client, address) = shopper(&app, "jane@example.com").await;
    let admin = TestApp::client();
    app.register_and_login(&admin, "admin@example.com", Role::Admin)
        .await;

    admin
        .put(app.url(&format!("/api/admin/products/edit/{}", shoe.id)))
        .json(&json!({ "salePrice": "30.00" }))
        .send()
        .await
        .unwrap();

    app.add_to_cart(&client, shoe.id, 2).await;
    let order: Value = app.checkout(&client, &address).await.json().await.unwrap();
    assert_eq!(order["data"]["total"], "60.00");
}

#[tokio::test]
async fn test_shopper_cancel_restores_stock() {
    let app = TestApp::spawn().await;
    let shoe = app.seed_product("Runner", 2000, 5).await;
    let (client, address) = shopper(&app, "jane@example.com").await;

    app.add_to_cart(&client, shoe.id, 2).await;
    let order: Value = app.checkout(&client, &address).await.json().await.unwrap();
    assert_eq!(app.stock(shoe.id).await, 3);

    let resp = client
        .post(app.url(&format!("/api/shop/order/cancel/{}", order["data"]["id"])))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["status"], "cancelled");
    assert_eq!(app.stock(shoe.id).await, 5);

    // A cancelled order stays cancelled
    let resp = client
        .post(app.url(&format!("/api/shop/order/cancel/{}", order["data"]["id"])))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    assert_eq!(app.stock(shoe.id).await, 5);
}

#[tokio::test]
async fn test_admin_drives_order_lifecycle() {
    let app = TestApp::spawn().await;
    let shoe = app.seed_product("Runner", 2000, 5).await;
    let (client, address) = shopper(&app, "jane@example.com").await;
    let admin = TestApp::client();
    app.register_and_login(&admin, "admin@example.com", Role::Admin)
        .await;

    app.add_to_cart(&client, shoe.id, 1).await;
    let order: Value = app.checkout(&client, &address).await.json().await.unwrap();
    let order_id = &order["data"]["id"];

    assert_eq!(set_status(&app, &admin, order_id, "delivered").await, StatusCode::CONFLICT);
    assert_eq!(set_status(&app, &admin, order_id, "confirmed").await, StatusCode::OK);
    assert_eq!(set_status(&app, &admin, order_id, "shipped").await, StatusCode::OK);
    assert_eq!(set_status(&app, &admin, order_id, "bogus").await, StatusCode::BAD_REQUEST);

    // Too late to cancel once shipped
    let resp = client
        .post(app.url(&format!("/api/shop/order/cancel/{order_id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    assert_eq!(set_status(&app, &admin, order_id, "cancelled").await, StatusCode::CONFLICT);
    assert_eq!(app.stock(shoe.id).await, 4);

    let all: Value = admin
        .get(app.url("/api/admin/orders/get"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(all["data"].as_array().unwrap().len(), 1);
    assert_eq!(all["data"][0]["status"], "shipped");
}

#[tokio::test]
async fn test_empty_cart_and_foreign_address() {
    let app = TestApp::spawn().await;
    let shoe = app.seed_product("Runner", 2000, 5).await;
    let (jane, jane_address) = shopper(&app, "jane@example.com").await;
    let (john, _) = shopper(&app, "john@example.com").await;

    let resp = app.checkout(&jane, &jane_address).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    // John cannot ship to Jane's address
    app.add_to_cart(&john, shoe.id, 1).await;
    let resp = app.checkout(&john, &jane_address).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(app.stock(shoe.id).await, 5);
}

#[tokio::test]
async fn test_orders_are_private() {
    let app = TestApp::spawn().await;
    let shoe = app.seed_product("Runner", 2000, 5).await;
    let (jane, address) = shopper(&app, "jane@example.com").await;
    let (john, _) = shopper(&app, "john@example.com").await;

    app.add_to_cart(&jane, shoe.id, 1).await;
    let order: Value = app.checkout(&jane, &address).await.json().await.unwrap();
    let order_id = &order["data"]["id"];

    let resp = john
        .get(app.url(&format!("/api/shop/order/details/{order_id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = john
        .post(app.url(&format!("/api/shop/order/cancel/{order_id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(app.stock(shoe.id).await, 4);
}

#[tokio::test]
async fn test_address_crud() {
    let app = TestApp::spawn().await;
    let jane = TestApp::client();
    app.register_and_login(&jane, "jane@example.com", Role::Shopper)
        .await;
    let john = TestApp::client();
    app.register_and_login(&john, "john@example.com", Role::Shopper)
        .await;

    let resp = jane
        .post(app.url("/api/shop/address/add"))
        .json(&json!({ "address": "  2 Elm St ", "city": "Shelbyville", "pincode": "54321", "phone": "555-0199" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created: Value = resp.json().await.unwrap();
    assert_eq!(created["data"]["address"], "2 Elm St");
    let id = AddressId::new(i32::try_from(created["data"]["id"].as_i64().unwrap()).unwrap());

    let resp = jane
        .post(app.url("/api/shop/address/add"))
        .json(&json!({ "address": "", "city": "Shelbyville", "pincode": "54321", "phone": "555-0199" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let update = json!({ "address": "3 Oak St", "city": "Shelbyville", "pincode": "54321", "phone": "555-0199", "notes": "Ring twice" });
    let resp = john
        .put(app.url(&format!("/api/shop/address/update/{id}")))
        .json(&update)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = jane
        .put(app.url(&format!("/api/shop/address/update/{id}")))
        .json(&update)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let listed: Value = jane
        .get(app.url("/api/shop/address/get"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed["data"][0]["notes"], "Ring twice");

    let resp = john
        .delete(app.url(&format!("/api/shop/address/delete/{id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = jane
        .delete(app.url(&format!("/api/shop/address/delete/{id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}
