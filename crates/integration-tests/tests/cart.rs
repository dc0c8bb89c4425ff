//! Cart aggregate over HTTP: merge policy, exact updates and validation.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use reqwest::StatusCode;
use serde_json::{Value, json};

use shopfront_core::Role;
use shopfront_integration_tests::TestApp;

#[tokio::test]
async fn test_adding_twice_merges_into_one_line() {
    let app = TestApp::spawn().await;
    let product = app.seed_product("Runner", 2500, 100).await;
    let client = TestApp::client();
    app.register_and_login(&client, "jane@example.com", Role::Shopper)
        .await;

    assert_eq!(
        app.add_to_cart(&client, product.id, 2).await.status(),
        StatusCode::OK
    );
    let resp = app.add_to_cart(&client, product.id, 3).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = resp.json().await.unwrap();
    let items = body["data"]["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["quantity"], 5);
    assert_eq!(body["data"]["subtotal"], "125.00");
}

#[tokio::test]
async fn test_non_positive_quantity_is_rejected() {
    let app = TestApp::spawn().await;
    let product = app.seed_product("Runner", 2500, 100).await;
    let client = TestApp::client();
    app.register_and_login(&client, "jane@example.com", Role::Shopper)
        .await;

    for quantity in [0, -1] {
        let resp = app.add_to_cart(&client, product.id, quantity).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "add {quantity}");
    }

    app.add_to_cart(&client, product.id, 1).await;
    for quantity in [0, -4] {
        let resp = client
            .put(app.url("/api/shop/cart/update-cart"))
            .json(&json!({ "productId": product.id, "quantity": quantity }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "update {quantity}");
    }
}

#[tokio::test]
async fn test_update_is_last_write_wins() {
    let app = TestApp::spawn().await;
    let product = app.seed_product("Runner", 1000, 100).await;

    // Two devices logged in as the same user
    app.create_user("jane@example.com", Role::Shopper).await;
    let phone = TestApp::client();
    let laptop = TestApp::client();
    app.login(&phone, "jane@example.com").await;
    app.login(&laptop, "jane@example.com").await;

    app.add_to_cart(&phone, product.id, 1).await;
    for (client, quantity) in [(&phone, 4), (&laptop, 7)] {
        let resp = client
            .put(app.url("/api/shop/cart/update-cart"))
            .json(&json!({ "productId": product.id, "quantity": quantity }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    let body: Value = phone
        .get(app.url("/api/shop/cart/get"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["data"]["items"][0]["quantity"], 7);
}

#[tokio::test]
async fn test_missing_product_and_line() {
    let app = TestApp::spawn().await;
    let client = TestApp::client();
    app.register_and_login(&client, "jane@example.com", Role::Shopper)
        .await;

    let resp = app
        .add_to_cart(&client, shopfront_core::ProductId::new(999), 1)
        .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = client
        .delete(app.url("/api/shop/cart/999"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_remove_line_and_carts_are_private() {
    let app = TestApp::spawn().await;
    let product = app.seed_product("Runner", 1000, 100).await;

    let jane = TestApp::client();
    app.register_and_login(&jane, "jane@example.com", Role::Shopper)
        .await;
    let john = TestApp::client();
    app.register_and_login(&john, "john@example.com", Role::Shopper)
        .await;

    app.add_to_cart(&jane, product.id, 2).await;

    let body: Value = john
        .get(app.url("/api/shop/cart/get"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(body["data"]["items"].as_array().unwrap().is_empty());

    // John cannot remove Jane's line
    let resp = john
        .delete(app.url(&format!("/api/shop/cart/{}", product.id)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = jane
        .delete(app.url(&format!("/api/shop/cart/{}", product.id)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert!(body["data"]["items"].as_array().unwrap().is_empty());
}
