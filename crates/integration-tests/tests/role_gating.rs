//! Every admin route answers 403 to a shopper session and 401 without one.

#![allow(clippy::unwrap_used)]

use reqwest::{Method, StatusCode};
use serde_json::{Value, json};

use shopfront_core::Role;
use shopfront_integration_tests::TestApp;

const ADMIN_ROUTES: &[(Method, &str)] = &[
    (Method::POST, "/api/admin/products/upload-image"),
    (Method::POST, "/api/admin/products/add"),
    (Method::PUT, "/api/admin/products/edit/1"),
    (Method::DELETE, "/api/admin/products/delete/1"),
    (Method::GET, "/api/admin/products/get"),
    (Method::GET, "/api/admin/orders/get"),
    (Method::GET, "/api/admin/orders/details/1"),
    (Method::PUT, "/api/admin/orders/update/1"),
];

#[tokio::test]
async fn test_shopper_gets_403_on_every_admin_route() {
    let app = TestApp::spawn().await;
    app.seed_product("Runner", 5000, 3).await;
    let client = TestApp::client();
    app.register_and_login(&client, "shopper@example.com", Role::Shopper)
        .await;

    for (method, path) in ADMIN_ROUTES {
        let resp = client
            .request(method.clone(), app.url(path))
            .json(&json!({ "title": "Hacked", "status": "delivered" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN, "{method} {path}");

        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["success"], false);
    }

    // Nothing changed behind the 403s
    assert_eq!(app.stock(shopfront_core::ProductId::new(1)).await, 3);
}

#[tokio::test]
async fn test_anonymous_gets_401_on_admin_and_shopper_routes() {
    let app = TestApp::spawn().await;
    let client = TestApp::client();

    let shopper_routes = [
        (Method::GET, "/api/shop/cart/get"),
        (Method::POST, "/api/shop/order/create"),
        (Method::GET, "/api/shop/address/get"),
        (Method::POST, "/api/auth/logout"),
    ];

    for (method, path) in ADMIN_ROUTES.iter().cloned().chain(shopper_routes) {
        let resp = client
            .request(method.clone(), app.url(path))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "{method} {path}");
    }
}

#[tokio::test]
async fn test_admin_reaches_admin_routes() {
    let app = TestApp::spawn().await;
    let client = TestApp::client();
    app.register_and_login(&client, "admin@example.com", Role::Admin)
        .await;

    let resp = client
        .get(app.url("/api/admin/orders/get"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = client
        .post(app.url("/api/admin/products/add"))
        .json(&json!({
            "title": "Trail Runner",
            "category": "Men",
            "brand": "Nike",
            "price": 90,
            "salePrice": 75,
            "totalStock": 10
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = resp.json().await.unwrap();
    let id = body["data"]["id"].as_i64().unwrap();

    let resp = client
        .put(app.url(&format!("/api/admin/products/edit/{id}")))
        .json(&json!({ "salePrice": null, "totalStock": 4 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert!(body["data"]["salePrice"].is_null());
    assert_eq!(body["data"]["totalStock"], 4);

    let resp = client
        .delete(app.url(&format!("/api/admin/products/delete/{id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = client
        .delete(app.url(&format!("/api/admin/products/delete/{id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_promoted_role_needs_a_fresh_login() {
    let app = TestApp::spawn().await;
    let client = TestApp::client();
    let user = app
        .register_and_login(&client, "jane@example.com", Role::Shopper)
        .await;

    shopfront_api::db::UserRepository::set_role(&app.store, &user.email, Role::Admin)
        .await
        .unwrap();

    // The old token still asserts the shopper role
    let resp = client
        .get(app.url("/api/admin/products/get"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    app.login(&client, "jane@example.com").await;
    let resp = client
        .get(app.url("/api/admin/products/get"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}
