//! Router tests over in-memory stores.
//!
//! Each test drives the full axum app with `tower::ServiceExt::oneshot`,
//! carrying the session cookie between requests like a browser would.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use rust_decimal::Decimal;
use serde_json::{Value, json};
use tower::ServiceExt;

use toko_core::ProductId;
use toko_storefront::config::StorefrontConfig;
use toko_storefront::db::{CatalogStore, MemoryStore, NewProduct};
use toko_storefront::middleware::create_session_layer;
use toko_storefront::state::AppState;

struct TestApp {
    router: Router,
    store: Arc<MemoryStore>,
    cookie: Option<String>,
}

impl TestApp {
    async fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        for (id, price) in [("P1", 50_000), ("P2", 12_500), ("P3", 9_900)] {
            store
                .upsert_product(&NewProduct {
                    id: ProductId::new(id),
                    name: format!("Product {id}"),
                    price: Decimal::from(price),
                    image_url: None,
                })
                .await
                .unwrap();
        }

        let config = StorefrontConfig::from_lookup(|key| {
            (key == "STOREFRONT_BACKEND").then(|| "memory".to_string())
        })
        .unwrap();
        let session_layer = create_session_layer(tower_sessions::MemoryStore::default(), &config);
        let state = AppState::new(config, store.clone());

        Self {
            router: toko_storefront::app(state, session_layer),
            store,
            cookie: None,
        }
    }

    /// A second browser sharing the same backend.
    fn new_browser(&self) -> Self {
        Self {
            router: self.router.clone(),
            store: Arc::clone(&self.store),
            cookie: None,
        }
    }

    async fn send(&mut self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(cookie) = &self.cookie {
            request = request.header(header::COOKIE, cookie);
        }
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();

        if let Some(set_cookie) = response.headers().get(header::SET_COOKIE) {
            let pair = set_cookie.to_str().unwrap().split(';').next().unwrap();
            self.cookie = Some(pair.to_string());
        }

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
        (status, value)
    }

    async fn get(&mut self, uri: &str) -> (StatusCode, Value) {
        self.send(Method::GET, uri, None).await
    }

    async fn post(&mut self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, Some(body)).await
    }

    async fn sign_in(&mut self, email: &str) -> Value {
        let (status, body) = self.post("/auth/sign-in", json!({ "email": email })).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body
    }
}

#[tokio::test]
async fn test_health_endpoints() {
    let mut app = TestApp::new().await;

    let (status, body) = app.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "ok");

    let (status, _) = app.get("/health/ready").await;
    assert_eq!(status, StatusCode::OK);

    app.store.set_offline(true);
    let (status, _) = app.get("/health/ready").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_guest_cart_accumulates_quantity() {
    let mut app = TestApp::new().await;

    app.post("/api/cart/items", json!({ "productId": "P2", "quantity": 2 }))
        .await;
    let (status, body) = app
        .post("/api/cart/items", json!({ "productId": "P2", "quantity": 3 }))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cartItems"].as_array().unwrap().len(), 1);
    assert_eq!(body["cartItems"][0]["quantity"], 5);
    assert_eq!(body["itemCount"], 5);
    assert_eq!(body["totalPrice"], "62500");
    assert_eq!(body["notice"], "Added to cart");
}

#[tokio::test]
async fn test_cart_update_to_zero_removes_line() {
    let mut app = TestApp::new().await;
    app.sign_in("ana@toko.id").await;
    app.post("/api/cart/items", json!({ "productId": "P1" })).await;

    let (status, body) = app
        .send(
            Method::PATCH,
            "/api/cart/items/P1",
            Some(json!({ "quantity": 0 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["itemCount"], 0);
    assert_eq!(body["notice"], "Removed from cart");

    let (status, _) = app.send(Method::DELETE, "/api/cart/items/P1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_requests_are_rejected() {
    let mut app = TestApp::new().await;

    let (status, body) = app
        .post("/api/cart/items", json!({ "productId": "P1", "quantity": 0 }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("quantity"));

    let (status, _) = app
        .post("/api/cart/items", json!({ "productId": "NOPE" }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.post("/auth/sign-in", json!({ "email": "not-an-email" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_guest_favorite_twice_conflicts() {
    let mut app = TestApp::new().await;

    let (status, _) = app.post("/api/favorites", json!({ "productId": "P1" })).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = app.post("/api/favorites", json!({ "productId": "P1" })).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("already"));

    let (_, body) = app.get("/api/favorites").await;
    assert_eq!(body["favoriteCount"], 1);
    assert_eq!(body["favorites"][0]["id"], "local_P1_0");
}

#[tokio::test]
async fn test_remove_local_key_keeps_other_favorites() {
    let mut app = TestApp::new().await;
    for id in ["P1", "P3"] {
        app.post("/api/favorites", json!({ "productId": id })).await;
    }

    let (status, body) = app.send(Method::DELETE, "/api/favorites/local_P3_1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["favoriteCount"], 1);
    assert_eq!(body["favorites"][0]["productId"], "P1");
}

#[tokio::test]
async fn test_sign_in_migrates_guest_data() {
    let mut app = TestApp::new().await;
    app.post("/api/favorites", json!({ "productId": "P1" })).await;
    app.post("/api/cart/items", json!({ "productId": "P2", "quantity": 2 }))
        .await;

    let body = app.sign_in("budi@toko.id").await;
    assert_eq!(body["identity"]["kind"], "user");
    assert_eq!(body["migration"]["state"], "done");
    assert_eq!(body["migration"]["favorites"], 1);
    assert_eq!(body["migration"]["cartItems"], 1);

    let (_, favorites) = app.get("/api/favorites").await;
    assert_eq!(favorites["favoriteCount"], 1);
    assert_eq!(favorites["favorites"][0]["productId"], "P1");
    assert!(
        !favorites["favorites"][0]["id"]
            .as_str()
            .unwrap()
            .starts_with("local_")
    );

    let (_, cart) = app.get("/api/cart").await;
    assert_eq!(cart["itemCount"], 2);

    // Same account from another browser sees the migrated rows.
    let mut other = app.new_browser();
    other.sign_in("budi@toko.id").await;
    let (_, favorites) = other.get("/api/favorites").await;
    assert_eq!(favorites["favoriteCount"], 1);
}

#[tokio::test]
async fn test_toggle_and_status() {
    let mut app = TestApp::new().await;
    app.sign_in("citra@toko.id").await;

    let (_, body) = app
        .post("/api/favorites/toggle", json!({ "productId": "P3" }))
        .await;
    assert_eq!(body["isFavorite"], true);
    assert_eq!(body["notice"], "Added to favorites");

    let (_, body) = app.get("/api/favorites/P3/status").await;
    assert_eq!(body["isFavorite"], true);

    let (_, body) = app
        .post("/api/favorites/toggle", json!({ "productId": "P3" }))
        .await;
    assert_eq!(body["isFavorite"], false);
}

#[tokio::test]
async fn test_sync_requires_sign_in() {
    let mut app = TestApp::new().await;
    let (status, _) = app.post("/api/favorites/sync", json!({})).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_sign_out_returns_to_guest() {
    let mut app = TestApp::new().await;
    app.sign_in("dewi@toko.id").await;
    app.post("/api/cart/items", json!({ "productId": "P1" })).await;

    let (status, body) = app.post("/auth/sign-out", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["identity"]["kind"], "guest");
    assert_eq!(body["migration"]["state"], "idle");

    let (_, status) = app.get("/auth/status").await;
    assert_eq!(status["identity"]["kind"], "guest");

    let (_, cart) = app.get("/api/cart").await;
    assert_eq!(cart["itemCount"], 0);
}

#[tokio::test]
async fn test_recently_viewed_is_newest_first() {
    let mut app = TestApp::new().await;
    for id in ["P1", "P2", "P1"] {
        app.post("/api/recently-viewed", json!({ "productId": id }))
            .await;
    }

    let (_, body) = app.get("/api/recently-viewed").await;
    let ids: Vec<&str> = body["recentlyViewed"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, ["P1", "P2"]);
}

#[tokio::test]
async fn test_response_carries_request_id() {
    let app = TestApp::new().await;
    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("x-request-id", "edge-42")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.headers()["x-request-id"], "edge-42");
}
