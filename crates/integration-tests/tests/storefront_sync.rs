//! Live tests for cart and favorites sync.
//!
//! These tests require:
//! - A migrated and seeded `PostgreSQL` database (toko-cli migrate, toko-cli seed)
//! - The storefront running (cargo run -p toko-storefront)
//!
//! Run with: cargo test -p toko-integration-tests -- --ignored

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use reqwest::StatusCode;
use serde_json::json;
use toko_integration_tests::{Browser, unique_email};

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_storefront_ready() {
    let resp = reqwest::get(format!("{}/health/ready", toko_integration_tests::storefront_url()))
        .await
        .expect("Failed to reach storefront");
    assert_eq!(resp.status(), StatusCode::OK);
}

// ============================================================================
// Cart
// ============================================================================

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_signed_in_cart_increments() {
    let browser = Browser::new();
    browser.sign_in(&unique_email()).await;

    browser
        .post("/api/cart/items", json!({ "productId": "P2", "quantity": 2 }))
        .await;
    let (status, cart) = browser
        .post("/api/cart/items", json!({ "productId": "P2", "quantity": 3 }))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart["cartItems"].as_array().unwrap().len(), 1);
    assert_eq!(cart["itemCount"], 5);
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_concurrent_adds_keep_one_line() {
    let browser = Browser::new();
    browser.sign_in(&unique_email()).await;

    let body = json!({ "productId": "P1", "quantity": 1 });
    let (a, b) = tokio::join!(
        browser.post("/api/cart/items", body.clone()),
        browser.post("/api/cart/items", body.clone()),
    );
    assert_eq!(a.0, StatusCode::OK);
    assert_eq!(b.0, StatusCode::OK);

    let (_, cart) = browser.get("/api/cart").await;
    assert_eq!(cart["cartItems"].as_array().unwrap().len(), 1);
    assert_eq!(cart["cartItems"][0]["quantity"], 2);
}

// ============================================================================
// Favorites
// ============================================================================

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_duplicate_favorite_conflicts() {
    let browser = Browser::new();
    browser.sign_in(&unique_email()).await;

    let (status, _) = browser.post("/api/favorites", json!({ "productId": "P1" })).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = browser.post("/api/favorites", json!({ "productId": "P1" })).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, favorites) = browser.get("/api/favorites").await;
    assert_eq!(favorites["favoriteCount"], 1);
}

// ============================================================================
// Migration
// ============================================================================

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_guest_data_follows_sign_in() {
    let email = unique_email();
    let guest = Browser::new();
    guest.post("/api/favorites", json!({ "productId": "P1" })).await;
    guest.post("/api/favorites", json!({ "productId": "P3" })).await;
    guest
        .post("/api/cart/items", json!({ "productId": "P2", "quantity": 2 }))
        .await;

    let status = guest.sign_in(&email).await;
    assert_eq!(status["migration"]["state"], "done");
    assert_eq!(status["migration"]["favorites"], 2);

    // A second browser on the same account sees the remote rows.
    let other = Browser::new();
    other.sign_in(&email).await;
    let (_, favorites) = other.get("/api/favorites").await;
    assert_eq!(favorites["favoriteCount"], 2);
    let (_, cart) = other.get("/api/cart").await;
    assert_eq!(cart["itemCount"], 2);
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_sign_out_clears_session() {
    let browser = Browser::new();
    browser.sign_in(&unique_email()).await;
    browser.post("/api/favorites", json!({ "productId": "P2" })).await;

    let (status, body) = browser.post("/auth/sign-out", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["identity"]["kind"], "guest");

    let (_, favorites) = browser.get("/api/favorites").await;
    assert_eq!(favorites["favoriteCount"], 0);

    let (status, _) = browser.delete("/api/favorites/not-a-key").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
