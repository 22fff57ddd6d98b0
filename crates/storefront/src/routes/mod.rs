//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                           - Liveness
//! GET    /health/ready                     - Readiness (remote store ping)
//!
//! # Auth
//! POST   /auth/sign-in                     - Sign in and migrate guest data
//! POST   /auth/sign-out                    - Sign out and clean up the session
//! GET    /auth/status                      - Identity and migration status
//!
//! # Cart
//! GET    /api/cart                         - Cart snapshot
//! DELETE /api/cart                         - Clear cart
//! POST   /api/cart/items                   - Add to cart
//! PATCH  /api/cart/items/{productId}       - Set quantity (< 1 removes)
//! DELETE /api/cart/items/{productId}       - Remove line
//!
//! # Favorites
//! GET    /api/favorites                    - Favorites and count
//! POST   /api/favorites                    - Add favorite
//! DELETE /api/favorites                    - Clear favorites
//! POST   /api/favorites/toggle             - Toggle favorite
//! POST   /api/favorites/sync               - Retry guest migration (signed in)
//! GET    /api/favorites/{productId}/status - Is favorite
//! DELETE /api/favorites/{favoriteId}       - Remove by served key
//!
//! # Recently viewed
//! GET    /api/recently-viewed              - List
//! POST   /api/recently-viewed              - Record a view
//! ```
//!
//! Mutations answer with the updated state plus a `notice` for the shopper.

pub mod auth;
pub mod cart;
pub mod favorites;
pub mod health;
pub mod recently_viewed;

use axum::{
    Router,
    routing::{get, patch, post},
};

use crate::state::AppState;

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/sign-in", post(auth::sign_in))
        .route("/sign-out", post(auth::sign_out))
        .route("/status", get(auth::status))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show).delete(cart::clear))
        .route("/items", post(cart::add))
        .route(
            "/items/{product_id}",
            patch(cart::update).delete(cart::remove),
        )
}

/// Create the favorites routes router.
pub fn favorite_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(favorites::index)
                .post(favorites::add)
                .delete(favorites::clear),
        )
        .route("/toggle", post(favorites::toggle))
        .route("/sync", post(favorites::sync))
        // Sibling path parameters must share a name.
        .route("/{id}/status", get(favorites::status))
        .route("/{id}", axum::routing::delete(favorites::remove))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .nest("/auth", auth_routes())
        .nest("/api/cart", cart_routes())
        .nest("/api/favorites", favorite_routes())
        .route(
            "/api/recently-viewed",
            get(recently_viewed::index).post(recently_viewed::record),
        )
}
