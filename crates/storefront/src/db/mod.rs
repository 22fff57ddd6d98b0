//! Remote data client: the relational tables behind carts and favorites.
//!
//! # Tables
//!
//! - `products` - Catalog (id, name, price, image)
//! - `profiles` - Signed-in shoppers, unique by email
//! - `carts` - One per profile, created lazily
//! - `cart_items` - Unique per `(cart_id, product_id)`
//! - `favorites` - Unique per `(user_id, product_id)`
//! - `tower_sessions.session` - Session storage (guest ephemeral store)
//!
//! # Backends
//!
//! The sync services talk to the [`RemoteStore`] trait. [`PgStore`] is the
//! production backend; [`MemoryStore`] keeps everything in process and is
//! used by tests and `STOREFRONT_BACKEND=memory`. Both enforce the
//! one-row-per-pair invariants at the storage layer (unique constraints and
//! upserts), so concurrent adds never duplicate a row.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p toko-cli -- migrate
//! ```

pub mod carts;
pub mod favorites;
pub mod memory;
pub mod postgres;
pub mod products;
pub mod profiles;

use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use toko_core::{
    Cart, CartId, CartItem, CartLine, Email, FavoriteId, FavoriteRecord, GuestCartItem, Product,
    ProductId, UserId,
};

use crate::models::Profile;

pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use products::NewProduct;

/// Errors that can occur in the remote data client.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Constraint violation (e.g., unknown product reference).
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// The backend refused the call (in-memory backend taken offline).
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Catalog lookups.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Fetch a product by its catalog code.
    async fn product(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError>;

    /// Insert a product or overwrite its name, price and image.
    async fn upsert_product(&self, product: &NewProduct) -> Result<Product, RepositoryError>;
}

/// Cart and cart item rows.
#[async_trait]
pub trait CartStore: Send + Sync {
    async fn find_cart(&self, user: UserId) -> Result<Option<Cart>, RepositoryError>;

    /// Create the user's cart. Returns the existing row if one was created
    /// concurrently.
    async fn create_cart(&self, user: UserId) -> Result<Cart, RepositoryError>;

    /// Lines of a cart joined with product names, oldest first.
    async fn cart_lines(&self, cart: CartId) -> Result<Vec<CartLine>, RepositoryError>;

    /// Insert a line capturing `unit_price`, or add `quantity` to the
    /// existing line for the product (keeping its captured price).
    async fn upsert_item(
        &self,
        cart: CartId,
        product: &ProductId,
        quantity: u32,
        unit_price: Decimal,
    ) -> Result<CartItem, RepositoryError>;

    /// Overwrite a line's quantity. `None` if the product is not in the cart.
    async fn set_quantity(
        &self,
        cart: CartId,
        product: &ProductId,
        quantity: u32,
    ) -> Result<Option<CartItem>, RepositoryError>;

    /// Delete one line. `false` if it did not exist.
    async fn remove_item(&self, cart: CartId, product: &ProductId)
    -> Result<bool, RepositoryError>;

    /// Delete every line of a cart, returning how many were removed.
    async fn clear_items(&self, cart: CartId) -> Result<u64, RepositoryError>;

    /// Upsert every guest line into the cart atomically: either all lines
    /// are merged or none are.
    async fn merge_items(
        &self,
        cart: CartId,
        items: &[GuestCartItem],
    ) -> Result<usize, RepositoryError>;
}

/// Favorite rows.
#[async_trait]
pub trait FavoriteStore: Send + Sync {
    /// Favorites joined with products, newest first.
    async fn favorites(&self, user: UserId) -> Result<Vec<FavoriteRecord>, RepositoryError>;

    async fn favorite_product_ids(&self, user: UserId) -> Result<Vec<ProductId>, RepositoryError>;

    /// Insert a favorite unless the pair already exists. `None` means it did.
    async fn insert_favorite(
        &self,
        user: UserId,
        product: &ProductId,
    ) -> Result<Option<FavoriteId>, RepositoryError>;

    /// Insert many favorites in one statement, skipping existing pairs.
    /// Returns the number of rows inserted.
    async fn insert_favorites(
        &self,
        user: UserId,
        products: &[ProductId],
    ) -> Result<usize, RepositoryError>;

    /// Delete by row id, scoped to the user.
    async fn delete_favorite(&self, user: UserId, id: FavoriteId) -> Result<bool, RepositoryError>;

    async fn delete_favorite_by_product(
        &self,
        user: UserId,
        product: &ProductId,
    ) -> Result<bool, RepositoryError>;

    async fn clear_favorites(&self, user: UserId) -> Result<u64, RepositoryError>;
}

/// Shopper profiles.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Look up the profile for an email, creating it on first sign-in.
    async fn get_or_create_profile(&self, email: &Email) -> Result<Profile, RepositoryError>;
}

/// Everything the sync services need from the remote side.
#[async_trait]
pub trait RemoteStore: CatalogStore + CartStore + FavoriteStore + ProfileStore {
    /// Cheap round trip used by the readiness probe.
    async fn ping(&self) -> Result<(), RepositoryError>;
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

/// Map unique/foreign-key violations to `Conflict`, everything else to `Database`.
pub(crate) fn map_constraint(err: sqlx::Error, what: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = err
        && (db_err.is_unique_violation() || db_err.is_foreign_key_violation())
    {
        return RepositoryError::Conflict(what.to_owned());
    }
    RepositoryError::Database(err)
}

/// Convert a stored quantity into the domain type.
pub(crate) fn quantity_from_db(quantity: i32) -> Result<u32, RepositoryError> {
    u32::try_from(quantity)
        .ok()
        .filter(|q| *q >= 1)
        .ok_or_else(|| RepositoryError::DataCorruption(format!("invalid quantity {quantity}")))
}

/// Convert a domain quantity for binding.
pub(crate) fn quantity_to_db(quantity: u32) -> Result<i32, RepositoryError> {
    i32::try_from(quantity)
        .map_err(|_| RepositoryError::Conflict(format!("quantity {quantity} out of range")))
}
