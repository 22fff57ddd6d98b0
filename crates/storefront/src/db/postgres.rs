//! `PostgreSQL` backend for the remote store traits.

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::PgPool;

use toko_core::{
    Cart, CartId, CartItem, CartLine, Email, FavoriteId, FavoriteRecord, GuestCartItem, Product,
    ProductId, UserId,
};

use super::carts::CartRepository;
use super::favorites::FavoriteRepository;
use super::products::{NewProduct, ProductRepository};
use super::profiles::ProfileRepository;
use super::{
    CartStore, CatalogStore, FavoriteStore, ProfileStore, RemoteStore, RepositoryError,
};
use crate::models::Profile;

/// Remote store backed by a `PostgreSQL` pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl CatalogStore for PgStore {
    async fn product(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError> {
        ProductRepository::new(&self.pool).get(id).await
    }

    async fn upsert_product(&self, product: &NewProduct) -> Result<Product, RepositoryError> {
        ProductRepository::new(&self.pool).upsert(product).await
    }
}

#[async_trait]
impl CartStore for PgStore {
    async fn find_cart(&self, user: UserId) -> Result<Option<Cart>, RepositoryError> {
        CartRepository::new(&self.pool).find_by_user(user).await
    }

    async fn create_cart(&self, user: UserId) -> Result<Cart, RepositoryError> {
        CartRepository::new(&self.pool).create(user).await
    }

    async fn cart_lines(&self, cart: CartId) -> Result<Vec<CartLine>, RepositoryError> {
        CartRepository::new(&self.pool).lines(cart).await
    }

    async fn upsert_item(
        &self,
        cart: CartId,
        product: &ProductId,
        quantity: u32,
        unit_price: Decimal,
    ) -> Result<CartItem, RepositoryError> {
        CartRepository::new(&self.pool)
            .upsert_item(cart, product, quantity, unit_price)
            .await
    }

    async fn set_quantity(
        &self,
        cart: CartId,
        product: &ProductId,
        quantity: u32,
    ) -> Result<Option<CartItem>, RepositoryError> {
        CartRepository::new(&self.pool)
            .set_quantity(cart, product, quantity)
            .await
    }

    async fn remove_item(
        &self,
        cart: CartId,
        product: &ProductId,
    ) -> Result<bool, RepositoryError> {
        CartRepository::new(&self.pool)
            .remove_item(cart, product)
            .await
    }

    async fn clear_items(&self, cart: CartId) -> Result<u64, RepositoryError> {
        CartRepository::new(&self.pool).clear(cart).await
    }

    async fn merge_items(
        &self,
        cart: CartId,
        items: &[GuestCartItem],
    ) -> Result<usize, RepositoryError> {
        CartRepository::new(&self.pool).merge(cart, items).await
    }
}

#[async_trait]
impl FavoriteStore for PgStore {
    async fn favorites(&self, user: UserId) -> Result<Vec<FavoriteRecord>, RepositoryError> {
        FavoriteRepository::new(&self.pool).list(user).await
    }

    async fn favorite_product_ids(&self, user: UserId) -> Result<Vec<ProductId>, RepositoryError> {
        FavoriteRepository::new(&self.pool).product_ids(user).await
    }

    async fn insert_favorite(
        &self,
        user: UserId,
        product: &ProductId,
    ) -> Result<Option<FavoriteId>, RepositoryError> {
        FavoriteRepository::new(&self.pool)
            .insert(user, product)
            .await
    }

    async fn insert_favorites(
        &self,
        user: UserId,
        products: &[ProductId],
    ) -> Result<usize, RepositoryError> {
        FavoriteRepository::new(&self.pool)
            .insert_many(user, products)
            .await
    }

    async fn delete_favorite(&self, user: UserId, id: FavoriteId) -> Result<bool, RepositoryError> {
        FavoriteRepository::new(&self.pool).delete(user, id).await
    }

    async fn delete_favorite_by_product(
        &self,
        user: UserId,
        product: &ProductId,
    ) -> Result<bool, RepositoryError> {
        FavoriteRepository::new(&self.pool)
            .delete_by_product(user, product)
            .await
    }

    async fn clear_favorites(&self, user: UserId) -> Result<u64, RepositoryError> {
        FavoriteRepository::new(&self.pool).clear(user).await
    }
}

#[async_trait]
impl ProfileStore for PgStore {
    async fn get_or_create_profile(&self, email: &Email) -> Result<Profile, RepositoryError> {
        ProfileRepository::new(&self.pool).get_or_create(email).await
    }
}

#[async_trait]
impl RemoteStore for PgStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }
}
