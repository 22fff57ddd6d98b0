//! In-process backend for the remote store traits.
//!
//! Every call takes the same mutex, so check-then-write sequences are atomic
//! and mirror the unique constraints of the SQL schema. The store can be
//! taken offline to exercise failure paths.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::{Mutex, MutexGuard};

use toko_core::{
    Cart, CartId, CartItem, CartItemId, CartLine, Email, FavoriteId, FavoriteRecord,
    GuestCartItem, Product, ProductId, ProductSummary, UserId,
};

use super::products::NewProduct;
use super::{
    CartStore, CatalogStore, FavoriteStore, ProfileStore, RemoteStore, RepositoryError,
};
use crate::models::Profile;

#[derive(Debug, Clone)]
struct FavoriteRow {
    id: FavoriteId,
    user_id: UserId,
    product_id: ProductId,
    created_at: DateTime<Utc>,
}

#[derive(Default)]
struct Tables {
    products: BTreeMap<ProductId, Product>,
    profiles: Vec<Profile>,
    carts: Vec<Cart>,
    /// Insertion order doubles as `created_at` order.
    cart_items: Vec<CartItem>,
    favorites: Vec<FavoriteRow>,
}

impl Tables {
    fn require_product(&self, id: &ProductId) -> Result<&Product, RepositoryError> {
        self.products
            .get(id)
            .ok_or_else(|| RepositoryError::Conflict(format!("product {id} does not exist")))
    }

    fn upsert_item(
        &mut self,
        cart: CartId,
        product: &ProductId,
        quantity: u32,
        unit_price: Decimal,
    ) -> Result<CartItem, RepositoryError> {
        self.require_product(product)?;

        if let Some(item) = self
            .cart_items
            .iter_mut()
            .find(|item| item.cart_id == cart && &item.product_id == product)
        {
            item.quantity = item.quantity.checked_add(quantity).ok_or_else(|| {
                RepositoryError::Conflict(format!("quantity overflow for {product}"))
            })?;
            return Ok(item.clone());
        }

        let item = CartItem {
            id: CartItemId::random(),
            cart_id: cart,
            product_id: product.clone(),
            quantity,
            unit_price,
            created_at: Utc::now(),
        };
        self.cart_items.push(item.clone());
        Ok(item)
    }
}

/// Remote store kept entirely in memory.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    offline: AtomicBool,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with `RepositoryError::Unavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    async fn tables(&self) -> Result<MutexGuard<'_, Tables>, RepositoryError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable(
                "memory store is offline".to_owned(),
            ));
        }
        Ok(self.tables.lock().await)
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn product(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError> {
        Ok(self.tables().await?.products.get(id).cloned())
    }

    async fn upsert_product(&self, product: &NewProduct) -> Result<Product, RepositoryError> {
        let mut tables = self.tables().await?;
        let created_at = tables
            .products
            .get(&product.id)
            .map_or_else(Utc::now, |existing| existing.created_at);

        let row = Product {
            id: product.id.clone(),
            name: product.name.clone(),
            price: product.price,
            image_url: product.image_url.clone(),
            created_at,
        };
        tables.products.insert(row.id.clone(), row.clone());
        Ok(row)
    }
}

#[async_trait]
impl CartStore for MemoryStore {
    async fn find_cart(&self, user: UserId) -> Result<Option<Cart>, RepositoryError> {
        let tables = self.tables().await?;
        Ok(tables.carts.iter().find(|c| c.user_id == user).copied())
    }

    async fn create_cart(&self, user: UserId) -> Result<Cart, RepositoryError> {
        let mut tables = self.tables().await?;
        if !tables.profiles.iter().any(|p| p.id == user) {
            return Err(RepositoryError::Conflict(
                "cart owner does not exist".to_owned(),
            ));
        }
        if let Some(cart) = tables.carts.iter().find(|c| c.user_id == user) {
            return Ok(*cart);
        }

        let cart = Cart {
            id: CartId::random(),
            user_id: user,
            created_at: Utc::now(),
        };
        tables.carts.push(cart);
        Ok(cart)
    }

    async fn cart_lines(&self, cart: CartId) -> Result<Vec<CartLine>, RepositoryError> {
        let tables = self.tables().await?;
        tables
            .cart_items
            .iter()
            .filter(|item| item.cart_id == cart)
            .map(|item| {
                let product = tables.products.get(&item.product_id).ok_or_else(|| {
                    RepositoryError::DataCorruption(format!(
                        "cart item references missing product {}",
                        item.product_id
                    ))
                })?;
                Ok(CartLine {
                    product_id: item.product_id.clone(),
                    name: product.name.clone(),
                    image_url: product.image_url.clone(),
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                    added_at: item.created_at,
                })
            })
            .collect()
    }

    async fn upsert_item(
        &self,
        cart: CartId,
        product: &ProductId,
        quantity: u32,
        unit_price: Decimal,
    ) -> Result<CartItem, RepositoryError> {
        self.tables()
            .await?
            .upsert_item(cart, product, quantity, unit_price)
    }

    async fn set_quantity(
        &self,
        cart: CartId,
        product: &ProductId,
        quantity: u32,
    ) -> Result<Option<CartItem>, RepositoryError> {
        let mut tables = self.tables().await?;
        Ok(tables
            .cart_items
            .iter_mut()
            .find(|item| item.cart_id == cart && &item.product_id == product)
            .map(|item| {
                item.quantity = quantity;
                item.clone()
            }))
    }

    async fn remove_item(
        &self,
        cart: CartId,
        product: &ProductId,
    ) -> Result<bool, RepositoryError> {
        let mut tables = self.tables().await?;
        let before = tables.cart_items.len();
        tables
            .cart_items
            .retain(|item| !(item.cart_id == cart && &item.product_id == product));
        Ok(tables.cart_items.len() < before)
    }

    async fn clear_items(&self, cart: CartId) -> Result<u64, RepositoryError> {
        let mut tables = self.tables().await?;
        let before = tables.cart_items.len();
        tables.cart_items.retain(|item| item.cart_id != cart);
        Ok(u64::try_from(before - tables.cart_items.len()).unwrap_or(u64::MAX))
    }

    async fn merge_items(
        &self,
        cart: CartId,
        items: &[GuestCartItem],
    ) -> Result<usize, RepositoryError> {
        let mut tables = self.tables().await?;
        // Validate first so a bad line leaves the cart untouched.
        for item in items {
            tables.require_product(&item.product_id)?;
        }
        for item in items {
            tables.upsert_item(cart, &item.product_id, item.quantity, item.unit_price)?;
        }
        Ok(items.len())
    }
}

#[async_trait]
impl FavoriteStore for MemoryStore {
    async fn favorites(&self, user: UserId) -> Result<Vec<FavoriteRecord>, RepositoryError> {
        let tables = self.tables().await?;
        let mut records = tables
            .favorites
            .iter()
            .rev()
            .filter(|row| row.user_id == user)
            .map(|row| {
                let product = tables.products.get(&row.product_id).ok_or_else(|| {
                    RepositoryError::DataCorruption(format!(
                        "favorite references missing product {}",
                        row.product_id
                    ))
                })?;
                Ok(FavoriteRecord {
                    id: row.id,
                    user_id: row.user_id,
                    product: ProductSummary::from(product),
                    created_at: row.created_at,
                })
            })
            .collect::<Result<Vec<_>, RepositoryError>>()?;

        // Stable sort keeps newest-inserted first among equal timestamps.
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    async fn favorite_product_ids(&self, user: UserId) -> Result<Vec<ProductId>, RepositoryError> {
        let tables = self.tables().await?;
        Ok(tables
            .favorites
            .iter()
            .filter(|row| row.user_id == user)
            .map(|row| row.product_id.clone())
            .collect())
    }

    async fn insert_favorite(
        &self,
        user: UserId,
        product: &ProductId,
    ) -> Result<Option<FavoriteId>, RepositoryError> {
        let mut tables = self.tables().await?;
        tables.require_product(product)?;
        if tables
            .favorites
            .iter()
            .any(|row| row.user_id == user && &row.product_id == product)
        {
            return Ok(None);
        }

        let id = FavoriteId::random();
        tables.favorites.push(FavoriteRow {
            id,
            user_id: user,
            product_id: product.clone(),
            created_at: Utc::now(),
        });
        Ok(Some(id))
    }

    async fn insert_favorites(
        &self,
        user: UserId,
        products: &[ProductId],
    ) -> Result<usize, RepositoryError> {
        let mut tables = self.tables().await?;
        for product in products {
            tables.require_product(product)?;
        }

        let mut inserted = 0;
        for product in products {
            if tables
                .favorites
                .iter()
                .any(|row| row.user_id == user && &row.product_id == product)
            {
                continue;
            }
            tables.favorites.push(FavoriteRow {
                id: FavoriteId::random(),
                user_id: user,
                product_id: product.clone(),
                created_at: Utc::now(),
            });
            inserted += 1;
        }
        Ok(inserted)
    }

    async fn delete_favorite(&self, user: UserId, id: FavoriteId) -> Result<bool, RepositoryError> {
        let mut tables = self.tables().await?;
        let before = tables.favorites.len();
        tables
            .favorites
            .retain(|row| !(row.id == id && row.user_id == user));
        Ok(tables.favorites.len() < before)
    }

    async fn delete_favorite_by_product(
        &self,
        user: UserId,
        product: &ProductId,
    ) -> Result<bool, RepositoryError> {
        let mut tables = self.tables().await?;
        let before = tables.favorites.len();
        tables
            .favorites
            .retain(|row| !(row.user_id == user && &row.product_id == product));
        Ok(tables.favorites.len() < before)
    }

    async fn clear_favorites(&self, user: UserId) -> Result<u64, RepositoryError> {
        let mut tables = self.tables().await?;
        let before = tables.favorites.len();
        tables.favorites.retain(|row| row.user_id != user);
        Ok(u64::try_from(before - tables.favorites.len()).unwrap_or(u64::MAX))
    }
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn get_or_create_profile(&self, email: &Email) -> Result<Profile, RepositoryError> {
        let mut tables = self.tables().await?;
        if let Some(profile) = tables.profiles.iter().find(|p| &p.email == email) {
            return Ok(profile.clone());
        }

        let profile = Profile {
            id: UserId::random(),
            email: email.clone(),
            created_at: Utc::now(),
        };
        tables.profiles.push(profile.clone());
        Ok(profile)
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        self.tables().await.map(|_| ())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    async fn seeded() -> (MemoryStore, UserId) {
        let store = MemoryStore::new();
        for (id, price) in [("P1", 50_000), ("P2", 12_500)] {
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
        let profile = store
            .get_or_create_profile(&Email::parse("ana@toko.id").unwrap())
            .await
            .unwrap();
        (store, profile.id)
    }

    #[tokio::test]
    async fn test_create_cart_is_idempotent() {
        let (store, user) = seeded().await;
        let first = store.create_cart(user).await.unwrap();
        let second = store.create_cart(user).await.unwrap();
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn test_create_cart_requires_profile() {
        let (store, _) = seeded().await;
        let err = store.create_cart(UserId::random()).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_upsert_item_increments_and_keeps_captured_price() {
        let (store, user) = seeded().await;
        let cart = store.create_cart(user).await.unwrap();
        let p1 = ProductId::new("P1");

        store
            .upsert_item(cart.id, &p1, 2, Decimal::from(50_000))
            .await
            .unwrap();
        let item = store
            .upsert_item(cart.id, &p1, 3, Decimal::from(99))
            .await
            .unwrap();

        assert_eq!(item.quantity, 5);
        assert_eq!(item.unit_price, Decimal::from(50_000));
        assert_eq!(store.cart_lines(cart.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_merge_items_is_all_or_nothing() {
        let (store, user) = seeded().await;
        let cart = store.create_cart(user).await.unwrap();
        let now = Utc::now();
        let items = vec![
            GuestCartItem {
                product_id: ProductId::new("P1"),
                name: "P1".to_owned(),
                unit_price: Decimal::from(50_000),
                image: None,
                quantity: 1,
                added_at: now,
            },
            GuestCartItem {
                product_id: ProductId::new("GONE"),
                name: "Gone".to_owned(),
                unit_price: Decimal::ONE,
                image: None,
                quantity: 1,
                added_at: now,
            },
        ];

        assert!(store.merge_items(cart.id, &items).await.is_err());
        assert!(store.cart_lines(cart.id).await.unwrap().is_empty());

        assert_eq!(store.merge_items(cart.id, &items[..1]).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_favorites_newest_first_and_unique() {
        let (store, user) = seeded().await;
        let p1 = ProductId::new("P1");
        let p2 = ProductId::new("P2");

        assert!(store.insert_favorite(user, &p1).await.unwrap().is_some());
        assert!(store.insert_favorite(user, &p2).await.unwrap().is_some());
        assert!(store.insert_favorite(user, &p1).await.unwrap().is_none());

        let list = store.favorites(user).await.unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].product.id, p2);
    }

    #[tokio::test]
    async fn test_offline_store_rejects_calls() {
        let (store, _) = seeded().await;
        store.set_offline(true);
        assert!(matches!(
            store.ping().await,
            Err(RepositoryError::Unavailable(_))
        ));
        store.set_offline(false);
        assert!(store.ping().await.is_ok());
    }
}
