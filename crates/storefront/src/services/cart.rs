//! Cart synchronization service.
//!
//! Signed-in shoppers' carts live in the remote `carts`/`cart_items` tables
//! and their snapshots are cached per user. Guests keep their lines in the
//! guest `cart` key. Totals are always derived from the lines.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, instrument};

use toko_core::{
    Cart, CartLine, CartSnapshot, GuestCartItem, Identity, ProductId, UserId, guest_keys,
};

use super::cache::UserCache;
use super::{MAX_QUANTITY, Shopper, SyncError, Transfer, log_failure, positive_quantity};
use crate::db::{CartStore, CatalogStore, RemoteStore};
use crate::guest::GuestStore;

/// Cart operations for guests and signed-in shoppers.
#[derive(Clone)]
pub struct CartService {
    inner: Arc<CartServiceInner>,
}

struct CartServiceInner {
    store: Arc<dyn RemoteStore>,
    cache: UserCache<CartSnapshot>,
}

impl CartService {
    /// Create a cart service whose cached snapshots live for `ttl`.
    #[must_use]
    pub fn new(store: Arc<dyn RemoteStore>, ttl: Duration) -> Self {
        Self {
            inner: Arc::new(CartServiceInner {
                store,
                cache: UserCache::new(ttl),
            }),
        }
    }

    /// Look up the user's cart, creating it if absent.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Repository` if the lookup or insert fails.
    #[instrument(skip(self))]
    pub async fn get_or_create_cart(&self, user: UserId) -> Result<Cart, SyncError> {
        if let Some(cart) = self.inner.store.find_cart(user).await? {
            return Ok(cart);
        }
        debug!("Creating cart");
        Ok(self.inner.store.create_cart(user).await?)
    }

    /// Current cart contents with derived totals.
    ///
    /// # Errors
    ///
    /// Returns `SyncError` if either store fails.
    #[instrument(skip(self, shopper), fields(identity = %shopper.identity))]
    pub async fn cart(&self, shopper: &Shopper) -> Result<CartSnapshot, SyncError> {
        let result = match shopper.identity {
            Identity::User(user) => self.remote_cart(user).await,
            Identity::Guest => guest_snapshot(&shopper.guest).await,
        };
        result.inspect_err(|e| log_failure("fetch_cart", e))
    }

    async fn remote_cart(&self, user: UserId) -> Result<CartSnapshot, SyncError> {
        if let Some(snapshot) = self.inner.cache.get(user).await {
            debug!("Cache hit for cart");
            return Ok(snapshot);
        }

        let ticket = self.inner.cache.ticket(user).await;
        let snapshot = match self.inner.store.find_cart(user).await? {
            Some(cart) => CartSnapshot::from_lines(self.inner.store.cart_lines(cart.id).await?),
            None => CartSnapshot::empty(),
        };

        self.inner.cache.insert(user, ticket, snapshot.clone()).await;
        Ok(snapshot)
    }

    /// Add `quantity` of a product, incrementing an existing line.
    ///
    /// The unit price is captured from the catalog on the first add; later
    /// adds keep it.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::InvalidQuantity` if `quantity < 1` and
    /// `SyncError::ProductNotFound` for unknown products.
    #[instrument(skip(self, shopper), fields(identity = %shopper.identity))]
    pub async fn add_to_cart(
        &self,
        shopper: &Shopper,
        product_id: &ProductId,
        quantity: i64,
    ) -> Result<CartSnapshot, SyncError> {
        self.try_add(shopper, product_id, quantity)
            .await
            .inspect_err(|e| log_failure("add_to_cart", e))?;
        self.cart(shopper).await
    }

    async fn try_add(
        &self,
        shopper: &Shopper,
        product_id: &ProductId,
        quantity: i64,
    ) -> Result<(), SyncError> {
        let quantity = positive_quantity(quantity)?;
        let product = self
            .inner
            .store
            .product(product_id)
            .await?
            .ok_or_else(|| SyncError::ProductNotFound(product_id.clone()))?;

        match shopper.identity {
            Identity::User(user) => {
                let cart = self.get_or_create_cart(user).await?;
                self.inner
                    .store
                    .upsert_item(cart.id, product_id, quantity, product.price)
                    .await?;
                self.invalidate(user).await;
            }
            Identity::Guest => {
                let mut items = shopper.guest.cart().await?;
                if let Some(line) = items.iter_mut().find(|i| &i.product_id == product_id) {
                    line.quantity = line
                        .quantity
                        .checked_add(quantity)
                        .filter(|q| *q <= MAX_QUANTITY)
                        .ok_or(SyncError::InvalidQuantity(i64::from(quantity)))?;
                } else {
                    items.push(GuestCartItem::new(&product, quantity, Utc::now()));
                }
                shopper.guest.set_cart(&items).await?;
            }
        }
        Ok(())
    }

    /// Set a line's quantity. A quantity below 1 removes the line.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::ItemNotFound` if the product is not in the cart.
    #[instrument(skip(self, shopper), fields(identity = %shopper.identity))]
    pub async fn update_quantity(
        &self,
        shopper: &Shopper,
        product_id: &ProductId,
        quantity: i64,
    ) -> Result<CartSnapshot, SyncError> {
        if quantity < 1 {
            return self.remove_item(shopper, product_id).await;
        }

        self.try_update(shopper, product_id, quantity)
            .await
            .inspect_err(|e| log_failure("update_quantity", e))?;
        self.cart(shopper).await
    }

    async fn try_update(
        &self,
        shopper: &Shopper,
        product_id: &ProductId,
        quantity: i64,
    ) -> Result<(), SyncError> {
        let quantity = positive_quantity(quantity)?;
        let not_found = || SyncError::ItemNotFound(product_id.clone());

        match shopper.identity {
            Identity::User(user) => {
                let cart = self.inner.store.find_cart(user).await?.ok_or_else(not_found)?;
                self.inner
                    .store
                    .set_quantity(cart.id, product_id, quantity)
                    .await?
                    .ok_or_else(not_found)?;
                self.invalidate(user).await;
            }
            Identity::Guest => {
                let mut items = shopper.guest.cart().await?;
                let line = items
                    .iter_mut()
                    .find(|i| &i.product_id == product_id)
                    .ok_or_else(not_found)?;
                line.quantity = quantity;
                shopper.guest.set_cart(&items).await?;
            }
        }
        Ok(())
    }

    /// Remove a product's line.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::ItemNotFound` if the product is not in the cart.
    #[instrument(skip(self, shopper), fields(identity = %shopper.identity))]
    pub async fn remove_item(
        &self,
        shopper: &Shopper,
        product_id: &ProductId,
    ) -> Result<CartSnapshot, SyncError> {
        self.try_remove(shopper, product_id)
            .await
            .inspect_err(|e| log_failure("remove_item", e))?;
        self.cart(shopper).await
    }

    async fn try_remove(&self, shopper: &Shopper, product_id: &ProductId) -> Result<(), SyncError> {
        let not_found = || SyncError::ItemNotFound(product_id.clone());

        match shopper.identity {
            Identity::User(user) => {
                let cart = self.inner.store.find_cart(user).await?.ok_or_else(not_found)?;
                if !self.inner.store.remove_item(cart.id, product_id).await? {
                    return Err(not_found());
                }
                self.invalidate(user).await;
            }
            Identity::Guest => {
                let mut items = shopper.guest.cart().await?;
                let before = items.len();
                items.retain(|i| &i.product_id != product_id);
                if items.len() == before {
                    return Err(not_found());
                }
                shopper.guest.set_cart(&items).await?;
            }
        }
        Ok(())
    }

    /// Remove every line.
    ///
    /// # Errors
    ///
    /// Returns `SyncError` if either store fails.
    #[instrument(skip(self, shopper), fields(identity = %shopper.identity))]
    pub async fn clear_cart(&self, shopper: &Shopper) -> Result<CartSnapshot, SyncError> {
        let result: Result<(), SyncError> = async {
            match shopper.identity {
                Identity::User(user) => {
                    if let Some(cart) = self.inner.store.find_cart(user).await? {
                        let removed = self.inner.store.clear_items(cart.id).await?;
                        debug!(removed, "Cleared cart");
                    }
                    self.invalidate(user).await;
                }
                Identity::Guest => shopper.guest.clear(guest_keys::CART).await?,
            }
            Ok(())
        }
        .await;

        result.inspect_err(|e| log_failure("clear_cart", e))?;
        Ok(CartSnapshot::empty())
    }

    /// Merge the guest cart into the user's remote cart.
    ///
    /// Quantities add onto existing lines. Lines for products that left
    /// the catalog are dropped and counted as skipped. The merge is atomic;
    /// the guest `cart` key is cleared only after it commits.
    ///
    /// # Errors
    ///
    /// Returns `SyncError` if the merge fails; the guest cart is kept.
    #[instrument(skip(self, guest))]
    pub async fn merge_guest_cart(
        &self,
        user: UserId,
        guest: &GuestStore,
    ) -> Result<Transfer, SyncError> {
        let result: Result<Transfer, SyncError> = async {
            let items = guest.cart().await?;
            if items.is_empty() {
                return Ok(Transfer::default());
            }

            let total = items.len();
            let mut available = Vec::with_capacity(total);
            for item in items {
                if self.inner.store.product(&item.product_id).await?.is_some() {
                    available.push(item);
                } else {
                    info!(
                        product_id = %item.product_id,
                        "Dropping guest cart line for a retired product"
                    );
                }
            }
            let skipped = total - available.len();

            let moved = if available.is_empty() {
                0
            } else {
                let cart = self.get_or_create_cart(user).await?;
                let merged = self.inner.store.merge_items(cart.id, &available).await?;
                self.invalidate(user).await;
                merged
            };
            guest.clear(guest_keys::CART).await?;
            Ok(Transfer { moved, skipped })
        }
        .await;

        result.inspect_err(|e| log_failure("merge_guest_cart", e))
    }

    /// Drop the cached snapshot for a user.
    pub async fn invalidate(&self, user: UserId) {
        self.inner.cache.invalidate(user).await;
    }
}

async fn guest_snapshot(guest: &GuestStore) -> Result<CartSnapshot, SyncError> {
    let items = guest.cart().await?;
    Ok(CartSnapshot::from_lines(
        items.iter().map(CartLine::from).collect(),
    ))
}
