//! Favorites synchronization service.
//!
//! Remote favorites are unique per `(user, product)`; guest favorites are a
//! list in the guest store. Both are served as [`FavoriteView`]s through
//! [`FavoriteEntry::into_view`], so guest entries carry a synthetic
//! `local_{productId}_{index}` key.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, instrument};

use toko_core::{
    FavoriteEntry, FavoriteKey, FavoriteRecord, FavoriteView, Identity, LocalProduct, Product,
    ProductId, UserId, guest_keys,
};

use super::cache::UserCache;
use super::{Shopper, SyncError, Transfer, log_failure};
use crate::db::{CatalogStore, FavoriteStore, RemoteStore};
use crate::guest::GuestStore;

/// Favorites for guests and signed-in shoppers.
#[derive(Clone)]
pub struct FavoritesService {
    inner: Arc<FavoritesServiceInner>,
}

struct FavoritesServiceInner {
    store: Arc<dyn RemoteStore>,
    cache: UserCache<Arc<Vec<FavoriteRecord>>>,
}

impl FavoritesService {
    /// Create a favorites service whose cached lists live for `ttl`.
    #[must_use]
    pub fn new(store: Arc<dyn RemoteStore>, ttl: Duration) -> Self {
        Self {
            inner: Arc::new(FavoritesServiceInner {
                store,
                cache: UserCache::new(ttl),
            }),
        }
    }

    /// The shopper's favorites. Remote favorites are newest first; guest
    /// favorites keep their list order.
    ///
    /// # Errors
    ///
    /// Returns `SyncError` if either store fails.
    #[instrument(skip(self, shopper), fields(identity = %shopper.identity))]
    pub async fn favorites(&self, shopper: &Shopper) -> Result<Vec<FavoriteView>, SyncError> {
        self.entries(shopper)
            .await
            .map(|entries| entries.into_iter().map(FavoriteEntry::into_view).collect())
            .inspect_err(|e| log_failure("fetch_favorites", e))
    }

    async fn entries(&self, shopper: &Shopper) -> Result<Vec<FavoriteEntry>, SyncError> {
        match shopper.identity {
            Identity::User(user) => Ok(self
                .remote(user)
                .await?
                .iter()
                .cloned()
                .map(FavoriteEntry::Remote)
                .collect()),
            Identity::Guest => Ok(FavoriteEntry::from_guest_list(
                shopper.guest.favorites().await?,
            )),
        }
    }

    async fn remote(&self, user: UserId) -> Result<Arc<Vec<FavoriteRecord>>, SyncError> {
        if let Some(records) = self.inner.cache.get(user).await {
            debug!("Cache hit for favorites");
            return Ok(records);
        }

        let ticket = self.inner.cache.ticket(user).await;
        let records = Arc::new(self.inner.store.favorites(user).await?);
        self.inner.cache.insert(user, ticket, Arc::clone(&records)).await;
        Ok(records)
    }

    /// Whether the shopper has favorited a product.
    ///
    /// # Errors
    ///
    /// Returns `SyncError` if either store fails.
    pub async fn is_favorite(
        &self,
        shopper: &Shopper,
        product_id: &ProductId,
    ) -> Result<bool, SyncError> {
        let entries = self.entries(shopper).await?;
        Ok(entries.iter().any(|e| e.product_id() == product_id))
    }

    /// Number of favorites the shopper has.
    ///
    /// # Errors
    ///
    /// Returns `SyncError` if either store fails.
    pub async fn favorite_count(&self, shopper: &Shopper) -> Result<usize, SyncError> {
        Ok(self.entries(shopper).await?.len())
    }

    /// Favorite a product.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::AlreadyFavorited` if it is already a favorite and
    /// `SyncError::ProductNotFound` for unknown products.
    #[instrument(skip(self, shopper), fields(identity = %shopper.identity))]
    pub async fn add_favorite(
        &self,
        shopper: &Shopper,
        product_id: &ProductId,
    ) -> Result<(), SyncError> {
        let result: Result<(), SyncError> = async {
            let product = self.product(product_id).await?;
            match shopper.identity {
                Identity::User(user) => {
                    self.inner
                        .store
                        .insert_favorite(user, product_id)
                        .await?
                        .ok_or_else(|| SyncError::AlreadyFavorited(product_id.clone()))?;
                    self.invalidate(user).await;
                }
                Identity::Guest => {
                    let mut items = shopper.guest.favorites().await?;
                    if items.iter().any(|i| &i.id == product_id) {
                        return Err(SyncError::AlreadyFavorited(product_id.clone()));
                    }
                    items.push(LocalProduct::from_product(&product));
                    shopper.guest.set_favorites(&items).await?;
                }
            }
            Ok(())
        }
        .await;

        result.inspect_err(|e| log_failure("add_favorite", e))
    }

    /// Remove a favorite by the key it was served with.
    ///
    /// Signed-in shoppers pass a row id; guests pass a `local_` key, which
    /// removes only the product it names.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::InvalidFavoriteKey` for unparseable keys,
    /// `SyncError::KeyMismatch` if the key kind does not match the shopper and
    /// `SyncError::FavoriteNotFound` if nothing was removed.
    #[instrument(skip(self, shopper), fields(identity = %shopper.identity))]
    pub async fn remove_favorite(&self, shopper: &Shopper, key: &str) -> Result<(), SyncError> {
        let result: Result<(), SyncError> = async {
            let key: FavoriteKey = key.parse()?;
            match (shopper.identity, key) {
                (Identity::User(user), FavoriteKey::Remote(id)) => {
                    if !self.inner.store.delete_favorite(user, id).await? {
                        return Err(SyncError::FavoriteNotFound);
                    }
                    self.invalidate(user).await;
                }
                (Identity::Guest, FavoriteKey::Local { product_id, .. }) => {
                    let mut items = shopper.guest.favorites().await?;
                    let before = items.len();
                    items.retain(|i| i.id != product_id);
                    if items.len() == before {
                        return Err(SyncError::FavoriteNotFound);
                    }
                    shopper.guest.set_favorites(&items).await?;
                }
                _ => return Err(SyncError::KeyMismatch),
            }
            Ok(())
        }
        .await;

        result.inspect_err(|e| log_failure("remove_favorite", e))
    }

    /// Flip a product's favorite state. Returns `true` if it is now a
    /// favorite.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::ProductNotFound` when favoriting an unknown product.
    #[instrument(skip(self, shopper), fields(identity = %shopper.identity))]
    pub async fn toggle_favorite(
        &self,
        shopper: &Shopper,
        product_id: &ProductId,
    ) -> Result<bool, SyncError> {
        let result: Result<bool, SyncError> = async {
            match shopper.identity {
                Identity::User(user) => {
                    if self
                        .inner
                        .store
                        .delete_favorite_by_product(user, product_id)
                        .await?
                    {
                        self.invalidate(user).await;
                        return Ok(false);
                    }
                    self.product(product_id).await?;
                    // `None` means a concurrent toggle inserted it first.
                    self.inner.store.insert_favorite(user, product_id).await?;
                    self.invalidate(user).await;
                    Ok(true)
                }
                Identity::Guest => {
                    let mut items = shopper.guest.favorites().await?;
                    let before = items.len();
                    items.retain(|i| &i.id != product_id);
                    let now_favorite = items.len() == before;
                    if now_favorite {
                        let product = self.product(product_id).await?;
                        items.push(LocalProduct::from_product(&product));
                    }
                    shopper.guest.set_favorites(&items).await?;
                    Ok(now_favorite)
                }
            }
        }
        .await;

        result.inspect_err(|e| log_failure("toggle_favorite", e))
    }

    /// Remove all of the shopper's favorites.
    ///
    /// # Errors
    ///
    /// Returns `SyncError` if either store fails.
    #[instrument(skip(self, shopper), fields(identity = %shopper.identity))]
    pub async fn clear_favorites(&self, shopper: &Shopper) -> Result<(), SyncError> {
        let result: Result<(), SyncError> = async {
            match shopper.identity {
                Identity::User(user) => {
                    let removed = self.inner.store.clear_favorites(user).await?;
                    debug!(removed, "Cleared favorites");
                    self.invalidate(user).await;
                }
                Identity::Guest => shopper.guest.clear(guest_keys::FAVORITES).await?,
            }
            Ok(())
        }
        .await;

        result.inspect_err(|e| log_failure("clear_favorites", e))
    }

    /// Copy guest favorites the user does not already have into the remote
    /// table, then clear the guest list.
    ///
    /// Favorites for products that left the catalog are dropped and counted
    /// as skipped. The insert is a single statement, so a failure inserts
    /// nothing and the guest list is kept for a retry.
    ///
    /// # Errors
    ///
    /// Returns `SyncError` if the read or the insert fails.
    #[instrument(skip(self, guest))]
    pub async fn sync_local_to_remote(
        &self,
        user: UserId,
        guest: &GuestStore,
    ) -> Result<Transfer, SyncError> {
        let result: Result<Transfer, SyncError> = async {
            let local = guest.favorites().await?;
            if local.is_empty() {
                return Ok(Transfer::default());
            }

            let remote: HashSet<ProductId> = self
                .inner
                .store
                .favorite_product_ids(user)
                .await?
                .into_iter()
                .collect();

            let mut seen = HashSet::new();
            let missing: Vec<ProductId> = local
                .into_iter()
                .map(|item| item.id)
                .filter(|id| !remote.contains(id) && seen.insert(id.clone()))
                .collect();

            let mut available = Vec::with_capacity(missing.len());
            for id in &missing {
                if self.inner.store.product(id).await?.is_some() {
                    available.push(id.clone());
                } else {
                    info!(product_id = %id, "Dropping guest favorite for a retired product");
                }
            }
            let skipped = missing.len() - available.len();

            let inserted = if available.is_empty() {
                0
            } else {
                self.inner.store.insert_favorites(user, &available).await?
            };

            guest.clear(guest_keys::FAVORITES).await?;
            self.invalidate(user).await;
            info!(inserted, skipped, "Synced guest favorites");
            Ok(Transfer {
                moved: inserted,
                skipped,
            })
        }
        .await;

        result.inspect_err(|e| log_failure("sync_local_to_remote", e))
    }

    /// Drop the cached list for a user.
    pub async fn invalidate(&self, user: UserId) {
        self.inner.cache.invalidate(user).await;
    }

    async fn product(&self, product_id: &ProductId) -> Result<Product, SyncError> {
        self.inner
            .store
            .product(product_id)
            .await?
            .ok_or_else(|| SyncError::ProductNotFound(product_id.clone()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::db::{FavoriteStore, MemoryStore};
    use crate::services::test_support::{self, GatedStore};

    async fn service() -> (FavoritesService, Arc<MemoryStore>) {
        let store = test_support::store().await;
        let service = FavoritesService::new(store.clone(), Duration::from_secs(60));
        (service, store)
    }

    fn guest() -> Shopper {
        Shopper::new(Identity::Guest, GuestStore::in_memory())
    }

    #[tokio::test]
    async fn test_guest_add_twice_keeps_one_entry() {
        let (service, _) = service().await;
        let shopper = guest();
        let p1 = ProductId::new("P1");

        service.add_favorite(&shopper, &p1).await.unwrap();
        let err = service.add_favorite(&shopper, &p1).await.unwrap_err();

        assert!(matches!(err, SyncError::AlreadyFavorited(_)));
        assert_eq!(service.favorite_count(&shopper).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_remote_add_twice_is_already_favorited() {
        let (service, store) = service().await;
        let user = test_support::user(&store, "dewi@toko.id").await;
        let shopper = Shopper::new(Identity::User(user), GuestStore::in_memory());
        let p1 = ProductId::new("P1");

        service.add_favorite(&shopper, &p1).await.unwrap();
        let err = service.add_favorite(&shopper, &p1).await.unwrap_err();

        assert!(matches!(err, SyncError::AlreadyFavorited(_)));
        assert!(service.is_favorite(&shopper, &p1).await.unwrap());
    }

    #[tokio::test]
    async fn test_guest_views_use_local_keys() {
        let (service, _) = service().await;
        let shopper = guest();
        service.add_favorite(&shopper, &ProductId::new("P1")).await.unwrap();

        let views = service.favorites(&shopper).await.unwrap();
        assert_eq!(views[0].id.to_string(), "local_P1_0");
        assert_eq!(views[0].product.price, Decimal::from(50_000));
        assert!(views[0].created_at.is_none());
    }

    #[tokio::test]
    async fn test_remove_local_key_removes_only_that_product() {
        let (service, _) = service().await;
        let shopper = guest();
        for id in ["P1", "P3", "P2"] {
            service.add_favorite(&shopper, &ProductId::new(id)).await.unwrap();
        }

        service.remove_favorite(&shopper, "local_P3_0").await.unwrap();

        let remaining: Vec<_> = shopper
            .guest
            .favorites()
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.id.to_string())
            .collect();
        assert_eq!(remaining, ["P1", "P2"]);
    }

    #[tokio::test]
    async fn test_key_kind_must_match_identity() {
        let (service, store) = service().await;
        let user = test_support::user(&store, "eka@toko.id").await;
        let shopper = Shopper::new(Identity::User(user), GuestStore::in_memory());

        let err = service
            .remove_favorite(&shopper, "local_P1_0")
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::KeyMismatch));

        let err = service.remove_favorite(&shopper, "nope").await.unwrap_err();
        assert!(matches!(err, SyncError::InvalidFavoriteKey(_)));
    }

    #[tokio::test]
    async fn test_remote_remove_by_id() {
        let (service, store) = service().await;
        let user = test_support::user(&store, "fajar@toko.id").await;
        let shopper = Shopper::new(Identity::User(user), GuestStore::in_memory());
        service.add_favorite(&shopper, &ProductId::new("P2")).await.unwrap();

        let views = service.favorites(&shopper).await.unwrap();
        let key = views[0].id.to_string();
        service.remove_favorite(&shopper, &key).await.unwrap();

        assert_eq!(service.favorite_count(&shopper).await.unwrap(), 0);
        let err = service.remove_favorite(&shopper, &key).await.unwrap_err();
        assert!(matches!(err, SyncError::FavoriteNotFound));
    }

    #[tokio::test]
    async fn test_toggle_flips_state() {
        let (service, store) = service().await;
        let user = test_support::user(&store, "gita@toko.id").await;
        let p3 = ProductId::new("P3");

        for shopper in [
            guest(),
            Shopper::new(Identity::User(user), GuestStore::in_memory()),
        ] {
            assert!(service.toggle_favorite(&shopper, &p3).await.unwrap());
            assert!(service.is_favorite(&shopper, &p3).await.unwrap());
            assert!(!service.toggle_favorite(&shopper, &p3).await.unwrap());
            assert!(!service.is_favorite(&shopper, &p3).await.unwrap());
        }
    }

    #[tokio::test]
    async fn test_sync_twice_inserts_nothing_second_time() {
        let (service, store) = service().await;
        let user = test_support::user(&store, "hadi@toko.id").await;
        let shopper = guest();
        service.add_favorite(&shopper, &ProductId::new("P1")).await.unwrap();

        let first = service
            .sync_local_to_remote(user, &shopper.guest)
            .await
            .unwrap();
        let second = service
            .sync_local_to_remote(user, &shopper.guest)
            .await
            .unwrap();

        assert_eq!(first.moved, 1);
        assert_eq!(second, Transfer::default());
        assert!(shopper.guest.favorites().await.unwrap().is_empty());

        let remote = store.favorite_product_ids(user).await.unwrap();
        assert_eq!(remote, [ProductId::new("P1")]);
    }

    #[tokio::test]
    async fn test_sync_skips_products_already_remote() {
        let (service, store) = service().await;
        let user = test_support::user(&store, "indah@toko.id").await;
        store.insert_favorite(user, &ProductId::new("P1")).await.unwrap();

        let shopper = guest();
        for id in ["P1", "P2"] {
            service.add_favorite(&shopper, &ProductId::new(id)).await.unwrap();
        }

        let transfer = service
            .sync_local_to_remote(user, &shopper.guest)
            .await
            .unwrap();
        assert_eq!(transfer.moved, 1);
        assert_eq!(store.favorites(user).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_sync_drops_products_gone_from_catalog() {
        let (service, store) = service().await;
        let user = test_support::user(&store, "intan@toko.id").await;
        let shopper = guest();
        service.add_favorite(&shopper, &ProductId::new("P2")).await.unwrap();
        let mut local = shopper.guest.favorites().await.unwrap();
        local.push(LocalProduct {
            id: ProductId::new("GONE"),
            name: "Retired".to_string(),
            price: Decimal::from(1_000),
            image: None,
            viewed_at: None,
        });
        shopper.guest.set_favorites(&local).await.unwrap();

        let transfer = service
            .sync_local_to_remote(user, &shopper.guest)
            .await
            .unwrap();

        assert_eq!(transfer, Transfer { moved: 1, skipped: 1 });
        assert_eq!(
            store.favorite_product_ids(user).await.unwrap(),
            [ProductId::new("P2")]
        );
        assert!(shopper.guest.favorites().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_read_racing_a_mutation_is_not_cached() {
        let memory = test_support::store().await;
        let gated = GatedStore::new(memory.clone());
        let service = FavoritesService::new(gated.clone(), Duration::from_secs(60));
        let user = test_support::user(&memory, "lukas@toko.id").await;
        let shopper = Shopper::new(Identity::User(user), GuestStore::in_memory());

        gated.arm();
        let reader = {
            let service = service.clone();
            tokio::spawn(async move {
                let shopper = Shopper::new(Identity::User(user), GuestStore::in_memory());
                service.favorite_count(&shopper).await
            })
        };
        gated.wait_paused().await;

        service.add_favorite(&shopper, &ProductId::new("P1")).await.unwrap();

        gated.release();
        assert_eq!(reader.await.unwrap().unwrap(), 0);
        assert_eq!(service.favorite_count(&shopper).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_sync_failure_retains_local_list() {
        let (service, store) = service().await;
        let user = test_support::user(&store, "joko@toko.id").await;
        let shopper = guest();
        service.add_favorite(&shopper, &ProductId::new("P1")).await.unwrap();

        store.set_offline(true);
        assert!(
            service
                .sync_local_to_remote(user, &shopper.guest)
                .await
                .is_err()
        );

        assert_eq!(shopper.guest.favorites().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_mutation_invalidates_cached_list() {
        let (service, store) = service().await;
        let user = test_support::user(&store, "kiki@toko.id").await;
        let shopper = Shopper::new(Identity::User(user), GuestStore::in_memory());

        assert_eq!(service.favorite_count(&shopper).await.unwrap(), 0);
        service.add_favorite(&shopper, &ProductId::new("P1")).await.unwrap();
        assert_eq!(service.favorite_count(&shopper).await.unwrap(), 1);

        service.clear_favorites(&shopper).await.unwrap();
        assert_eq!(service.favorite_count(&shopper).await.unwrap(), 0);
    }
}
