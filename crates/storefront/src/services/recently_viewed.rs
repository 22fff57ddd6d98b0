//! Recently viewed products.
//!
//! Kept in the guest store for every shopper, signed in or not.

use std::sync::Arc;

use chrono::Utc;
use tracing::instrument;

use toko_core::{LocalProduct, ProductId, push_recently_viewed};

use super::{SyncError, log_failure};
use crate::db::{CatalogStore, RemoteStore};
use crate::guest::GuestStore;

/// Records product views into a capped, deduplicated list.
#[derive(Clone)]
pub struct RecentlyViewedService {
    store: Arc<dyn RemoteStore>,
    limit: usize,
}

impl RecentlyViewedService {
    #[must_use]
    pub fn new(store: Arc<dyn RemoteStore>, limit: usize) -> Self {
        Self { store, limit }
    }

    /// Move a product to the front of the list. Returns the updated list.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::ProductNotFound` for unknown products.
    #[instrument(skip(self, guest))]
    pub async fn record_view(
        &self,
        guest: &GuestStore,
        product_id: &ProductId,
    ) -> Result<Vec<LocalProduct>, SyncError> {
        let result: Result<Vec<LocalProduct>, SyncError> = async {
            let product = self
                .store
                .product(product_id)
                .await?
                .ok_or_else(|| SyncError::ProductNotFound(product_id.clone()))?;

            let mut list = guest.recently_viewed().await?;
            push_recently_viewed(
                &mut list,
                LocalProduct::from_product(&product),
                Utc::now(),
                self.limit,
            );
            guest.set_recently_viewed(&list).await?;
            Ok(list)
        }
        .await;

        result.inspect_err(|e| log_failure("record_view", e))
    }

    /// Recently viewed products, newest first.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Guest` if the guest store fails.
    pub async fn recently_viewed(&self, guest: &GuestStore) -> Result<Vec<LocalProduct>, SyncError> {
        Ok(guest.recently_viewed().await?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::services::test_support;

    #[tokio::test]
    async fn test_views_dedupe_newest_first_and_cap() {
        let store = test_support::store().await;
        let service = RecentlyViewedService::new(store, 2);
        let guest = GuestStore::in_memory();

        for id in ["P1", "P2", "P1", "P3"] {
            service.record_view(&guest, &ProductId::new(id)).await.unwrap();
        }

        let ids: Vec<_> = service
            .recently_viewed(&guest)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.id.to_string())
            .collect();
        assert_eq!(ids, ["P3", "P1"]);
    }

    #[tokio::test]
    async fn test_unknown_product_is_rejected() {
        let store = test_support::store().await;
        let service = RecentlyViewedService::new(store, 12);
        let guest = GuestStore::in_memory();

        let err = service
            .record_view(&guest, &ProductId::new("NOPE"))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::ProductNotFound(_)));
        assert!(guest.recently_viewed().await.unwrap().is_empty());
    }
}
