//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::StorefrontConfig;
use crate::db::RemoteStore;
use crate::services::{CartService, FavoritesService, GuestMigration, RecentlyViewedService};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to the
/// remote store, the sync services and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    store: Arc<dyn RemoteStore>,
    carts: CartService,
    favorites: FavoritesService,
    recently_viewed: RecentlyViewedService,
    migration: GuestMigration,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `config` - Storefront configuration
    /// * `store` - Remote store backend
    #[must_use]
    pub fn new(config: StorefrontConfig, store: Arc<dyn RemoteStore>) -> Self {
        let carts = CartService::new(Arc::clone(&store), config.cache_ttl);
        let favorites = FavoritesService::new(Arc::clone(&store), config.cache_ttl);
        let recently_viewed =
            RecentlyViewedService::new(Arc::clone(&store), config.recently_viewed_limit);
        let migration = GuestMigration::new(carts.clone(), favorites.clone());

        Self {
            inner: Arc::new(AppStateInner {
                config,
                store,
                carts,
                favorites,
                recently_viewed,
                migration,
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the remote store.
    #[must_use]
    pub fn store(&self) -> &dyn RemoteStore {
        self.inner.store.as_ref()
    }

    #[must_use]
    pub fn carts(&self) -> &CartService {
        &self.inner.carts
    }

    #[must_use]
    pub fn favorites(&self) -> &FavoritesService {
        &self.inner.favorites
    }

    #[must_use]
    pub fn recently_viewed(&self) -> &RecentlyViewedService {
        &self.inner.recently_viewed
    }

    #[must_use]
    pub fn migration(&self) -> &GuestMigration {
        &self.inner.migration
    }
}
