//! Guest ephemeral store.
//!
//! Guests have no remote rows. Their favorites, cart and recently viewed
//! products live as JSON arrays under fixed keys in a per-browser key/value
//! store. In the service that store is the shopper's session; tests use
//! [`MemoryLocalStore`].
//!
//! Unreadable values are logged and treated as empty, so a corrupted key
//! never blocks the shopper; the next write overwrites it.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::sync::Mutex;
use tower_sessions::Session;
use tracing::warn;

use toko_core::{GuestCartItem, LocalProduct, MigrationStatus, guest_keys};

/// Key holding the guest migration status.
pub const MIGRATION_STATUS_KEY: &str = "migrationStatus";

/// Prefix applied to guest keys inside the session.
const SESSION_PREFIX: &str = "guest.";

/// Errors from the guest ephemeral store.
#[derive(Debug, Error)]
pub enum GuestStorageError {
    #[error("session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    #[error("failed to encode guest data: {0}")]
    Encode(#[from] serde_json::Error),
}

/// String key/value storage scoped to one browser.
#[async_trait]
pub trait LocalStore: Send + Sync {
    async fn get_raw(&self, key: &str) -> Result<Option<String>, GuestStorageError>;

    async fn set_raw(&self, key: &str, value: String) -> Result<(), GuestStorageError>;

    async fn remove(&self, key: &str) -> Result<(), GuestStorageError>;
}

/// Local store backed by the shopper's `tower-sessions` session.
#[derive(Clone)]
pub struct SessionLocalStore {
    session: Session,
}

impl SessionLocalStore {
    #[must_use]
    pub const fn new(session: Session) -> Self {
        Self { session }
    }

    fn key(key: &str) -> String {
        format!("{SESSION_PREFIX}{key}")
    }
}

#[async_trait]
impl LocalStore for SessionLocalStore {
    async fn get_raw(&self, key: &str) -> Result<Option<String>, GuestStorageError> {
        Ok(self.session.get::<String>(&Self::key(key)).await?)
    }

    async fn set_raw(&self, key: &str, value: String) -> Result<(), GuestStorageError> {
        self.session.insert(&Self::key(key), value).await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), GuestStorageError> {
        self.session.remove_value(&Self::key(key)).await?;
        Ok(())
    }
}

/// In-process local store.
#[derive(Default)]
pub struct MemoryLocalStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryLocalStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LocalStore for MemoryLocalStore {
    async fn get_raw(&self, key: &str) -> Result<Option<String>, GuestStorageError> {
        Ok(self.values.lock().await.get(key).cloned())
    }

    async fn set_raw(&self, key: &str, value: String) -> Result<(), GuestStorageError> {
        self.values.lock().await.insert(key.to_owned(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), GuestStorageError> {
        self.values.lock().await.remove(key);
        Ok(())
    }
}

/// Typed view over the guest keys of one local store.
#[derive(Clone)]
pub struct GuestStore {
    local: Arc<dyn LocalStore>,
}

impl GuestStore {
    #[must_use]
    pub fn new(local: Arc<dyn LocalStore>) -> Self {
        Self { local }
    }

    /// Guest store backed by a session.
    #[must_use]
    pub fn from_session(session: Session) -> Self {
        Self::new(Arc::new(SessionLocalStore::new(session)))
    }

    /// Guest store backed by a fresh in-memory map.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryLocalStore::new()))
    }

    /// Read and decode a key. Missing or malformed values decode as `None`.
    async fn read<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, GuestStorageError> {
        let Some(raw) = self.local.get_raw(key).await? else {
            return Ok(None);
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!(key, error = %e, "Discarding malformed guest data");
                Ok(None)
            }
        }
    }

    async fn write<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
    ) -> Result<(), GuestStorageError> {
        let raw = serde_json::to_string(value)?;
        self.local.set_raw(key, raw).await
    }

    /// # Errors
    ///
    /// Returns `GuestStorageError` if the underlying store fails.
    pub async fn favorites(&self) -> Result<Vec<LocalProduct>, GuestStorageError> {
        Ok(self.read(guest_keys::FAVORITES).await?.unwrap_or_default())
    }

    /// # Errors
    ///
    /// Returns `GuestStorageError` if the underlying store fails.
    pub async fn set_favorites(&self, items: &[LocalProduct]) -> Result<(), GuestStorageError> {
        self.write(guest_keys::FAVORITES, items).await
    }

    /// # Errors
    ///
    /// Returns `GuestStorageError` if the underlying store fails.
    pub async fn recently_viewed(&self) -> Result<Vec<LocalProduct>, GuestStorageError> {
        Ok(self
            .read(guest_keys::RECENTLY_VIEWED)
            .await?
            .unwrap_or_default())
    }

    /// # Errors
    ///
    /// Returns `GuestStorageError` if the underlying store fails.
    pub async fn set_recently_viewed(
        &self,
        items: &[LocalProduct],
    ) -> Result<(), GuestStorageError> {
        self.write(guest_keys::RECENTLY_VIEWED, items).await
    }

    /// # Errors
    ///
    /// Returns `GuestStorageError` if the underlying store fails.
    pub async fn cart(&self) -> Result<Vec<GuestCartItem>, GuestStorageError> {
        Ok(self.read(guest_keys::CART).await?.unwrap_or_default())
    }

    /// # Errors
    ///
    /// Returns `GuestStorageError` if the underlying store fails.
    pub async fn set_cart(&self, items: &[GuestCartItem]) -> Result<(), GuestStorageError> {
        self.write(guest_keys::CART, items).await
    }

    /// Current migration status; `Idle` if none was recorded.
    ///
    /// # Errors
    ///
    /// Returns `GuestStorageError` if the underlying store fails.
    pub async fn migration_status(&self) -> Result<MigrationStatus, GuestStorageError> {
        Ok(self.read(MIGRATION_STATUS_KEY).await?.unwrap_or_default())
    }

    /// # Errors
    ///
    /// Returns `GuestStorageError` if the underlying store fails.
    pub async fn set_migration_status(
        &self,
        status: &MigrationStatus,
    ) -> Result<(), GuestStorageError> {
        self.write(MIGRATION_STATUS_KEY, status).await
    }

    /// Remove one key.
    ///
    /// # Errors
    ///
    /// Returns `GuestStorageError` if the underlying store fails.
    pub async fn clear(&self, key: &str) -> Result<(), GuestStorageError> {
        self.local.remove(key).await
    }

    /// Remove every guest key, including the migration status.
    ///
    /// # Errors
    ///
    /// Returns `GuestStorageError` if the underlying store fails.
    pub async fn clear_all(&self) -> Result<(), GuestStorageError> {
        for key in guest_keys::ALL {
            self.local.remove(key).await?;
        }
        self.local.remove(MIGRATION_STATUS_KEY).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use toko_core::{MigrationReport, ProductId};

    use super::*;

    fn product(id: &str) -> LocalProduct {
        LocalProduct {
            id: ProductId::new(id),
            name: format!("Product {id}"),
            price: Decimal::from(50_000),
            image: None,
            viewed_at: None,
        }
    }

    #[tokio::test]
    async fn test_missing_keys_read_as_empty() {
        let guest = GuestStore::in_memory();
        assert!(guest.favorites().await.unwrap().is_empty());
        assert!(guest.cart().await.unwrap().is_empty());
        assert_eq!(guest.migration_status().await.unwrap(), MigrationStatus::Idle);
    }

    #[tokio::test]
    async fn test_malformed_json_reads_as_empty() {
        let local = Arc::new(MemoryLocalStore::new());
        local
            .set_raw(guest_keys::FAVORITES, "{not json".to_owned())
            .await
            .unwrap();
        let guest = GuestStore::new(local);

        assert!(guest.favorites().await.unwrap().is_empty());

        guest.set_favorites(&[product("P1")]).await.unwrap();
        assert_eq!(guest.favorites().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_favorites_use_camel_case_layout() {
        let local = Arc::new(MemoryLocalStore::new());
        let guest = GuestStore::new(local.clone());
        let mut item = product("P1");
        item.viewed_at = Some(Utc::now());
        guest.set_favorites(&[item]).await.unwrap();

        let raw = local.get_raw(guest_keys::FAVORITES).await.unwrap().unwrap();
        assert!(raw.contains("\"viewedAt\""));
        assert!(raw.contains("\"id\":\"P1\""));
    }

    #[tokio::test]
    async fn test_clear_all_removes_every_key() {
        let guest = GuestStore::in_memory();
        guest.set_favorites(&[product("P1")]).await.unwrap();
        guest.set_recently_viewed(&[product("P2")]).await.unwrap();
        guest
            .set_migration_status(&MigrationStatus::Done(MigrationReport::default()))
            .await
            .unwrap();

        guest.clear_all().await.unwrap();

        assert!(guest.favorites().await.unwrap().is_empty());
        assert!(guest.recently_viewed().await.unwrap().is_empty());
        assert_eq!(guest.migration_status().await.unwrap(), MigrationStatus::Idle);
    }

    #[tokio::test]
    async fn test_session_store_round_trips_under_prefix() {
        use tower_sessions::MemoryStore;

        let session = Session::new(None, Arc::new(MemoryStore::default()), None);
        let guest = GuestStore::from_session(session.clone());
        guest.set_favorites(&[product("P1")]).await.unwrap();

        assert!(
            session
                .get::<String>("guest.favorites")
                .await
                .unwrap()
                .is_some()
        );
        assert_eq!(guest.favorites().await.unwrap().len(), 1);
    }
}
