//! Sync service error types.

use thiserror::Error;

use toko_core::{FavoriteKeyError, ProductId, TransitionError};

use crate::db::RepositoryError;
use crate::guest::GuestStorageError;

/// Errors that can occur in the cart, favorites and migration services.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Remote store failure.
    #[error("remote store error: {0}")]
    Repository(#[from] RepositoryError),

    /// Guest ephemeral store failure.
    #[error("guest storage error: {0}")]
    Guest(#[from] GuestStorageError),

    /// The product is already in the shopper's favorites.
    #[error("product {0} is already a favorite")]
    AlreadyFavorited(ProductId),

    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    /// The product has no line in the shopper's cart.
    #[error("product {0} is not in the cart")]
    ItemNotFound(ProductId),

    #[error("favorite not found")]
    FavoriteNotFound,

    #[error("quantity must be between 1 and {max}, got {0}", max = i32::MAX)]
    InvalidQuantity(i64),

    #[error("invalid favorite key: {0}")]
    InvalidFavoriteKey(#[from] FavoriteKeyError),

    /// A guest key was used by a signed-in shopper or vice versa.
    #[error("favorite key does not belong to this shopper")]
    KeyMismatch,

    #[error("sign in required")]
    SignInRequired,

    #[error(transparent)]
    Transition(#[from] TransitionError),
}

impl SyncError {
    /// Whether this is an outcome the shopper caused rather than a failure.
    ///
    /// Expected outcomes are logged at debug level and never reported to
    /// Sentry.
    #[must_use]
    pub const fn is_expected(&self) -> bool {
        !matches!(self, Self::Repository(_) | Self::Guest(_))
    }

    /// Short reason safe to show shoppers. Store and session errors carry
    /// driver text, which stays in the logs.
    #[must_use]
    pub const fn shopper_reason(&self) -> &'static str {
        match self {
            Self::Repository(_) => "remote store unavailable",
            Self::Guest(_) => "saved items could not be read",
            Self::ProductNotFound(_) | Self::ItemNotFound(_) => "product no longer available",
            Self::Transition(_) => "sync already in progress",
            _ => "saved items could not be synced",
        }
    }
}

/// Log a failed operation at a level matching its kind.
pub(crate) fn log_failure(operation: &'static str, err: &SyncError) {
    if err.is_expected() {
        tracing::debug!(operation, error = %err, "Sync operation rejected");
    } else {
        tracing::error!(operation, error = %err, "Sync operation failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_already_favorited_is_expected() {
        assert!(SyncError::AlreadyFavorited(ProductId::new("P1")).is_expected());
        assert!(SyncError::InvalidQuantity(0).is_expected());
        let offline = RepositoryError::Unavailable("offline".to_string());
        assert!(!SyncError::Repository(offline).is_expected());
    }

    #[test]
    fn test_shopper_reason_hides_driver_text() {
        let err = SyncError::Repository(RepositoryError::Conflict(
            "insert on table \"favorites\" violates foreign key constraint".to_string(),
        ));
        assert_eq!(err.shopper_reason(), "remote store unavailable");
        assert_eq!(
            SyncError::ProductNotFound(ProductId::new("P9")).shopper_reason(),
            "product no longer available"
        );
    }
}
