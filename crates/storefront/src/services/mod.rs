//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `cart` - Cart sync (remote rows for users, guest list for guests)
//! - `favorites` - Favorites sync and guest-to-remote favorites sync
//! - `recently_viewed` - Guest-side recently viewed list
//! - `migration` - One-shot guest migration on sign-in
//!
//! Every operation receives a [`Shopper`]: the identity it acts for plus the
//! guest store of the browser making the request. Services never look up an
//! ambient current user.

mod cache;
pub mod cart;
mod error;
pub mod favorites;
pub mod migration;
pub mod recently_viewed;

pub use cart::CartService;
pub use error::SyncError;
pub use favorites::FavoritesService;
pub use migration::GuestMigration;
pub use recently_viewed::RecentlyViewedService;

pub(crate) use error::log_failure;

use toko_core::Identity;

use crate::guest::GuestStore;

/// Request context handed to every service call.
#[derive(Clone)]
pub struct Shopper {
    pub identity: Identity,
    pub guest: GuestStore,
}

impl Shopper {
    #[must_use]
    pub const fn new(identity: Identity, guest: GuestStore) -> Self {
        Self { identity, guest }
    }
}

/// Largest quantity a cart line may hold; the column is a 32-bit `INTEGER`.
pub(crate) const MAX_QUANTITY: u32 = i32::MAX.unsigned_abs();

/// Guest records moved into the remote tables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Transfer {
    pub moved: usize,
    /// Entries dropped because their product is no longer in the catalog.
    pub skipped: usize,
}

/// Parse a client-supplied quantity into a positive count.
pub(crate) fn positive_quantity(quantity: i64) -> Result<u32, SyncError> {
    u32::try_from(quantity)
        .ok()
        .filter(|q| (1..=MAX_QUANTITY).contains(q))
        .ok_or(SyncError::InvalidQuantity(quantity))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positive_quantity_bounds() {
        assert_eq!(positive_quantity(1).ok(), Some(1));
        assert_eq!(positive_quantity(i64::from(i32::MAX)).ok(), Some(MAX_QUANTITY));
        for bad in [0, -3, i64::from(i32::MAX) + 1, i64::from(u32::MAX)] {
            assert!(matches!(
                positive_quantity(bad),
                Err(SyncError::InvalidQuantity(q)) if q == bad
            ));
        }
    }
}
