//! Guest-to-account migration.
//!
//! Runs once per sign-in: guest favorites are synced into the remote table
//! and the guest cart is merged into the user's cart. Progress is recorded as
//! a [`MigrationStatus`] in the shopper's guest store so the shopper can see
//! it and retry a failed run. The status is advisory: each request loads its
//! own copy of the session, so two truly concurrent requests may both start a
//! run. Favorite inserts skip existing pairs, but two overlapping cart merges
//! would both add the guest quantities.

use tracing::{info, instrument, warn};

use toko_core::{MigrationReport, MigrationStatus, UserId};

use super::{CartService, FavoritesService, SyncError};
use crate::guest::GuestStore;

/// Coordinates the favorites sync and the cart merge.
#[derive(Clone)]
pub struct GuestMigration {
    carts: CartService,
    favorites: FavoritesService,
}

impl GuestMigration {
    #[must_use]
    pub const fn new(carts: CartService, favorites: FavoritesService) -> Self {
        Self { carts, favorites }
    }

    /// Migrate the guest's data to `user`.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Transition` if a migration is already running and
    /// the first sync error otherwise; the status is then `Failed`.
    #[instrument(skip(self, guest))]
    pub async fn migrate(
        &self,
        user: UserId,
        guest: &GuestStore,
    ) -> Result<MigrationReport, SyncError> {
        let running = guest.migration_status().await?.begin()?;
        guest.set_migration_status(&running).await?;

        match self.run(user, guest).await {
            Ok(report) => {
                guest.set_migration_status(&running.finish(report)?).await?;
                info!(
                    favorites = report.favorites,
                    cart_items = report.cart_items,
                    skipped = report.skipped,
                    "Guest migration complete"
                );
                Ok(report)
            }
            Err(e) => {
                warn!(error = %e, "Guest migration failed");
                guest
                    .set_migration_status(&running.fail(e.shopper_reason())?)
                    .await?;
                Err(e)
            }
        }
    }

    async fn run(&self, user: UserId, guest: &GuestStore) -> Result<MigrationReport, SyncError> {
        let favorites = self.favorites.sync_local_to_remote(user, guest).await?;
        let cart = self.carts.merge_guest_cart(user, guest).await?;
        Ok(MigrationReport {
            favorites: favorites.moved,
            cart_items: cart.moved,
            skipped: favorites.skipped + cart.skipped,
        })
    }

    /// Current status for this shopper.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Guest` if the guest store fails.
    pub async fn status(&self, guest: &GuestStore) -> Result<MigrationStatus, SyncError> {
        Ok(guest.migration_status().await?)
    }

    /// Return to `Idle`, as on sign-out.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Guest` if the guest store fails.
    pub async fn reset(&self, guest: &GuestStore) -> Result<(), SyncError> {
        guest.set_migration_status(&MigrationStatus::Idle).await?;
        Ok(())
    }
}
