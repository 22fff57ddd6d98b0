//! Core types for Toko.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod cart;
pub mod email;
pub mod favorite;
pub mod guest;
pub mod id;
pub mod identity;
pub mod migration;
pub mod product;

pub use cart::{Cart, CartItem, CartLine, CartSnapshot};
pub use email::{Email, EmailError};
pub use favorite::{FavoriteEntry, FavoriteKey, FavoriteKeyError, FavoriteRecord, FavoriteView};
pub use guest::{GuestCartItem, LocalProduct, guest_keys, push_recently_viewed};
pub use id::*;
pub use identity::Identity;
pub use migration::{MigrationReport, MigrationStatus, TransitionError};
pub use product::{Product, ProductSummary};
