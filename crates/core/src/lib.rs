//! Toko Core - Shared domain types.
//!
//! This crate provides the types used by the storefront sync service and
//! its tooling:
//! - `storefront` - Cart/favorites sync service (JSON API)
//! - `cli` - Migrations and catalog seeding
//!
//! # Architecture
//!
//! The core crate contains only types and pure logic - no I/O, no database
//! access, no HTTP clients. Cart totals, favorite key encoding, the guest
//! storage layout and the migration state machine all live here so they can
//! be tested without a runtime.
//!
//! # Modules
//!
//! - [`types`] - Ids, identity, cart, favorites, guest layout, migration status

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
