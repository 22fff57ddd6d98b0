//! Domain models for the storefront.
//!
//! Shared cart, favorite and product types live in `toko-core`; this module
//! holds the types that only make sense inside the service (profiles and
//! session-stored identity).

mod profile;
mod session;

pub use profile::Profile;
pub use session::{CurrentUser, keys as session_keys};
