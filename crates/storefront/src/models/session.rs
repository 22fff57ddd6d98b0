//! Session-related types.
//!
//! Types stored in the session for authentication state.

use serde::{Deserialize, Serialize};

use toko_core::{Email, UserId};

use super::Profile;

/// Session-stored user identity.
///
/// Minimal data stored in the session to identify the signed-in shopper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentUser {
    /// Profile ID.
    pub id: UserId,
    /// Normalized email address.
    pub email: Email,
}

impl From<&Profile> for CurrentUser {
    fn from(profile: &Profile) -> Self {
        Self {
            id: profile.id,
            email: profile.email.clone(),
        }
    }
}

/// Session keys for authentication data.
///
/// Guest data lives under its own prefix, see `crate::guest`.
pub mod keys {
    /// Key for storing the current signed-in user.
    pub const CURRENT_USER: &str = "current_user";
}
