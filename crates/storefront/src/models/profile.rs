//! Shopper profile (domain type).

use chrono::{DateTime, Utc};
use serde::Serialize;

use toko_core::{Email, UserId};

/// A signed-in shopper.
///
/// Created on first sign-in and owns exactly one cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: UserId,
    pub email: Email,
    pub created_at: DateTime<Utc>,
}
