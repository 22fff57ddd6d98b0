//! Favorites: remote rows, guest entries, and the keys that address them.
//!
//! Guest favorites have no row id, so they are addressed by a synthetic key
//! `local_{productId}_{index}`. Remote favorites are addressed by their row
//! UUID. [`FavoriteEntry`] keeps the two sources apart until
//! [`FavoriteEntry::into_view`] normalizes them into one presentation shape.

use core::fmt;
use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::guest::LocalProduct;
use super::id::{FavoriteId, ProductId, UserId};
use super::product::ProductSummary;

const LOCAL_KEY_PREFIX: &str = "local_";

/// Errors from parsing a [`FavoriteKey`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FavoriteKeyError {
    #[error("favorite key is empty")]
    Empty,
    #[error("malformed local favorite key: {0}")]
    MalformedLocal(String),
    #[error("favorite key is neither a local key nor a UUID: {0}")]
    Unrecognized(String),
}

/// Address of a single favorite.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum FavoriteKey {
    /// A row in the remote `favorites` table.
    Remote(FavoriteId),
    /// The `index`-th entry of the guest favorites list.
    Local { product_id: ProductId, index: usize },
}

impl fmt::Display for FavoriteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remote(id) => write!(f, "{id}"),
            Self::Local { product_id, index } => {
                write!(f, "{LOCAL_KEY_PREFIX}{product_id}_{index}")
            }
        }
    }
}

impl FromStr for FavoriteKey {
    type Err = FavoriteKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(FavoriteKeyError::Empty);
        }

        if let Some(rest) = s.strip_prefix(LOCAL_KEY_PREFIX) {
            // Product codes may contain underscores; the index is after the last one.
            let (product, index) = rest
                .rsplit_once('_')
                .ok_or_else(|| FavoriteKeyError::MalformedLocal(s.to_owned()))?;
            let index = index
                .parse::<usize>()
                .map_err(|_| FavoriteKeyError::MalformedLocal(s.to_owned()))?;
            if product.is_empty() {
                return Err(FavoriteKeyError::MalformedLocal(s.to_owned()));
            }
            return Ok(Self::Local {
                product_id: ProductId::new(product),
                index,
            });
        }

        s.parse::<FavoriteId>()
            .map(Self::Remote)
            .map_err(|_| FavoriteKeyError::Unrecognized(s.to_owned()))
    }
}

impl From<FavoriteKey> for String {
    fn from(key: FavoriteKey) -> Self {
        key.to_string()
    }
}

impl TryFrom<String> for FavoriteKey {
    type Error = FavoriteKeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A remote favorite joined with its product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteRecord {
    pub id: FavoriteId,
    pub user_id: UserId,
    pub product: ProductSummary,
    pub created_at: DateTime<Utc>,
}

/// A favorite from either source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FavoriteEntry {
    /// Entry `index` of the guest list.
    Guest { item: LocalProduct, index: usize },
    /// Row from the remote table.
    Remote(FavoriteRecord),
}

impl FavoriteEntry {
    /// Wrap a guest list, assigning each entry its position.
    #[must_use]
    pub fn from_guest_list(items: Vec<LocalProduct>) -> Vec<Self> {
        items
            .into_iter()
            .enumerate()
            .map(|(index, item)| Self::Guest { item, index })
            .collect()
    }

    #[must_use]
    pub const fn product_id(&self) -> &ProductId {
        match self {
            Self::Guest { item, .. } => &item.id,
            Self::Remote(record) => &record.product.id,
        }
    }

    /// Normalize into the shape served to shoppers.
    #[must_use]
    pub fn into_view(self) -> FavoriteView {
        match self {
            Self::Guest { item, index } => FavoriteView {
                id: FavoriteKey::Local {
                    product_id: item.id.clone(),
                    index,
                },
                product_id: item.id.clone(),
                product: item.summary(),
                created_at: None,
            },
            Self::Remote(record) => FavoriteView {
                id: FavoriteKey::Remote(record.id),
                product_id: record.product.id.clone(),
                product: record.product,
                created_at: Some(record.created_at),
            },
        }
    }
}

/// A favorite as presented to shoppers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteView {
    pub id: FavoriteKey,
    pub product_id: ProductId,
    pub product: ProductSummary,
    /// Guest favorites carry no timestamp.
    pub created_at: Option<DateTime<Utc>>,
}
