//! Layout of the guest ephemeral store.
//!
//! Each key holds a single JSON array. The entry shapes are stable because
//! guest data can outlive a deploy.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::ProductId;
use super::product::{Product, ProductSummary};

/// Fixed keys in the guest ephemeral store.
pub mod guest_keys {
    /// Guest favorites: `[LocalProduct]`.
    pub const FAVORITES: &str = "favorites";

    /// Recently viewed products: `[LocalProduct]`, newest first.
    pub const RECENTLY_VIEWED: &str = "recentlyViewed";

    /// Guest cart: `[GuestCartItem]`.
    pub const CART: &str = "cart";

    /// Every guest key, for bulk cleanup.
    pub const ALL: [&str; 3] = [FAVORITES, RECENTLY_VIEWED, CART];
}

/// A product snapshot kept in the guest store (`{id, name, price, image?, viewedAt?}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalProduct {
    pub id: ProductId,
    pub name: String,
    pub price: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewed_at: Option<DateTime<Utc>>,
}

impl LocalProduct {
    /// Snapshot a catalog product.
    #[must_use]
    pub fn from_product(product: &Product) -> Self {
        Self {
            id: product.id.clone(),
            name: product.name.clone(),
            price: product.price,
            image: product.image_url.clone(),
            viewed_at: None,
        }
    }

    #[must_use]
    pub fn summary(&self) -> ProductSummary {
        ProductSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            price: self.price,
            image_url: self.image.clone(),
        }
    }
}

/// A guest cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestCartItem {
    pub product_id: ProductId,
    pub name: String,
    pub unit_price: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub quantity: u32,
    pub added_at: DateTime<Utc>,
}

impl GuestCartItem {
    /// A new guest line capturing the product's current price.
    #[must_use]
    pub fn new(product: &Product, quantity: u32, added_at: DateTime<Utc>) -> Self {
        Self {
            product_id: product.id.clone(),
            name: product.name.clone(),
            unit_price: product.price,
            image: product.image_url.clone(),
            quantity,
            added_at,
        }
    }
}

/// Move `product` to the front of a recently-viewed list.
///
/// Any earlier entry for the same product is dropped and the list is capped
/// at `limit` entries.
pub fn push_recently_viewed(
    list: &mut Vec<LocalProduct>,
    mut product: LocalProduct,
    viewed_at: DateTime<Utc>,
    limit: usize,
) {
    list.retain(|entry| entry.id != product.id);
    product.viewed_at = Some(viewed_at);
    list.insert(0, product);
    list.truncate(limit);
}
