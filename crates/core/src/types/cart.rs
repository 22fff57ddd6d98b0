//! Cart types and derived totals.
//!
//! Totals are never stored: [`CartSnapshot::from_lines`] recomputes
//! `item_count` and `total_price` from the lines every time a cart is read.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::guest::GuestCartItem;
use super::id::{CartId, CartItemId, ProductId, UserId};

/// A row of the `carts` table. One per signed-in shopper, created lazily.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub id: CartId,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
}

/// A row of the `cart_items` table.
///
/// At most one row exists per `(cart_id, product_id)`; adding a product that
/// is already in the cart increments `quantity` instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub id: CartItemId,
    pub cart_id: CartId,
    pub product_id: ProductId,
    /// Always at least 1.
    pub quantity: u32,
    /// Product price captured when the line was first added.
    pub unit_price: Decimal,
    pub created_at: DateTime<Utc>,
}

/// A cart line as presented to shoppers, for both guest and remote carts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: ProductId,
    pub name: String,
    pub image_url: Option<String>,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub added_at: DateTime<Utc>,
}

impl CartLine {
    /// `unit_price × quantity`.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

impl From<&GuestCartItem> for CartLine {
    fn from(item: &GuestCartItem) -> Self {
        Self {
            product_id: item.product_id.clone(),
            name: item.name.clone(),
            image_url: item.image.clone(),
            quantity: item.quantity,
            unit_price: item.unit_price,
            added_at: item.added_at,
        }
    }
}

/// Read view of a cart with derived totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartSnapshot {
    pub cart_items: Vec<CartLine>,
    /// Sum of all line quantities.
    pub item_count: u32,
    /// Sum of `unit_price × quantity` over all lines.
    pub total_price: Decimal,
}

impl CartSnapshot {
    /// An empty cart.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            cart_items: Vec::new(),
            item_count: 0,
            total_price: Decimal::ZERO,
        }
    }

    /// Build a snapshot, deriving totals from the lines.
    #[must_use]
    pub fn from_lines(cart_items: Vec<CartLine>) -> Self {
        let item_count = cart_items
            .iter()
            .fold(0_u32, |acc, line| acc.saturating_add(line.quantity));
        let total_price = cart_items.iter().map(CartLine::line_total).sum();

        Self {
            cart_items,
            item_count,
            total_price,
        }
    }

    /// Find the line for a product, if any.
    #[must_use]
    pub fn line(&self, product_id: &ProductId) -> Option<&CartLine> {
        self.cart_items
            .iter()
            .find(|line| &line.product_id == product_id)
    }
}

impl Default for CartSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}
