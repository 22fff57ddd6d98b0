//! Cart route handlers.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use toko_core::{CartSnapshot, ProductId};

use crate::error::{Result, add_breadcrumb};
use crate::middleware::ShopperSession;
use crate::state::AppState;

/// Cart snapshot plus an optional notice for the shopper.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartResponse {
    #[serde(flatten)]
    pub cart: CartSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<&'static str>,
}

impl CartResponse {
    const fn with_notice(cart: CartSnapshot, notice: &'static str) -> Self {
        Self {
            cart,
            notice: Some(notice),
        }
    }
}

/// Add to cart request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddItemRequest {
    pub product_id: ProductId,
    pub quantity: Option<i64>,
}

/// Update quantity request body.
#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    pub quantity: i64,
}

/// Current cart.
#[instrument(skip_all)]
pub async fn show(
    State(state): State<AppState>,
    ShopperSession { shopper, .. }: ShopperSession,
) -> Result<Json<CartResponse>> {
    let cart = state.carts().cart(&shopper).await?;
    Ok(Json(CartResponse { cart, notice: None }))
}

/// Add a product to the cart.
#[instrument(skip_all, fields(product_id = %body.product_id))]
pub async fn add(
    State(state): State<AppState>,
    ShopperSession { shopper, .. }: ShopperSession,
    Json(body): Json<AddItemRequest>,
) -> Result<Json<CartResponse>> {
    let quantity = body.quantity.unwrap_or(1);
    let cart = state
        .carts()
        .add_to_cart(&shopper, &body.product_id, quantity)
        .await?;

    add_breadcrumb(
        "cart",
        "Added to cart",
        &[
            ("product_id", body.product_id.as_str()),
            ("quantity", &quantity.to_string()),
        ],
    );
    Ok(Json(CartResponse::with_notice(cart, "Added to cart")))
}

/// Set a line's quantity.
#[instrument(skip_all, fields(product_id = %product_id))]
pub async fn update(
    State(state): State<AppState>,
    ShopperSession { shopper, .. }: ShopperSession,
    Path(product_id): Path<ProductId>,
    Json(body): Json<UpdateItemRequest>,
) -> Result<Json<CartResponse>> {
    let cart = state
        .carts()
        .update_quantity(&shopper, &product_id, body.quantity)
        .await?;

    let notice = if body.quantity < 1 {
        "Removed from cart"
    } else {
        "Cart updated"
    };
    Ok(Json(CartResponse::with_notice(cart, notice)))
}

/// Remove a line.
#[instrument(skip_all, fields(product_id = %product_id))]
pub async fn remove(
    State(state): State<AppState>,
    ShopperSession { shopper, .. }: ShopperSession,
    Path(product_id): Path<ProductId>,
) -> Result<Json<CartResponse>> {
    let cart = state.carts().remove_item(&shopper, &product_id).await?;
    Ok(Json(CartResponse::with_notice(cart, "Removed from cart")))
}

/// Empty the cart.
#[instrument(skip_all)]
pub async fn clear(
    State(state): State<AppState>,
    ShopperSession { shopper, .. }: ShopperSession,
) -> Result<Json<CartResponse>> {
    let cart = state.carts().clear_cart(&shopper).await?;
    Ok(Json(CartResponse::with_notice(cart, "Cart cleared")))
}
