//! Favorites route handlers.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use toko_core::{FavoriteView, MigrationStatus, ProductId};

use crate::error::{AppError, Result};
use crate::middleware::{RequireUser, ShopperSession};
use crate::services::{Shopper, SyncError};
use crate::state::AppState;

/// Favorites list plus count and an optional notice.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoritesResponse {
    pub favorites: Vec<FavoriteView>,
    pub favorite_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<&'static str>,
}

/// Favorite state of one product.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteStatusResponse {
    pub is_favorite: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<&'static str>,
}

/// Result of a migration retry.
#[derive(Debug, Serialize)]
pub struct SyncResponse {
    pub migration: MigrationStatus,
    pub notice: &'static str,
}

/// Request body naming a product.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRequest {
    pub product_id: ProductId,
}

async fn list(
    state: &AppState,
    shopper: &Shopper,
    notice: Option<&'static str>,
) -> Result<Json<FavoritesResponse>> {
    let favorites = state.favorites().favorites(shopper).await?;
    Ok(Json(FavoritesResponse {
        favorite_count: favorites.len(),
        favorites,
        notice,
    }))
}

/// Current favorites.
#[instrument(skip_all)]
pub async fn index(
    State(state): State<AppState>,
    ShopperSession { shopper, .. }: ShopperSession,
) -> Result<Json<FavoritesResponse>> {
    list(&state, &shopper, None).await
}

/// Favorite a product. Answers 409 if it already is one.
#[instrument(skip_all, fields(product_id = %body.product_id))]
pub async fn add(
    State(state): State<AppState>,
    ShopperSession { shopper, .. }: ShopperSession,
    Json(body): Json<ProductRequest>,
) -> Result<Json<FavoritesResponse>> {
    state
        .favorites()
        .add_favorite(&shopper, &body.product_id)
        .await?;
    list(&state, &shopper, Some("Added to favorites")).await
}

/// Flip a product's favorite state.
#[instrument(skip_all, fields(product_id = %body.product_id))]
pub async fn toggle(
    State(state): State<AppState>,
    ShopperSession { shopper, .. }: ShopperSession,
    Json(body): Json<ProductRequest>,
) -> Result<Json<FavoriteStatusResponse>> {
    let is_favorite = state
        .favorites()
        .toggle_favorite(&shopper, &body.product_id)
        .await?;

    let notice = if is_favorite {
        "Added to favorites"
    } else {
        "Removed from favorites"
    };
    Ok(Json(FavoriteStatusResponse {
        is_favorite,
        notice: Some(notice),
    }))
}

/// Whether a product is a favorite.
#[instrument(skip_all, fields(product_id = %product_id))]
pub async fn status(
    State(state): State<AppState>,
    ShopperSession { shopper, .. }: ShopperSession,
    Path(product_id): Path<ProductId>,
) -> Result<Json<FavoriteStatusResponse>> {
    let is_favorite = state.favorites().is_favorite(&shopper, &product_id).await?;
    Ok(Json(FavoriteStatusResponse {
        is_favorite,
        notice: None,
    }))
}

/// Remove a favorite by the key it was listed with.
#[instrument(skip_all, fields(key = %key))]
pub async fn remove(
    State(state): State<AppState>,
    ShopperSession { shopper, .. }: ShopperSession,
    Path(key): Path<String>,
) -> Result<Json<FavoritesResponse>> {
    state.favorites().remove_favorite(&shopper, &key).await?;
    list(&state, &shopper, Some("Removed from favorites")).await
}

/// Remove every favorite.
#[instrument(skip_all)]
pub async fn clear(
    State(state): State<AppState>,
    ShopperSession { shopper, .. }: ShopperSession,
) -> Result<Json<FavoritesResponse>> {
    state.favorites().clear_favorites(&shopper).await?;
    list(&state, &shopper, Some("Favorites cleared")).await
}

/// Retry moving this browser's guest data into the signed-in account.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn sync(
    State(state): State<AppState>,
    RequireUser { user, guest }: RequireUser,
) -> Result<Json<SyncResponse>> {
    // Store failures and runs already in flight are reported via the status.
    match state.migration().migrate(user.id, &guest).await {
        Ok(_) | Err(SyncError::Repository(_) | SyncError::Transition(_)) => {}
        Err(e) => return Err(AppError::from(e)),
    }

    let migration = state.migration().status(&guest).await?;
    let notice = match migration {
        MigrationStatus::Done(_) => "Your favorites are synced",
        MigrationStatus::Failed { .. } => "Sync failed, please try again",
        MigrationStatus::Idle | MigrationStatus::Migrating => "Sync in progress",
    };
    Ok(Json(SyncResponse { migration, notice }))
}
