//! Recently viewed route handlers.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use toko_core::{LocalProduct, ProductId};

use crate::error::Result;
use crate::middleware::ShopperSession;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentlyViewedResponse {
    pub recently_viewed: Vec<LocalProduct>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordViewRequest {
    pub product_id: ProductId,
}

/// Recently viewed products, newest first.
#[instrument(skip_all)]
pub async fn index(
    State(state): State<AppState>,
    ShopperSession { shopper, .. }: ShopperSession,
) -> Result<Json<RecentlyViewedResponse>> {
    let recently_viewed = state.recently_viewed().recently_viewed(&shopper.guest).await?;
    Ok(Json(RecentlyViewedResponse { recently_viewed }))
}

/// Record a product view.
#[instrument(skip_all, fields(product_id = %body.product_id))]
pub async fn record(
    State(state): State<AppState>,
    ShopperSession { shopper, .. }: ShopperSession,
    Json(body): Json<RecordViewRequest>,
) -> Result<Json<RecentlyViewedResponse>> {
    let recently_viewed = state
        .recently_viewed()
        .record_view(&shopper.guest, &body.product_id)
        .await?;
    Ok(Json(RecentlyViewedResponse { recently_viewed }))
}
