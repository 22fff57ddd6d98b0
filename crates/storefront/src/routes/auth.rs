//! Authentication route handlers.
//!
//! Sign-in trusts the email it is given: credential checks happen upstream
//! of this service. What matters here is the identity switch and the guest
//! migration that follows it.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use toko_core::{Email, Identity, MigrationStatus};

use crate::db::ProfileStore;
use crate::error::{AppError, Result, clear_sentry_user, set_sentry_user};
use crate::middleware::{ShopperSession, clear_current_user, set_current_user};
use crate::models::CurrentUser;
use crate::state::AppState;

/// Sign-in request body.
#[derive(Debug, Deserialize)]
pub struct SignInRequest {
    pub email: String,
}

/// Identity and migration state of the current session.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub identity: Identity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<Email>,
    pub migration: MigrationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<&'static str>,
}

/// Sign in and move this browser's guest data into the account.
///
/// A failed migration does not fail the sign-in; it is reported in the
/// status and can be retried via `POST /api/favorites/sync`.
#[instrument(skip_all)]
pub async fn sign_in(
    State(state): State<AppState>,
    ShopperSession { shopper, session, .. }: ShopperSession,
    Json(body): Json<SignInRequest>,
) -> Result<Json<StatusResponse>> {
    let email = Email::parse(&body.email)
        .map_err(|e| AppError::BadRequest(format!("invalid email: {e}")))?;

    let profile = state.store().get_or_create_profile(&email).await?;
    let user = CurrentUser::from(&profile);
    set_current_user(&session, &user).await?;
    set_sentry_user(&user.id, Some(user.email.as_str()));
    info!(user_id = %user.id, "Signed in");

    if let Err(e) = state.migration().migrate(user.id, &shopper.guest).await {
        warn!(user_id = %user.id, error = %e, "Guest migration did not complete");
    }

    let migration = state.migration().status(&shopper.guest).await?;
    let notice = match migration {
        MigrationStatus::Failed { .. } => "Signed in, but your saved items could not be synced",
        _ => "Signed in",
    };

    Ok(Json(StatusResponse {
        identity: Identity::User(user.id),
        email: Some(user.email),
        migration,
        notice: Some(notice),
    }))
}

/// Sign out and clean up the session.
#[instrument(skip_all)]
pub async fn sign_out(
    State(state): State<AppState>,
    ShopperSession {
        shopper,
        user,
        session,
    }: ShopperSession,
) -> Result<Json<StatusResponse>> {
    if let Some(user) = &user {
        state.carts().invalidate(user.id).await;
        state.favorites().invalidate(user.id).await;
        info!(user_id = %user.id, "Signed out");
    }

    clear_current_user(&session).await?;
    state.migration().reset(&shopper.guest).await?;
    session.flush().await?;
    clear_sentry_user();

    Ok(Json(StatusResponse {
        identity: Identity::Guest,
        email: None,
        migration: MigrationStatus::Idle,
        notice: Some("Signed out"),
    }))
}

/// Current identity and migration status.
#[instrument(skip_all)]
pub async fn status(
    State(state): State<AppState>,
    ShopperSession { shopper, user, .. }: ShopperSession,
) -> Result<Json<StatusResponse>> {
    let migration = state.migration().status(&shopper.guest).await?;
    Ok(Json(StatusResponse {
        identity: shopper.identity,
        email: user.map(|u| u.email),
        migration,
        notice: None,
    }))
}
