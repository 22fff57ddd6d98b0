//! Shopper extractors.
//!
//! Resolve the request's identity from the session and hand handlers an
//! explicit [`Shopper`] context. The session itself backs the guest store.

use axum::{extract::FromRequestParts, http::request::Parts};
use tower_sessions::Session;

use toko_core::Identity;

use crate::error::AppError;
use crate::guest::GuestStore;
use crate::models::{CurrentUser, session_keys};
use crate::services::{Shopper, SyncError};

/// The shopper making the request, signed in or not.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(ShopperSession { shopper, .. }: ShopperSession) -> impl IntoResponse {
///     format!("Hello, {}!", shopper.identity)
/// }
/// ```
pub struct ShopperSession {
    pub shopper: Shopper,
    pub user: Option<CurrentUser>,
    pub session: Session,
}

impl<S> FromRequestParts<S> for ShopperSession
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Get the session from extensions (set by SessionManagerLayer)
        let session = parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or_else(|| AppError::Internal("session layer missing".to_string()))?;

        let user: Option<CurrentUser> = session.get(session_keys::CURRENT_USER).await?;
        let identity = Identity::from(user.as_ref().map(|u| u.id));

        Ok(Self {
            shopper: Shopper::new(identity, GuestStore::from_session(session.clone())),
            user,
            session,
        })
    }
}

/// Extractor that requires a signed-in shopper.
///
/// Rejects with 401 when the session has no current user.
pub struct RequireUser {
    pub user: CurrentUser,
    pub guest: GuestStore,
}

impl<S> FromRequestParts<S> for RequireUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let ShopperSession { shopper, user, .. } =
            ShopperSession::from_request_parts(parts, state).await?;
        let user = user.ok_or(SyncError::SignInRequired)?;

        Ok(Self {
            user,
            guest: shopper.guest,
        })
    }
}

/// Store the signed-in user in the session.
///
/// The session ID is cycled to prevent fixation.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_user(
    session: &Session,
    user: &CurrentUser,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session.insert(session_keys::CURRENT_USER, user).await
}

/// Remove the signed-in user from the session.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_current_user(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session
        .remove::<CurrentUser>(session_keys::CURRENT_USER)
        .await?;
    Ok(())
}
