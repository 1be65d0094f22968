use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use tower_sessions::Session;

use super::session::{current_user, SessionUser};
use crate::error::AppError;

/// Logged-in user read from the session; rejects with 401 when absent.
pub struct AuthUser(pub SessionUser);

/// Logged-in user if there is one.
pub struct MaybeUser(pub Option<SessionUser>);

#[async_trait]
impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(|(_, msg)| AppError::internal("Internal server error", anyhow::anyhow!(msg)))?;
        Ok(MaybeUser(current_user(&session).await?))
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let MaybeUser(user) = MaybeUser::from_request_parts(parts, state).await?;
        user.map(AuthUser).ok_or(AppError::Unauthenticated)
    }
}
