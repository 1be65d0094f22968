use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    response::Response,
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::{info, instrument};

use super::providers::{IdentityProvider, ProviderKind};
use crate::{
    auth::{handlers::HOME_PATH, session},
    error::{found, AppError},
    state::AppState,
};

const PENDING_KEY: &str = "oauth.pending";

/// Flow started by this session, checked on callback.
#[derive(Debug, Serialize, Deserialize)]
struct PendingOAuth {
    provider: ProviderKind,
    csrf: String,
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

pub fn oauth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/:provider", get(start))
        .route("/auth/:provider/callback", get(callback))
}

fn resolve(state: &AppState, name: &str) -> Result<Arc<dyn IdentityProvider>, AppError> {
    let kind: ProviderKind = name.parse().map_err(|_| AppError::NotFound)?;
    state
        .providers
        .get(kind)
        .ok_or_else(|| AppError::Provider(format!("{kind} is not configured")))
}

#[instrument(skip(state, session))]
pub async fn start(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    session: Session,
) -> Result<Response, AppError> {
    let provider = resolve(&state, &provider)?;
    let (url, csrf) = provider.authorize_url();
    session
        .insert(
            PENDING_KEY,
            PendingOAuth {
                provider: provider.kind(),
                csrf: csrf.secret().clone(),
            },
        )
        .await?;
    Ok(found(url.as_str()))
}

#[instrument(skip(state, session, query))]
pub async fn callback(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    session: Session,
    Query(query): Query<CallbackQuery>,
) -> Result<Response, AppError> {
    let provider = resolve(&state, &provider)?;
    let kind = provider.kind();

    // single use, whatever the outcome
    let pending: Option<PendingOAuth> = session.remove(PENDING_KEY).await?;

    if let Some(error) = query.error {
        let description = query.error_description.unwrap_or_default();
        return Err(AppError::Provider(format!("{kind} denied: {error} {description}")));
    }

    let state_matches = matches!(
        (&pending, &query.state),
        (Some(p), Some(s)) if p.provider == kind && &p.csrf == s
    );
    if !state_matches {
        return Err(AppError::Provider(format!("{kind} state mismatch")));
    }

    let code = query
        .code
        .ok_or_else(|| AppError::Provider(format!("{kind} callback without code")))?;

    let profile = provider
        .fetch_profile(code)
        .await
        .map_err(|e| AppError::Provider(format!("{e:#}")))?;
    let user = profile.into_session_user();

    session::establish(&session, &user).await?;
    info!(provider = %kind, full_name = %user.full_name, "oauth login");
    Ok(found(HOME_PATH))
}
