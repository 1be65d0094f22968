use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_sessions::Session;
use tracing::{info, instrument};

use crate::{
    auth::{
        dto::{LoginRequest, LoginResponse, RegisterRequest},
        extractors::{AuthUser, MaybeUser},
        services::{authenticate, register_user},
        session::{self, SessionUser},
    },
    error::{found, AppError, MessageResponse, LOGIN_PATH},
    state::AppState,
};

pub const HOME_PATH: &str = "/home";

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/me", get(me))
}

pub fn page_routes() -> Router<AppState> {
    Router::new()
        .route("/logout", post(logout))
        .route(HOME_PATH, get(home))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<MessageResponse>), AppError> {
    let Json(payload) = payload?;
    register_user(state.users.as_ref(), payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new("User registered successfully")),
    ))
}

#[instrument(skip(state, session, payload))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, AppError> {
    let Json(payload) = payload?;
    let user = authenticate(state.users.as_ref(), payload).await?;

    session::establish(&session, &SessionUser::from(&user))
        .await
        .map_err(|e| AppError::internal("Server error", e))?;

    Ok(Json(LoginResponse {
        message: "Login successful",
        redirect_to: HOME_PATH,
    }))
}

pub async fn me(AuthUser(user): AuthUser) -> Json<SessionUser> {
    Json(user)
}

#[instrument(skip(session))]
pub async fn logout(session: Session) -> Result<Response, AppError> {
    session::destroy(&session)
        .await
        .map_err(|e| AppError::internal("Failed to log out", e))?;
    info!("session destroyed");
    Ok(found(LOGIN_PATH))
}

pub async fn home(MaybeUser(user): MaybeUser) -> Response {
    match user {
        Some(user) => format!("Welcome, {}", user.full_name).into_response(),
        None => found(LOGIN_PATH),
    }
}
