use std::any::Any;

use axum::{
    extract::rejection::JsonRejection,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

/// Where failed OAuth flows and anonymous page visits are sent.
pub const LOGIN_PATH: &str = "/login";

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    MissingFields(&'static str),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    MalformedBody(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Not authenticated")]
    Unauthenticated,

    #[error("Email already registered")]
    EmailTaken,

    #[error("identity provider error: {0}")]
    Provider(String),

    #[error("Not found")]
    NotFound,

    /// Server-side failure with a fixed public message.
    #[error("{public}: {source}")]
    Internal {
        public: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("session store error: {0}")]
    Session(#[from] tower_sessions::session::Error),
}

impl AppError {
    pub fn internal(public: &'static str, source: impl Into<anyhow::Error>) -> Self {
        Self::Internal {
            public,
            source: source.into(),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::MalformedBody(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::MissingFields(msg) => (StatusCode::BAD_REQUEST, msg.to_string()),
            AppError::Validation(msg) | AppError::MalformedBody(msg) => {
                (StatusCode::BAD_REQUEST, msg)
            }
            AppError::InvalidCredentials | AppError::Unauthenticated => {
                (StatusCode::UNAUTHORIZED, self.to_string())
            }
            AppError::EmailTaken => (StatusCode::CONFLICT, self.to_string()),
            AppError::NotFound => (StatusCode::NOT_FOUND, self.to_string()),
            AppError::Provider(reason) => {
                warn!(%reason, "oauth flow failed");
                return found(LOGIN_PATH);
            }
            AppError::Internal { public, source } => {
                error!(error = ?source, "{public}");
                (StatusCode::INTERNAL_SERVER_ERROR, public.to_string())
            }
            AppError::Session(_) => {
                error!(error = %self, "unhandled error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(MessageResponse { message })).into_response()
    }
}

/// 302 Found to `location`.
pub fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

/// Last-resort handler for panics escaping a request handler.
pub fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "Internal server error".to_string()
    };
    error!(%message, "handler panicked");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(MessageResponse { message }),
    )
        .into_response()
}

pub async fn not_found() -> AppError {
    AppError::NotFound
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_redirects_to_login() {
        let res = AppError::Provider("access_denied".into()).into_response();
        assert_eq!(res.status(), StatusCode::FOUND);
        assert_eq!(res.headers()[header::LOCATION], LOGIN_PATH);
    }

    #[test]
    fn status_codes_follow_error_kind() {
        let cases = [
            (AppError::MissingFields("x"), StatusCode::BAD_REQUEST),
            (AppError::InvalidCredentials, StatusCode::UNAUTHORIZED),
            (AppError::Unauthenticated, StatusCode::UNAUTHORIZED),
            (AppError::EmailTaken, StatusCode::CONFLICT),
            (AppError::NotFound, StatusCode::NOT_FOUND),
            (
                AppError::internal("Server error", anyhow::anyhow!("db down")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }

    async fn body_json(res: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn panic_message_is_surfaced() {
        let res = handle_panic(Box::new("boom"));
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(res).await, serde_json::json!({ "message": "boom" }));

        let res = handle_panic(Box::new(String::from("owned boom")));
        assert_eq!(body_json(res).await["message"], "owned boom");

        let res = handle_panic(Box::new(7_u8));
        assert_eq!(body_json(res).await["message"], "Internal server error");
    }

    #[tokio::test]
    async fn internal_error_hides_source() {
        let res = AppError::internal("Server error", anyhow::anyhow!("db down")).into_response();
        assert_eq!(body_json(res).await, serde_json::json!({ "message": "Server error" }));
    }
}
