use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};

use crate::{
    auth::{
        dto::{LoginRequest, RegisterRequest},
        password,
        repo::{RepoError, UserStore},
        repo_types::{NewUser, User},
    },
    error::AppError,
};

const MIN_PASSWORD_LEN: usize = 8;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Blank strings count as absent.
fn present(field: Option<String>) -> Option<String> {
    field.filter(|v| !v.trim().is_empty())
}

async fn hash_blocking(plain: String) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || password::hash_password(&plain))
        .await
        .map_err(|e| AppError::internal("Internal server error", e))?
        .map_err(|e| AppError::internal("Internal server error", e))
}

async fn verify_blocking(plain: String, hash: String) -> Result<bool, AppError> {
    tokio::task::spawn_blocking(move || password::verify_password(&plain, &hash))
        .await
        .map_err(|e| AppError::internal("Server error", e))?
        .map_err(|e| AppError::internal("Server error", e))
}

pub async fn register_user(store: &dyn UserStore, req: RegisterRequest) -> Result<User, AppError> {
    let (Some(full_name), Some(email), Some(nickname), Some(password)) = (
        present(req.full_name),
        present(req.email),
        present(req.nickname),
        present(req.password),
    ) else {
        return Err(AppError::MissingFields(
            "Full name, email, nickname, and password are required",
        ));
    };

    let email = normalize_email(&email);
    if !is_valid_email(&email) {
        warn!(email = %email, "invalid email");
        return Err(AppError::Validation("Invalid email".into()));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        warn!("password too short");
        return Err(AppError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    let password_hash = hash_blocking(password).await?;

    let user = store
        .create(NewUser {
            email,
            full_name: full_name.trim().to_string(),
            nickname: nickname.trim().to_string(),
            password_hash,
        })
        .await
        .map_err(|e| match e {
            RepoError::Duplicate => AppError::EmailTaken,
            other => AppError::internal("Internal server error", other),
        })?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok(user)
}

/// Checks credentials. Unknown email and wrong password yield the same error.
pub async fn authenticate(store: &dyn UserStore, req: LoginRequest) -> Result<User, AppError> {
    let (Some(email), Some(password)) = (present(req.email), present(req.password)) else {
        return Err(AppError::MissingFields("Email and password are required"));
    };
    let email = normalize_email(&email);

    let user = match store.find_by_email(&email).await {
        Ok(Some(u)) => u,
        Ok(None) => {
            warn!(email = %email, "login unknown email");
            return Err(AppError::InvalidCredentials);
        }
        Err(e) => return Err(AppError::internal("Server error", e)),
    };

    if !verify_blocking(password, user.password_hash.clone()).await? {
        warn!(email = %email, user_id = %user.id, "login invalid password");
        return Err(AppError::InvalidCredentials);
    }

    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::repo::MemoryUserStore;

    fn ann() -> RegisterRequest {
        RegisterRequest {
            full_name: Some("Ann Lee".into()),
            email: Some("ann@x.com".into()),
            nickname: Some("annl".into()),
            password: Some("pw123456".into()),
        }
    }

    #[test]
    fn email_validation() {
        assert!(is_valid_email("ann@x.com"));
        assert!(!is_valid_email("ann"));
        assert!(!is_valid_email("ann@x"));
        assert!(!is_valid_email("a nn@x.com"));
    }

    #[test]
    fn email_is_trimmed_and_lowercased() {
        assert_eq!(normalize_email("  Ann@X.com "), "ann@x.com");
    }

    #[tokio::test]
    async fn register_rejects_each_missing_field() {
        let store = MemoryUserStore::default();
        let variants = [
            RegisterRequest { full_name: None, ..ann() },
            RegisterRequest { email: None, ..ann() },
            RegisterRequest { nickname: Some("  ".into()), ..ann() },
            RegisterRequest { password: Some(String::new()), ..ann() },
        ];
        for req in variants {
            let err = register_user(&store, req).await.unwrap_err();
            assert!(matches!(err, AppError::MissingFields(_)));
        }
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn register_rejects_short_password() {
        let store = MemoryUserStore::default();
        let req = RegisterRequest { password: Some("short".into()), ..ann() };
        let err = register_user(&store, req).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn duplicate_registration_is_a_conflict() {
        let store = MemoryUserStore::default();
        register_user(&store, ann()).await.unwrap();
        let req = RegisterRequest { email: Some("ANN@x.com".into()), ..ann() };
        let err = register_user(&store, req).await.unwrap_err();
        assert!(matches!(err, AppError::EmailTaken));
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_email_look_the_same() {
        let store = MemoryUserStore::default();
        register_user(&store, ann()).await.unwrap();

        let wrong_pw = authenticate(
            &store,
            LoginRequest { email: Some("ann@x.com".into()), password: Some("nope-nope".into()) },
        )
        .await
        .unwrap_err();
        let unknown = authenticate(
            &store,
            LoginRequest { email: Some("bob@x.com".into()), password: Some("pw123456".into()) },
        )
        .await
        .unwrap_err();
        assert!(matches!(wrong_pw, AppError::InvalidCredentials));
        assert!(matches!(unknown, AppError::InvalidCredentials));
        assert_eq!(wrong_pw.to_string(), unknown.to_string());
    }

    #[tokio::test]
    async fn login_after_register_returns_user() {
        let store = MemoryUserStore::default();
        register_user(&store, ann()).await.unwrap();
        let user = authenticate(
            &store,
            LoginRequest { email: Some(" Ann@X.com".into()), password: Some("pw123456".into()) },
        )
        .await
        .unwrap();
        assert_eq!(user.full_name, "Ann Lee");
        assert_eq!(user.nickname, "annl");
    }
}
