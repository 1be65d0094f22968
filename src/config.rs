use anyhow::Context;
use serde::Deserialize;

/// Client credentials for one OAuth identity provider.
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthClientConfig {
    pub client_id: String,
    pub client_secret: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub secret: String,
    pub ttl_minutes: i64,
    pub cookie_secure: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    /// Allowed CORS origin.
    pub frontend_url: String,
    /// Public URL of this service, used to build OAuth callback URLs.
    pub base_url: String,
    pub session: SessionConfig,
    pub google: Option<OAuthClientConfig>,
    pub kakao: Option<OAuthClientConfig>,
}

const MIN_SESSION_SECRET_LEN: usize = 32;

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
        let host = std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port = std::env::var("PORT")
            .ok()
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(3000);

        let secret = std::env::var("SESSION_SECRET").context("SESSION_SECRET is not set")?;
        anyhow::ensure!(
            secret.len() >= MIN_SESSION_SECRET_LEN,
            "SESSION_SECRET must be at least {MIN_SESSION_SECRET_LEN} bytes"
        );
        let session = SessionConfig {
            secret,
            ttl_minutes: std::env::var("SESSION_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60 * 24),
            cookie_secure: std::env::var("COOKIE_SECURE")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
        };

        Ok(Self {
            database_url,
            host,
            port,
            frontend_url: std::env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:3000".into()),
            base_url: std::env::var("BASE_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| format!("http://localhost:{port}")),
            session,
            google: oauth_client_from_env("GOOGLE"),
            kakao: oauth_client_from_env("KAKAO"),
        })
    }

    pub fn callback_url(&self, provider: &str) -> String {
        format!("{}/auth/{}/callback", self.base_url, provider)
    }
}

/// A provider is enabled only when its client id is present.
fn oauth_client_from_env(prefix: &str) -> Option<OAuthClientConfig> {
    let client_id = std::env::var(format!("{prefix}_CLIENT_ID"))
        .ok()
        .filter(|v| !v.is_empty())?;
    let client_secret = std::env::var(format!("{prefix}_CLIENT_SECRET"))
        .ok()
        .filter(|v| !v.is_empty());
    Some(OAuthClientConfig {
        client_id,
        client_secret,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn callback_url_joins_base_and_provider() {
        let cfg = AppConfig {
            database_url: "postgres://localhost/test".into(),
            host: "127.0.0.1".into(),
            port: 3000,
            frontend_url: "http://localhost:5173".into(),
            base_url: "https://auth.example.com".into(),
            session: SessionConfig {
                secret: "x".repeat(32),
                ttl_minutes: 60,
                cookie_secure: false,
            },
            google: None,
            kakao: None,
        };
        assert_eq!(
            cfg.callback_url("kakao"),
            "https://auth.example.com/auth/kakao/callback"
        );
    }
}
