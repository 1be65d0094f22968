use std::{collections::HashMap, fmt, str::FromStr, sync::Arc};

use anyhow::Context;
use async_trait::async_trait;
use oauth2::{
    basic::BasicClient, reqwest::async_http_client, url::Url, AuthType, AuthUrl,
    AuthorizationCode, ClientId, ClientSecret, CsrfToken, RedirectUrl, Scope, TokenResponse,
    TokenUrl,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    auth::session::SessionUser,
    config::{AppConfig, OAuthClientConfig},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Google,
    Kakao,
}

impl ProviderKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ProviderKind::Google => "google",
            ProviderKind::Kakao => "kakao",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "google" => Ok(ProviderKind::Google),
            "kakao" => Ok(ProviderKind::Kakao),
            other => anyhow::bail!("unknown identity provider: {other}"),
        }
    }
}

/// Claims returned by a provider after a successful authorization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthProfile {
    pub provider: ProviderKind,
    pub subject: String,
    pub name: Option<String>,
    pub nickname: Option<String>,
    pub email: Option<String>,
}

impl OAuthProfile {
    /// Folds the profile into the same session shape a local login produces.
    pub fn into_session_user(self) -> SessionUser {
        let full_name = self
            .name
            .clone()
            .or_else(|| self.nickname.clone())
            .unwrap_or_else(|| self.subject.clone());
        let nickname = self.nickname.unwrap_or_else(|| full_name.clone());
        SessionUser {
            email: self.email,
            full_name,
            nickname,
            provider: Some(self.provider),
        }
    }
}

/// Third-party identity provider driving the authorization-code flow.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// URL to send the user agent to, and the CSRF state embedded in it.
    fn authorize_url(&self) -> (Url, CsrfToken);

    /// Exchanges the callback code for a token and fetches the profile.
    async fn fetch_profile(&self, code: String) -> anyhow::Result<OAuthProfile>;
}

/// oauth2-backed provider with a fixed set of endpoints.
pub struct OAuth2Provider {
    kind: ProviderKind,
    client: BasicClient,
    scopes: Vec<Scope>,
    userinfo_url: &'static str,
    http: reqwest::Client,
}

struct Endpoints {
    auth_url: &'static str,
    token_url: &'static str,
    userinfo_url: &'static str,
    scopes: &'static [&'static str],
}

const GOOGLE: Endpoints = Endpoints {
    auth_url: "https://accounts.google.com/o/oauth2/v2/auth",
    token_url: "https://oauth2.googleapis.com/token",
    userinfo_url: "https://openidconnect.googleapis.com/v1/userinfo",
    scopes: &["profile", "email"],
};

const KAKAO: Endpoints = Endpoints {
    auth_url: "https://kauth.kakao.com/oauth/authorize",
    token_url: "https://kauth.kakao.com/oauth/token",
    userinfo_url: "https://kapi.kakao.com/v2/user/me",
    scopes: &[],
};

impl OAuth2Provider {
    pub fn new(
        kind: ProviderKind,
        config: &OAuthClientConfig,
        redirect_url: String,
    ) -> anyhow::Result<Self> {
        let endpoints = match kind {
            ProviderKind::Google => &GOOGLE,
            ProviderKind::Kakao => &KAKAO,
        };
        let client = BasicClient::new(
            ClientId::new(config.client_id.clone()),
            config.client_secret.clone().map(ClientSecret::new),
            AuthUrl::new(endpoints.auth_url.to_string()).context("auth url")?,
            Some(TokenUrl::new(endpoints.token_url.to_string()).context("token url")?),
        )
        .set_auth_type(AuthType::RequestBody)
        .set_redirect_uri(RedirectUrl::new(redirect_url).context("redirect url")?);

        Ok(Self {
            kind,
            client,
            scopes: endpoints
                .scopes
                .iter()
                .map(|s| Scope::new((*s).to_string()))
                .collect(),
            userinfo_url: endpoints.userinfo_url,
            http: reqwest::Client::new(),
        })
    }
}

#[async_trait]
impl IdentityProvider for OAuth2Provider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn authorize_url(&self) -> (Url, CsrfToken) {
        self.client
            .authorize_url(CsrfToken::new_random)
            .add_scopes(self.scopes.iter().cloned())
            .url()
    }

    async fn fetch_profile(&self, code: String) -> anyhow::Result<OAuthProfile> {
        let token = self
            .client
            .exchange_code(AuthorizationCode::new(code))
            .request_async(async_http_client)
            .await
            .map_err(|e| anyhow::anyhow!("{} token exchange failed: {}", self.kind, e))?;

        let body: serde_json::Value = self
            .http
            .get(self.userinfo_url)
            .bearer_auth(token.access_token().secret())
            .send()
            .await
            .with_context(|| format!("{} userinfo request", self.kind))?
            .error_for_status()
            .with_context(|| format!("{} userinfo status", self.kind))?
            .json()
            .await
            .with_context(|| format!("{} userinfo body", self.kind))?;
        debug!(provider = %self.kind, "userinfo received");

        parse_profile(self.kind, body)
    }
}

#[derive(Deserialize)]
struct GoogleUserInfo {
    sub: String,
    name: Option<String>,
    given_name: Option<String>,
    email: Option<String>,
}

#[derive(Deserialize)]
struct KakaoUserInfo {
    id: i64,
    properties: Option<KakaoProperties>,
    kakao_account: Option<KakaoAccount>,
}

#[derive(Deserialize)]
struct KakaoProperties {
    nickname: Option<String>,
}

#[derive(Deserialize)]
struct KakaoAccount {
    email: Option<String>,
    profile: Option<KakaoProperties>,
}

pub(crate) fn parse_profile(
    kind: ProviderKind,
    body: serde_json::Value,
) -> anyhow::Result<OAuthProfile> {
    match kind {
        ProviderKind::Google => {
            let info: GoogleUserInfo =
                serde_json::from_value(body).context("decode google userinfo")?;
            Ok(OAuthProfile {
                provider: kind,
                subject: info.sub,
                name: info.name,
                nickname: info.given_name,
                email: info.email,
            })
        }
        ProviderKind::Kakao => {
            let info: KakaoUserInfo =
                serde_json::from_value(body).context("decode kakao userinfo")?;
            let (email, profile_nickname) = match info.kakao_account {
                Some(account) => (account.email, account.profile.and_then(|p| p.nickname)),
                None => (None, None),
            };
            let nickname = profile_nickname.or(info.properties.and_then(|p| p.nickname));
            Ok(OAuthProfile {
                provider: kind,
                subject: info.id.to_string(),
                name: nickname.clone(),
                nickname,
                email,
            })
        }
    }
}

/// Enabled providers, keyed by kind.
#[derive(Clone, Default)]
pub struct IdentityProviders {
    providers: HashMap<ProviderKind, Arc<dyn IdentityProvider>>,
}

impl IdentityProviders {
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let mut providers = Self::default();
        for (kind, client) in [
            (ProviderKind::Google, &config.google),
            (ProviderKind::Kakao, &config.kakao),
        ] {
            match client {
                Some(client) => {
                    let redirect = config.callback_url(kind.as_str());
                    providers = providers.with(Arc::new(OAuth2Provider::new(kind, client, redirect)?));
                    info!(provider = %kind, "identity provider enabled");
                }
                None => info!(provider = %kind, "identity provider not configured"),
            }
        }
        Ok(providers)
    }

    pub fn with(mut self, provider: Arc<dyn IdentityProvider>) -> Self {
        self.providers.insert(provider.kind(), provider);
        self
    }

    pub fn get(&self, kind: ProviderKind) -> Option<Arc<dyn IdentityProvider>> {
        self.providers.get(&kind).cloned()
    }
}
