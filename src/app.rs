use std::net::SocketAddr;

use anyhow::Context;
use axum::{
    http::{header, HeaderValue, Method},
    routing::get,
    Router,
};
use sha2::{Digest, Sha512};
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer, trace::TraceLayer};
use tower_sessions::{
    cookie::{Key, SameSite},
    service::SignedCookie,
    Expiry, SessionManagerLayer, SessionStore,
};

use crate::config::{AppConfig, SessionConfig};
use crate::error::{handle_panic, not_found};
use crate::state::AppState;
use crate::{auth, oauth};

pub const SESSION_COOKIE: &str = "sid";

fn session_layer<S>(store: S, cfg: &SessionConfig) -> SessionManagerLayer<S, SignedCookie>
where
    S: SessionStore + Clone,
{
    // cookie signing needs a 64-byte key
    let key = Key::from(Sha512::digest(cfg.secret.as_bytes()).as_slice());
    SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE)
        .with_secure(cfg.cookie_secure)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::minutes(cfg.ttl_minutes)))
        .with_signed(key)
}

fn cors_layer(cfg: &AppConfig) -> anyhow::Result<CorsLayer> {
    let origin: HeaderValue = cfg
        .frontend_url
        .parse()
        .context("FRONTEND_URL is not a valid origin")?;
    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true))
}

pub fn build_app<S>(state: AppState, sessions: S) -> anyhow::Result<Router>
where
    S: SessionStore + Clone,
{
    let config = state.config.clone();
    let app = Router::new()
        .merge(auth::router())
        .merge(oauth::router())
        .route("/health", get(|| async { "ok" }))
        .fallback(not_found)
        .with_state(state)
        .layer(session_layer(sessions, &config.session))
        .layer(cors_layer(&config)?)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        if status.is_server_error() {
                            tracing::error!(%status, ?latency, "response");
                        } else {
                            tracing::info!(%status, ?latency, "response");
                        }
                    },
                ),
        )
        .layer(CatchPanicLayer::custom(handle_panic));
    Ok(app)
}

pub async fn serve(app: Router, config: &AppConfig) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
