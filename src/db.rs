use std::time::Duration;

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tower_sessions::session_store::ExpiredDeletion;
use tower_sessions_sqlx_store::PostgresStore;

use crate::config::AppConfig;

/// How often expired session rows are swept.
const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

pub async fn connect(config: &AppConfig) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .context("connect to database")
}

/// Applies the bundled schema migrations.
pub async fn migrate(db: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(db)
        .await
        .context("run migrations")?;
    tracing::info!("migrations applied");
    Ok(())
}

/// Postgres-backed session store on the shared pool, with a background task
/// deleting expired sessions.
pub async fn session_store(db: &PgPool) -> anyhow::Result<PostgresStore> {
    let store = PostgresStore::new(db.clone());
    store.migrate().await.context("create session table")?;

    let sweeper = store.clone();
    tokio::spawn(async move {
        if let Err(e) = sweeper
            .continuously_delete_expired(SESSION_SWEEP_INTERVAL)
            .await
        {
            tracing::error!(error = %e, "expired session sweep stopped");
        }
    });

    Ok(store)
}
