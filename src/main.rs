use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use bedledger::config::{AppConfig, DEFAULT_JWT_SECRET};
use bedledger::db::Database;
use bedledger::routes;
use bedledger::services::credentials;
use bedledger::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();
    if config.jwt_secret == DEFAULT_JWT_SECRET {
        tracing::warn!("JWT_SECRET not set, using the built-in default secret");
    }

    let db = Database::open(
        &config.database_url,
        Duration::from_millis(config.lock_timeout_ms),
    )?;
    tracing::info!(path = %db.path().display(), "database ready");

    {
        let conn = db.connect().context("failed to connect to database")?;
        credentials::ensure_admin(&conn, &config.admin_username, &config.admin_password)?;
    }

    let state = Arc::new(AppState {
        db,
        config: config.clone(),
    });

    let app = routes::router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
