//! Contactbook API server

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use contactbook_api::{routes::create_router, AppState, Config};
use contactbook_shared::db;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present; real deployments set the environment directly
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("failed to load configuration")?;

    let pool = db::create_pool(
        &config.database_url,
        config.database_max_connections,
        config.database_acquire_timeout_secs,
    )
    .await
    .context("failed to connect to database")?;

    db::run_migrations(&pool)
        .await
        .context("failed to run migrations")?;

    let bind_address = config.bind_address.clone();
    let state = AppState::new(pool, config);
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("failed to bind {bind_address}"))?;

    tracing::info!(address = %bind_address, "contactbook-api listening");

    axum::serve(listener, app)
        .await
        .context("server terminated")?;

    Ok(())
}
