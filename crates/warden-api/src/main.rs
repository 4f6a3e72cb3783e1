//! Warden server binary.
//!
//! Loads YAML configuration (`--config <path>` or `WARDEN_CONFIG`), builds
//! the key material and refresh-token store, and serves the filter
//! pipeline. Unreadable key material refuses to start; a missing config
//! file runs the defaults with ephemeral generated keys.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use warden_api::config::AppConfig;
use warden_api::AppState;
use warden_jose::{InMemoryTokenStore, TokenStore};

fn config_path() -> Option<PathBuf> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            return args.next().map(PathBuf::from);
        }
    }
    std::env::var("WARDEN_CONFIG").ok().map(PathBuf::from)
}

async fn token_store(config: &AppConfig) -> anyhow::Result<Arc<dyn TokenStore>> {
    #[cfg(feature = "postgres")]
    if let Some(database) = &config.database {
        if !database.url.is_empty() {
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(database.max_connections)
                .connect(&database.url)
                .await
                .context("connecting to the token database")?;
            let store = warden_jose::PostgresTokenStore::new(pool);
            store
                .migrate()
                .await
                .context("migrating the token database")?;
            tracing::info!("refresh tokens persisted in Postgres");
            return Ok(Arc::new(store));
        }
    }
    #[cfg(not(feature = "postgres"))]
    if config.database.is_some() {
        tracing::warn!("database configured but the postgres feature is off; using memory");
    }
    Ok(Arc::new(InMemoryTokenStore::new()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let path = config_path();
    let config = AppConfig::load(path.as_deref()).context("loading configuration")?;
    let keys = Arc::new(config.keys.load().context("loading key material")?);
    let store = token_store(&config).await?;

    let state = AppState::new(&config, keys, store);
    let app = warden_api::app(state);

    let addr = SocketAddr::new(
        config.server.host.parse().context("parsing server host")?,
        config.server.port,
    );
    tracing::info!("warden-api listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("binding listener")?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("server error")?;
    Ok(())
}
