//! The backend for tracking activity attendance and points

use std::sync::Arc;

use anyhow::{Context as _, Result};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use rollcall::config::Config;
use rollcall::db::{LedgerStore, MemoryStore, PgStore};
use rollcall::engine::Engine;
use rollcall::routes::router;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.log_filter))
        .init();

    let store: Arc<dyn LedgerStore> = if let Some(database_url) = &config.database_url {
        Arc::new(
            PgStore::connect(database_url)
                .await
                .context("Failed to connect to the database")?,
        )
    } else {
        tracing::warn!("DATABASE_URL is not set, keeping the ledger in memory");
        Arc::new(MemoryStore::new())
    };

    let app = router(Engine::new(store))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    tracing::info!(addr = %config.addr, "listening");
    axum::Server::bind(&config.addr)
        .serve(app.into_make_service())
        .await
        .context("Server failed")?;

    Ok(())
}
