//! fromscreen server entry point.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use fromscreen_server::config::Config;
use fromscreen_server::pipeline::Pipeline;
use fromscreen_server::quota::{MemoryQuota, PgQuota, QuotaPolicy, QuotaService};
use fromscreen_server::state::Settings;
use fromscreen_server::store::{ConversionStore, MemoryConversionStore, PgConversionStore};
use fromscreen_server::upstream::OpenRouterClient;
use fromscreen_server::{create_router, db, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fromscreen_server=info,tower_http=info".into()),
        )
        .init();

    let config = Config::parse();
    let policy = QuotaPolicy::default();

    let (store, quota): (Arc<dyn ConversionStore>, Arc<dyn QuotaService>) =
        match config.database_url.as_deref() {
            Some(url) => {
                let pool = db::create_pool(url, config.max_connections)
                    .await
                    .context("Failed to connect to database")?;
                db::run_migrations(&pool)
                    .await
                    .context("Failed to run migrations")?;
                tracing::info!("Using PostgreSQL storage");
                (
                    Arc::new(PgConversionStore::new(pool.clone())),
                    Arc::new(PgQuota::new(pool, policy)),
                )
            }
            None => {
                tracing::warn!("DATABASE_URL not set; conversions and quota are kept in memory");
                (
                    Arc::new(MemoryConversionStore::new()),
                    Arc::new(MemoryQuota::new(policy)),
                )
            }
        };

    let upstream = OpenRouterClient::new(config.openrouter())
        .context("Failed to build upstream client")?;
    let model = config.model();
    tracing::info!(%model, "Upstream model resolved");

    let pipeline = Pipeline::new(store.clone(), Arc::new(upstream), model);
    let settings = Settings {
        secure_cookies: config.secure_cookies,
        max_image_bytes: config.max_image_bytes,
    };
    let app = create_router(AppState::new(store, quota, pipeline, settings));

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind))?;
    tracing::info!("fromscreen server listening on {}", config.bind);

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
