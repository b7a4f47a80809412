//! koalixcrm pricing service entry point

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use koalix_pricing::cache::{start_cache_warmer, AppCache};
use koalix_pricing::config::Config;
use koalix_pricing::{app, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,sqlx=warn".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    info!(
        bind_addr = %config.bind_addr,
        max_connections = config.database_max_connections,
        "Configuration loaded"
    );

    let db = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    info!("Connected to PostgreSQL");

    let cache = AppCache::new(config.cache_ttl);
    if let Some(every) = config.cache_warm_interval {
        tokio::spawn(start_cache_warmer(cache.clone(), db.clone(), every));
    }

    let app = app(AppState { db, cache });

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    info!("Pricing service listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
