// Rajasthan Weather & Air Quality Monitor — ingestion pipeline entry point.
// Runs one full fetch → transform → aggregate → alert → persist cycle and
// exits; intended to be triggered by an external scheduler every 2-3 hours.
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod db;
mod errors;
mod helpers;
mod services;

use config::AppConfig;
use services::openmeteo::OpenMeteoClient;
use services::pipeline;

/// Maximum number of connections in the database pool.
const DB_POOL_MAX_CONNECTIONS: u32 = 5;
/// Minimum number of connections kept alive in the database pool.
const DB_POOL_MIN_CONNECTIONS: u32 = 2;

#[tokio::main]
async fn main() {
    // .env first so RUST_LOG and DATABASE_URL from the file are visible.
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rajasthan_weather_monitor=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{}", e);
            std::process::exit(1);
        }
    };

    let pool = match PgPoolOptions::new()
        .max_connections(DB_POOL_MAX_CONNECTIONS)
        .min_connections(DB_POOL_MIN_CONNECTIONS)
        .connect(&config.database_url)
        .await
    {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!("Failed to connect to database: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = sqlx::migrate!().run(&pool).await {
        tracing::error!("Failed to run database migrations: {}", e);
        std::process::exit(1);
    }
    tracing::info!("Database migrations completed");

    let client = OpenMeteoClient::new();

    if let Err(e) = pipeline::run(&pool, &client).await {
        tracing::error!("Pipeline run aborted: {}", e);
        std::process::exit(1);
    }
}
