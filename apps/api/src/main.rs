mod bots;
mod config;
mod dashboard;
mod db;
mod errors;
mod graph;
mod llm_client;
mod models;
mod oauth;
mod routes;
mod state;
#[cfg(test)]
mod test_support;
mod webhook;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::bots::postgres::PgBotStore;
use crate::config::Config;
use crate::db::create_pool;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Rawbot API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL-backed record store
    let db = create_pool(&config.database_url).await?;
    let store = Arc::new(PgBotStore::connect(db).await?);

    info!("LLM relay model: {}", llm_client::MODEL);
    info!("Graph API base: {}", config.graph_api_base);
    match &config.webhook_relay_url {
        Some(url) => info!("Webhook deliveries relayed to {url}"),
        None => info!("Webhook relay disabled"),
    }

    // Build app state
    let state = AppState::new(config.clone(), store);

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict CORS to APP_BASE_URL once the PWA is served from one origin

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
