mod classifier;
mod config;
mod db;
mod errors;
mod interests;
mod models;
mod routes;
mod state;
mod store;
#[cfg(test)]
mod test_support;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::broadcast;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::classifier::{HttpZeroShotClassifier, DEFAULT_MODEL};
use crate::config::Config;
use crate::db::create_pool;
use crate::interests::aggregator::{AggregatorSettings, InterestAggregator};
use crate::interests::attribution::Weights;
use crate::interests::scheduler::{run_refresh_loop, RefreshSettings};
use crate::interests::zero_shot::BatchSettings;
use crate::routes::build_router;
use crate::state::AppState;
use crate::store::{PgPostStore, PostStore};

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

    info!("Starting interests service v{}", env!("CARGO_PKG_VERSION"));

    // Initialize the post document store
    let db = create_pool(&config.database_url).await?;
    let store: Arc<dyn PostStore> = Arc::new(PgPostStore::new(db, config.store_page_size));

    // Initialize the zero-shot classifier client
    let classifier = Arc::new(HttpZeroShotClassifier::new(
        config.classifier_url.clone(),
        config.classifier_api_key.clone(),
    )?);
    info!(
        "Zero-shot classifier at {} (expected model: {})",
        config.classifier_url, DEFAULT_MODEL
    );

    let aggregator = Arc::new(InterestAggregator::new(
        store.clone(),
        classifier,
        AggregatorSettings {
            batch: BatchSettings {
                batch_size: config.classifier_batch_size,
                concurrency: config.classifier_concurrency,
                timeout: config.classifier_timeout,
            },
            weights: Weights::default(),
            max_reply_depth: config.max_reply_depth,
        },
    ));

    // Keyword-only pass so interests are available before the first model pass lands
    info!("Startup keyword-only recompute...");
    if let Err(e) = aggregator.recompute(false).await {
        warn!(error = %e, "Startup recompute failed; waiting for background refresh");
    }

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let refresh = tokio::spawn(run_refresh_loop(
        aggregator.clone(),
        RefreshSettings {
            interval: config.refresh_interval,
            cooldown: config.refresh_cooldown,
        },
        shutdown_rx,
    ));

    let state = AppState { aggregator, store };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(());
    if let Err(e) = refresh.await {
        warn!(error = %e, "Refresh loop task ended abnormally");
    }
    info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
