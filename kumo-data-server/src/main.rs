mod config;
mod error;
mod routes;
mod status;

use config::ServerConfig;
use kumo_data::{
    engine::SignalEngine,
    exchange::kraken::rest::KrakenRest,
    ingest::{FeedStatus, backfill_all, spawn_ohlc_feed},
};
use routes::AppState;
use rustls::crypto::ring::default_provider;
use std::{error::Error, sync::Arc};
use tokio::{net::TcpListener, sync::watch};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let _ = default_provider().install_default();

    // Initialize logging
    init_logging();

    let config = ServerConfig::from_env();
    info!(
        pairs = ?config.pairs.iter().map(|pair| pair.display.as_str()).collect::<Vec<_>>(),
        aliases = config.aliases.len(),
        confidence = config.ichimoku.confidence,
        "Starting kumo-data-server"
    );

    let engine = Arc::new(SignalEngine::with_options(
        config.pairs.clone(),
        config.aliases.clone(),
        config.ichimoku,
    ));
    let rest = KrakenRest::new(&config.rest_url, config.feed.interval_minutes)?;

    // Backfill must complete before streaming starts
    let backfill = backfill_all(&engine, &rest).await;
    let ready = backfill
        .values()
        .filter(|result| result.signal_published)
        .count();
    info!(ready, pairs = backfill.len(), "Historical backfill finished");

    let (status_tx, status_rx) = watch::channel(FeedStatus::Connecting);
    let feed = spawn_ohlc_feed(Arc::clone(&engine), config.feed.clone(), status_tx);
    let status = status::spawn_status_logger(
        Arc::clone(&engine),
        status_rx.clone(),
        config.status_interval,
    );

    let app = routes::router(Arc::new(AppState {
        engine,
        rest,
        feed_status: status_rx,
    }));

    let listener = TcpListener::bind(config.http_addr).await?;
    info!("HTTP API listening on http://{}", config.http_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    feed.abort();
    status.abort();
    info!("kumo-data-server stopped");

    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received, gracefully stopping"),
        Err(error) => {
            error!(%error, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    }
}

/// Initialize logging, `LOG_FORMAT=json` switches to structured JSON output.
fn init_logging() {
    let builder = tracing_subscriber::fmt().with_env_filter(
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    );

    if std::env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json")) {
        builder.json().init();
    } else {
        builder.init();
    }
}
