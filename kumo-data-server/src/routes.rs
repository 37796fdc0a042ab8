use crate::error::ApiError;
use axum::{
    Json, Router,
    extract::{Query, State},
    routing::{get, post},
};
use kumo_data::{
    engine::{SignalEngine, SignalSnapshot},
    exchange::kraken::{orderflow::OrderFlowSnapshot, rest::KrakenRest},
    ingest::FeedStatus,
};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

/// Maximum order book depth Kraken serves per side.
const MAX_DEPTH_COUNT: u32 = 500;

/// Shared handler state.
#[derive(Debug)]
pub struct AppState {
    pub engine: Arc<SignalEngine>,
    pub rest: KrakenRest,
    pub feed_status: watch::Receiver<FeedStatus>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/ichimoku-signals", get(ichimoku_signals))
        .route("/api/test-kraken", post(test_kraken))
        .route("/api/kraken-orderflow", get(kraken_orderflow))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn ichimoku_signals(State(state): State<Arc<AppState>>) -> Json<SignalSnapshot> {
    Json(state.engine.snapshot())
}

async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    let feed = *state.feed_status.borrow();
    Json(json!({ "status": "ok", "feed": feed.as_str() }))
}

/// Provider connectivity probe against the `Time` endpoint.
async fn test_kraken(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let time = state.rest.server_time().await.inspect_err(|error| {
        warn!(%error, "Kraken connectivity probe failed");
    })?;

    info!(unixtime = time.unixtime, "Kraken connectivity probe succeeded");
    Ok(Json(json!({
        "success": true,
        "data": { "error": [], "result": time },
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderFlowQuery {
    #[serde(default = "default_pair")]
    pair: String,
    #[serde(default = "default_depth_count")]
    depth_count: u32,
}

fn default_pair() -> String {
    "XBTUSD".to_string()
}

fn default_depth_count() -> u32 {
    MAX_DEPTH_COUNT
}

async fn kraken_orderflow(
    State(state): State<Arc<AppState>>,
    Query(query): Query<OrderFlowQuery>,
) -> Result<Json<OrderFlowSnapshot>, ApiError> {
    let pair = query.pair.trim().to_uppercase();
    if pair.is_empty() || !pair.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ApiError::BadRequest(format!("invalid pair: {:?}", query.pair)));
    }
    if !(1..=MAX_DEPTH_COUNT).contains(&query.depth_count) {
        return Err(ApiError::BadRequest(format!(
            "depthCount must be between 1 and {MAX_DEPTH_COUNT}"
        )));
    }

    let snapshot = state
        .rest
        .order_flow(&pair, query.depth_count)
        .await
        .inspect_err(|error| warn!(%pair, %error, "order-flow request failed"))?;

    info!(
        %pair,
        trades = snapshot.trades.len(),
        levels = snapshot.orderbook.asks.len() + snapshot.orderbook.bids.len(),
        buy_volume = snapshot.metrics.buy_volume,
        sell_volume = snapshot.metrics.sell_volume,
        "fetched order-flow snapshot"
    );
    Ok(Json(snapshot))
}
