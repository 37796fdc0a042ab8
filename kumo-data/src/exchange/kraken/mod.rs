use self::channel::KrakenChannel;
use crate::config::TrackedPair;
use serde_json::json;
use std::time::Duration;
use tokio_tungstenite::tungstenite::Message;

/// Defines the [`KrakenChannel`] subscribed to and used to filter incoming messages.
pub mod channel;

/// Streaming message types for [`Kraken`](self) and OHLC bar normalisation.
pub mod message;

/// REST client for historical OHLC backfill, server time and order-flow snapshots.
pub mod rest;

/// Order-flow snapshot types and metrics derived from trades and depth.
pub mod orderflow;

/// [`Kraken`](self) WebSocket server base url.
///
/// See docs: <https://docs.kraken.com/api/docs/guides/spot-ws-intro>
pub const BASE_URL_KRAKEN_WS: &str = "wss://ws.kraken.com";

/// [`Kraken`](self) public REST base url.
///
/// See docs: <https://docs.kraken.com/api/docs/guides/spot-rest-intro>
pub const BASE_URL_KRAKEN_REST: &str = "https://api.kraken.com/0/public";

/// [`Kraken`](self) application level ping interval.
///
/// See docs: <https://docs.kraken.com/api/docs/websocket-v1/ping>
pub const PING_INTERVAL_KRAKEN: Duration = Duration::from_secs(30);

/// Build one subscription request per tracked pair.
///
/// ```json
/// {"event":"subscribe","pair":["XBT/USD"],"subscription":{"name":"ohlc","interval":240}}
/// ```
pub fn subscription_requests(pairs: &[TrackedPair], channel: KrakenChannel) -> Vec<Message> {
    pairs
        .iter()
        .map(|pair| {
            Message::Text(
                json!({
                    "event": "subscribe",
                    "pair": [pair.ws_symbol.as_str()],
                    "subscription": channel,
                })
                .to_string()
                .into(),
            )
        })
        .collect()
}

/// Build an application level ping request.
pub fn ping_request(reqid: u64) -> Message {
    Message::Text(json!({ "event": "ping", "reqid": reqid }).to_string().into())
}
