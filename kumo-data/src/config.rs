use crate::{
    exchange::kraken::{BASE_URL_KRAKEN_WS, PING_INTERVAL_KRAKEN},
    streams::timeout::DEFAULT_READ_TIMEOUT,
};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::time::Duration;

/// Default display pairs tracked by the feed.
pub const DEFAULT_PAIRS: &str = "XBT/USD,ETH/USD,SOL/USD";

/// Default `source=alias` mirror list.
pub const DEFAULT_ALIASES: &str = "XBT/USD=BTC/USD";

/// A pair tracked end-to-end: subscribed on the stream, backfilled over REST and keyed in the
/// candle store by its display name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct TrackedPair {
    /// Display symbol, eg/ "ETH/USD".
    pub display: SmolStr,
    /// Symbol used in streaming subscriptions and messages, eg/ "ETH/USD".
    pub ws_symbol: SmolStr,
    /// Symbol used for REST requests, eg/ "ETHUSD".
    pub rest_symbol: SmolStr,
}

impl TrackedPair {
    /// Construct from a venue display symbol; the REST symbol drops the separator.
    pub fn new(display: &str) -> Self {
        let display = display.trim().to_uppercase();
        Self {
            rest_symbol: SmolStr::new(display.replace('/', "")),
            ws_symbol: SmolStr::new(&display),
            display: SmolStr::new(display),
        }
    }
}

/// Mirror of one canonical pair's signal under a second display name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct PairAlias {
    pub source: SmolStr,
    pub alias: SmolStr,
}

impl PairAlias {
    pub fn new(source: impl Into<SmolStr>, alias: impl Into<SmolStr>) -> Self {
        Self {
            source: source.into(),
            alias: alias.into(),
        }
    }
}

/// Parse a comma separated pair list, eg/ "XBT/USD,ETH/USD".
pub fn parse_pairs(raw: &str) -> Vec<TrackedPair> {
    let mut pairs: Vec<TrackedPair> = Vec::new();
    for pair in raw
        .split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(TrackedPair::new)
    {
        if !pairs.contains(&pair) {
            pairs.push(pair);
        }
    }
    pairs
}

/// Parse a comma separated `source=alias` list, eg/ "XBT/USD=BTC/USD".
///
/// Malformed entries are skipped.
pub fn parse_aliases(raw: &str) -> Vec<PairAlias> {
    raw.split(',')
        .filter_map(|entry| {
            let (source, alias) = entry.split_once('=')?;
            let (source, alias) = (source.trim(), alias.trim());
            (!source.is_empty() && !alias.is_empty())
                .then(|| PairAlias::new(source.to_uppercase(), alias.to_uppercase()))
        })
        .collect()
}

/// Live OHLC feed configuration.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// WebSocket server URL
    pub url: String,
    /// Application level ping interval to keep the connection alive
    pub ping_interval: Duration,
    /// Fixed delay before reconnecting after a disconnect
    pub reconnect_delay: Duration,
    /// Silence after which the connection is considered dead
    pub read_timeout: Duration,
    /// Candle interval in minutes
    pub interval_minutes: u32,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: BASE_URL_KRAKEN_WS.to_string(),
            ping_interval: PING_INTERVAL_KRAKEN,
            reconnect_delay: Duration::from_secs(5),
            read_timeout: DEFAULT_READ_TIMEOUT,
            interval_minutes: 240,
        }
    }
}

impl FeedConfig {
    /// Create a new configuration with custom URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Set ping interval
    pub fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    /// Set reconnect delay
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Set read timeout
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }
}
