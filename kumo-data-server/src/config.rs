use kumo_data::{
    config::{
        DEFAULT_ALIASES, DEFAULT_PAIRS, FeedConfig, PairAlias, TrackedPair, parse_aliases,
        parse_pairs,
    },
    exchange::kraken::{BASE_URL_KRAKEN_REST, BASE_URL_KRAKEN_WS},
    ichimoku::IchimokuOptions,
};
use std::{net::SocketAddr, str::FromStr, time::Duration};
use tracing::warn;

const DEFAULT_STATUS_INTERVAL: Duration = Duration::from_secs(60);

/// Process configuration, read once at start-up.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub http_addr: SocketAddr,
    pub rest_url: String,
    pub pairs: Vec<TrackedPair>,
    pub aliases: Vec<PairAlias>,
    pub feed: FeedConfig,
    pub status_interval: Duration,
    pub ichimoku: IchimokuOptions,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Unparsable values fall back to their default.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let mut pairs = parse_pairs(&var("KUMO_PAIRS", DEFAULT_PAIRS));
        if pairs.is_empty() {
            warn!("KUMO_PAIRS contains no pairs, using defaults");
            pairs = parse_pairs(DEFAULT_PAIRS);
        }

        let defaults = FeedConfig::default();
        let feed = FeedConfig::new(var("KUMO_WS_URL", BASE_URL_KRAKEN_WS))
            .with_ping_interval(secs(&lookup, "KUMO_PING_INTERVAL_SECS", defaults.ping_interval))
            .with_reconnect_delay(secs(
                &lookup,
                "KUMO_RECONNECT_DELAY_SECS",
                defaults.reconnect_delay,
            ))
            .with_read_timeout(secs(&lookup, "KUMO_READ_TIMEOUT_SECS", defaults.read_timeout));

        Self {
            http_addr: parsed(&lookup, "KUMO_HTTP_ADDR", || {
                SocketAddr::from(([0, 0, 0, 0], 5000))
            }),
            rest_url: var("KUMO_REST_URL", BASE_URL_KRAKEN_REST),
            pairs,
            aliases: parse_aliases(&var("KUMO_ALIASES", DEFAULT_ALIASES)),
            feed,
            status_interval: secs(&lookup, "KUMO_STATUS_INTERVAL_SECS", DEFAULT_STATUS_INTERVAL),
            ichimoku: IchimokuOptions {
                confidence: parsed(&lookup, "KUMO_CONFIDENCE", || true),
            },
        }
    }
}

fn parsed<F, T>(lookup: &F, key: &str, default: impl FnOnce() -> T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(%key, value = %raw, "invalid value, using default");
            default()
        }),
        None => default(),
    }
}

fn secs<F>(lookup: &F, key: &str, default: Duration) -> Duration
where
    F: Fn(&str) -> Option<String>,
{
    match parsed::<F, u64>(lookup, key, || 0) {
        0 => default,
        secs => Duration::from_secs(secs),
    }
}
