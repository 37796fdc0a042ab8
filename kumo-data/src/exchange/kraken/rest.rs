use super::{
    channel::KrakenChannel,
    message::KrakenOhlcBar,
    orderflow::{KrakenDepth, KrakenTicker, OrderFlowMetrics, OrderFlowSnapshot, TickerSummary},
};
use crate::{candle::Candle, config::TrackedPair, error::DataError, ingest::HistoricalCandles};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use smol_str::SmolStr;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Per request timeout applied by [`KrakenRest`].
pub const REST_TIMEOUT: Duration = Duration::from_secs(10);

/// Number of recent trades requested for an order-flow snapshot.
pub const ORDER_FLOW_TRADE_COUNT: u32 = 100;

/// [`Kraken`](super) REST response envelope.
///
/// ```json
/// {"error":[],"result":{"XXBTZUSD":[[1700006400,"37050.1","37120.0","37011.2","37101.9","37070.4","12.504",611]],"last":1700006400}}
/// ```
#[derive(Clone, PartialEq, Debug, Deserialize)]
pub struct KrakenResponse<T> {
    #[serde(default)]
    pub error: Vec<String>,
    pub result: Option<T>,
}

impl<T> KrakenResponse<T> {
    pub fn into_result(self) -> Result<T, DataError> {
        if !self.error.is_empty() {
            return Err(DataError::Provider(self.error));
        }
        self.result
            .ok_or_else(|| DataError::Deserialise("response is missing result".to_string()))
    }
}

/// [`Kraken`](super) server time, used as a connectivity probe.
#[derive(Clone, PartialEq, Eq, Debug, Deserialize, Serialize)]
pub struct KrakenServerTime {
    pub unixtime: i64,
    pub rfc1123: String,
}

/// Extract the single pair keyed entry from a result object, skipping the "last" cursor.
pub fn pair_entry(result: Map<String, Value>, pair: &str) -> Result<(String, Value), DataError> {
    result
        .into_iter()
        .find(|(key, _)| key != "last")
        .ok_or_else(|| DataError::UnknownPair(SmolStr::new(pair)))
}

/// Decode an OHLC result object into provider bars.
pub fn parse_ohlc_result(
    result: Map<String, Value>,
    pair: &str,
) -> Result<Vec<KrakenOhlcBar>, DataError> {
    let (_, bars) = pair_entry(result, pair)?;
    let bars: Vec<Vec<Value>> = serde_json::from_value(bars)?;

    bars.iter()
        .map(|bar| KrakenOhlcBar::try_from(bar.as_slice()))
        .collect()
}

/// [`Kraken`](super) public REST client.
#[derive(Debug, Clone)]
pub struct KrakenRest {
    client: reqwest::Client,
    base_url: Url,
    interval_minutes: u32,
}

impl KrakenRest {
    pub fn new(base_url: &str, interval_minutes: u32) -> Result<Self, DataError> {
        let base_url = Url::parse(base_url)
            .map_err(|error| DataError::Http(format!("invalid base url {base_url}: {error}")))?;
        let client = reqwest::Client::builder().timeout(REST_TIMEOUT).build()?;

        Ok(Self {
            client,
            base_url,
            interval_minutes,
        })
    }

    fn endpoint(&self, method: &str) -> Result<Url, DataError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| DataError::Http(format!("url cannot be a base: {}", self.base_url)))?
            .pop_if_empty()
            .push(method);
        Ok(url)
    }

    async fn get<T>(&self, method: &str, query: &[(&str, String)]) -> Result<T, DataError>
    where
        T: DeserializeOwned,
    {
        let url = self.endpoint(method)?;
        debug!(%url, ?query, "requesting Kraken REST endpoint");

        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await?
            .error_for_status()?;

        response.json::<KrakenResponse<T>>().await?.into_result()
    }

    /// Most recent OHLC bars (up to 720) for a REST symbol, eg/ "XBTUSD".
    pub async fn ohlc(&self, rest_symbol: &str) -> Result<Vec<KrakenOhlcBar>, DataError> {
        let result: Map<String, Value> = self
            .get(
                "OHLC",
                &[
                    ("pair", rest_symbol.to_string()),
                    ("interval", self.interval_minutes.to_string()),
                ],
            )
            .await?;

        parse_ohlc_result(result, rest_symbol)
    }

    pub async fn server_time(&self) -> Result<KrakenServerTime, DataError> {
        self.get("Time", &[]).await
    }

    /// Recent trades, order book depth and ticker for one pair, with derived metrics.
    pub async fn order_flow(
        &self,
        rest_symbol: &str,
        depth_count: u32,
    ) -> Result<OrderFlowSnapshot, DataError> {
        let pair = ("pair", rest_symbol.to_string());

        let trades: Map<String, Value> = self
            .get(
                "Trades",
                &[pair.clone(), ("count", ORDER_FLOW_TRADE_COUNT.to_string())],
            )
            .await?;
        let (kraken_pair, trades) = pair_entry(trades, rest_symbol)?;
        let trades: Vec<Vec<Value>> = serde_json::from_value(trades)?;

        let depth: Map<String, Value> = self
            .get("Depth", &[pair.clone(), ("count", depth_count.to_string())])
            .await?;
        let (_, depth) = pair_entry(depth, rest_symbol)?;
        let orderbook: KrakenDepth = serde_json::from_value(depth)?;

        let ticker: Map<String, Value> = self.get("Ticker", &[pair]).await?;
        let (_, ticker) = pair_entry(ticker, rest_symbol)?;
        let ticker: KrakenTicker = serde_json::from_value(ticker)?;

        let metrics = OrderFlowMetrics::compute(&trades, &orderbook);

        Ok(OrderFlowSnapshot {
            success: true,
            pair: rest_symbol.to_string(),
            kraken_pair,
            fetched_at: Utc::now(),
            trades,
            orderbook,
            ticker: TickerSummary::from(&ticker),
            metrics,
        })
    }
}

/// Normalise REST bars into candles. Bars that fail validation are logged and skipped.
pub fn candles_from_bars(pair: &str, bars: &[KrakenOhlcBar], interval_secs: i64) -> Vec<Candle> {
    bars.iter()
        .filter_map(|bar| {
            bar.to_candle(interval_secs)
                .inspect_err(|error| warn!(%pair, %error, "dropping malformed historical bar"))
                .ok()
        })
        .collect()
}

#[async_trait]
impl HistoricalCandles for KrakenRest {
    async fn fetch_candles(&self, pair: &TrackedPair) -> Result<Vec<Candle>, DataError> {
        let interval_secs = KrakenChannel::ohlc(self.interval_minutes).interval_secs();
        let bars = self.ohlc(&pair.rest_symbol).await?;

        Ok(candles_from_bars(&pair.display, &bars, interval_secs))
    }
}
