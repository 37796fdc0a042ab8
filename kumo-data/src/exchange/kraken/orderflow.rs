use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Order book level size above which a level counts as a wall.
pub const WALL_SIZE_THRESHOLD: f64 = 5.0;

/// [`Kraken`](super) order book depth as served by the `Depth` endpoint.
///
/// Levels are `[price, volume, timestamp]` with price and volume as strings.
#[derive(Clone, PartialEq, Debug, Default, Deserialize, Serialize)]
pub struct KrakenDepth {
    #[serde(default)]
    pub asks: Vec<Vec<Value>>,
    #[serde(default)]
    pub bids: Vec<Vec<Value>>,
}

/// Subset of the [`Kraken`](super) `Ticker` payload; every field is `[today, last 24 hours]`
/// except `a`/`b`/`c` which lead with the price.
///
/// See docs: <https://docs.kraken.com/api/docs/rest-api/get-ticker-information>
#[derive(Clone, PartialEq, Debug, Default, Deserialize, Serialize)]
pub struct KrakenTicker {
    #[serde(default)]
    pub a: Vec<String>,
    #[serde(default)]
    pub b: Vec<String>,
    #[serde(default)]
    pub c: Vec<String>,
    #[serde(default)]
    pub v: Vec<String>,
    #[serde(default)]
    pub p: Vec<String>,
    #[serde(default)]
    pub l: Vec<String>,
    #[serde(default)]
    pub h: Vec<String>,
}

/// Flattened ticker figures; absent or unparsable fields are reported as zero.
#[derive(Clone, Copy, PartialEq, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TickerSummary {
    pub ask: f64,
    pub bid: f64,
    pub last: f64,
    pub volume: f64,
    pub volume_weighted_avg_price: f64,
    pub high: f64,
    pub low: f64,
}

impl From<&KrakenTicker> for TickerSummary {
    fn from(ticker: &KrakenTicker) -> Self {
        let at = |values: &[String], index: usize| {
            values
                .get(index)
                .and_then(|raw| raw.parse::<f64>().ok())
                .unwrap_or_default()
        };

        Self {
            ask: at(&ticker.a, 0),
            bid: at(&ticker.b, 0),
            last: at(&ticker.c, 0),
            volume: at(&ticker.v, 1),
            volume_weighted_avg_price: at(&ticker.p, 1),
            high: at(&ticker.h, 1),
            low: at(&ticker.l, 1),
        }
    }
}

/// Buy/sell pressure and wall counts derived from recent trades and depth.
#[derive(Clone, Copy, PartialEq, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderFlowMetrics {
    pub buy_volume: f64,
    pub sell_volume: f64,
    pub bid_walls_count: usize,
    pub ask_walls_count: usize,
}

impl OrderFlowMetrics {
    /// Trades are `[price, volume, time, side, type, misc, trade_id]` with side "b" or "s".
    pub fn compute(trades: &[Vec<Value>], depth: &KrakenDepth) -> Self {
        let side_volume = |side: &str| -> f64 {
            trades
                .iter()
                .filter(|trade| trade.get(3).and_then(Value::as_str) == Some(side))
                .filter_map(|trade| trade.get(1).and_then(numeric))
                .sum()
        };
        let walls = |levels: &[Vec<Value>]| {
            levels
                .iter()
                .filter_map(|level| level.get(1).and_then(numeric))
                .filter(|size| *size > WALL_SIZE_THRESHOLD)
                .count()
        };

        Self {
            buy_volume: side_volume("b"),
            sell_volume: side_volume("s"),
            bid_walls_count: walls(&depth.bids),
            ask_walls_count: walls(&depth.asks),
        }
    }
}

/// Order-flow snapshot for one pair.
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderFlowSnapshot {
    pub success: bool,
    /// Pair as requested, eg/ "XBTUSD".
    pub pair: String,
    /// Pair key the provider answered with, eg/ "XXBTZUSD".
    pub kraken_pair: String,
    pub fetched_at: DateTime<Utc>,
    pub trades: Vec<Vec<Value>>,
    pub orderbook: KrakenDepth,
    pub ticker: TickerSummary,
    pub metrics: OrderFlowMetrics,
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::String(raw) => raw.parse().ok(),
        Value::Number(number) => number.as_f64(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows(value: Value) -> Vec<Vec<Value>> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_order_flow_metrics() {
        let trades = rows(json!([
            ["37000.1", "0.50000000", 1700006400.1, "b", "m", "", 1],
            ["37000.2", "1.25000000", 1700006401.1, "b", "l", "", 2],
            ["36999.9", "2.00000000", 1700006402.1, "s", "m", "", 3],
            ["36999.8", "oops", 1700006403.1, "s", "m", "", 4]
        ]));
        let depth = KrakenDepth {
            asks: rows(json!([
                ["37001.0", "6.0", 1700006400],
                ["37002.0", "5.0", 1700006400]
            ])),
            bids: rows(json!([
                ["36999.0", "10.5", 1700006400],
                ["36998.0", "7.1", 1700006400],
                ["36997.0", "0.1", 1700006400]
            ])),
        };

        let metrics = OrderFlowMetrics::compute(&trades, &depth);

        assert!((metrics.buy_volume - 1.75).abs() < 1e-9);
        assert!((metrics.sell_volume - 2.0).abs() < 1e-9);
        assert_eq!(metrics.bid_walls_count, 2);
        // a level of exactly 5.0 is not a wall
        assert_eq!(metrics.ask_walls_count, 1);
    }

    #[test]
    fn test_ticker_summary_from_kraken_ticker() {
        let ticker: KrakenTicker = serde_json::from_value(json!({
            "a": ["37001.00000", "1", "1.000"],
            "b": ["37000.90000", "2", "2.000"],
            "c": ["37000.95000", "0.01000000"],
            "v": ["100.1", "2500.5"],
            "p": ["36950.1", "36900.2"],
            "t": [1000, 25000],
            "l": ["36500.0", "36400.0"],
            "h": ["37200.0", "37300.0"],
            "o": "36800.0"
        }))
        .unwrap();

        let summary = TickerSummary::from(&ticker);

        assert_eq!(
            summary,
            TickerSummary {
                ask: 37001.0,
                bid: 37000.9,
                last: 37000.95,
                volume: 2500.5,
                volume_weighted_avg_price: 36900.2,
                high: 37300.0,
                low: 36400.0,
            }
        );
    }

    #[test]
    fn test_ticker_summary_missing_fields_are_zero() {
        let summary = TickerSummary::from(&KrakenTicker::default());
        assert_eq!(summary, TickerSummary::default());
    }
}
