use crate::{
    candle::{Candle, align_to_interval},
    error::DataError,
};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Messages received on the [`Kraken`](super) public WebSocket.
#[derive(Clone, Debug, PartialEq)]
pub enum KrakenMessage {
    /// Object message tagged by `event`, eg/ heartbeat, pong, systemStatus, subscriptionStatus.
    Event(KrakenEvent),
    /// OHLC channel update for one pair.
    Ohlc(KrakenOhlc),
    /// Any other channel payload.
    Ignore,
}

impl KrakenMessage {
    pub fn parse(text: &str) -> Result<Self, DataError> {
        serde_json::from_str(text).map_err(DataError::from)
    }
}

impl<'de> Deserialize<'de> for KrakenMessage {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;

        if value.get("event").is_some() {
            return KrakenEvent::deserialize(value)
                .map(KrakenMessage::Event)
                .map_err(serde::de::Error::custom);
        }

        match value {
            Value::Array(items) if items.len() >= 4 => {
                let channel_name = items[items.len() - 2].as_str().unwrap_or_default();
                if !channel_name.starts_with("ohlc") {
                    return Ok(KrakenMessage::Ignore);
                }

                KrakenOhlc::try_from(items.as_slice())
                    .map(KrakenMessage::Ohlc)
                    .map_err(serde::de::Error::custom)
            }
            _ => Ok(KrakenMessage::Ignore),
        }
    }
}

/// ### Raw Payload Examples
/// See docs: <https://docs.kraken.com/api/docs/websocket-v1/subscribe>
///```json
/// {"event":"heartbeat"}
/// {"channelID":343,"channelName":"ohlc-240","event":"subscriptionStatus","pair":"XBT/USD","status":"subscribed","subscription":{"interval":240,"name":"ohlc"}}
/// {"errorMessage":"Currency pair not supported DOGE/USD","event":"subscriptionStatus","pair":"DOGE/USD","status":"error"}
/// ```
#[derive(Clone, PartialEq, Eq, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KrakenEvent {
    pub event: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub pair: Option<String>,
    #[serde(default)]
    pub channel_name: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl KrakenEvent {
    pub fn is_error(&self) -> bool {
        self.status.as_deref() == Some("error") || self.error_message.is_some()
    }
}

/// ### Raw Payload Examples
/// See docs: <https://docs.kraken.com/api/docs/websocket-v1/ohlc>
///```json
/// [343,["1700007012.345678","1700020800.000000","37050.1","37120.0","37011.2","37101.9","37070.4","12.50431200",611],"ohlc-240","XBT/USD"]
/// ```
#[derive(Clone, PartialEq, Debug)]
pub struct KrakenOhlc {
    pub channel_id: Option<u64>,
    pub channel_name: String,
    pub pair: String,
    pub bar: KrakenOhlcBar,
}

impl TryFrom<&[Value]> for KrakenOhlc {
    type Error = DataError;

    fn try_from(items: &[Value]) -> Result<Self, Self::Error> {
        let [channel_id, fields @ .., channel_name, pair] = items else {
            return Err(DataError::InvalidBar(format!(
                "expected [channelID, bar, channelName, pair], got {} items",
                items.len()
            )));
        };

        let bar = match fields {
            [Value::Array(bar)] => KrakenOhlcBar::try_from(bar.as_slice())?,
            _ => {
                return Err(DataError::InvalidBar(
                    "OHLC message does not carry exactly one bar".to_string(),
                ));
            }
        };

        Ok(Self {
            channel_id: channel_id.as_u64(),
            channel_name: channel_name.as_str().unwrap_or_default().to_string(),
            pair: pair
                .as_str()
                .ok_or_else(|| DataError::InvalidBar("OHLC pair is not a string".to_string()))?
                .to_string(),
            bar,
        })
    }
}

/// Field layout a [`KrakenOhlcBar`] was decoded from.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BarLayout {
    /// `[time, etime, open, high, low, close, vwap, volume, count]` where `time` is the last
    /// update time and `etime` the end of the interval.
    Stream,
    /// `[time, open, high, low, close, vwap, volume, count]` where `time` is the interval start,
    /// as served by the REST OHLC endpoint.
    Compact,
}

/// Provider OHLC bar prior to normalisation into a [`Candle`].
#[derive(Clone, PartialEq, Debug)]
pub struct KrakenOhlcBar {
    pub layout: BarLayout,
    pub time: f64,
    pub end_time: Option<f64>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub vwap: f64,
    pub volume: f64,
    pub count: u64,
}

impl TryFrom<&[Value]> for KrakenOhlcBar {
    type Error = DataError;

    fn try_from(fields: &[Value]) -> Result<Self, Self::Error> {
        let (layout, time, end_time, rest) = match fields {
            [time, end_time, rest @ ..] if fields.len() == 9 => (
                BarLayout::Stream,
                field_f64(time, "time")?,
                Some(field_f64(end_time, "etime")?),
                rest,
            ),
            [time, rest @ ..] if fields.len() == 8 => {
                (BarLayout::Compact, field_f64(time, "time")?, None, rest)
            }
            _ => {
                return Err(DataError::InvalidBar(format!(
                    "expected 8 or 9 OHLC fields, got {}",
                    fields.len()
                )));
            }
        };

        let [open, high, low, close, vwap, volume, count] = rest else {
            return Err(DataError::InvalidBar("truncated OHLC fields".to_string()));
        };

        Ok(Self {
            layout,
            time,
            end_time,
            open: field_f64(open, "open")?,
            high: field_f64(high, "high")?,
            low: field_f64(low, "low")?,
            close: field_f64(close, "close")?,
            vwap: field_f64(vwap, "vwap")?,
            volume: field_f64(volume, "volume")?,
            count: field_f64(count, "count")? as u64,
        })
    }
}

impl KrakenOhlcBar {
    /// Start of the bar's interval in seconds.
    pub fn period_start(&self, interval_secs: i64) -> i64 {
        match (self.layout, self.end_time) {
            (BarLayout::Stream, Some(end_time)) => {
                // etime may carry sub-second jitter around the interval boundary
                let end = (end_time / interval_secs as f64).round() as i64 * interval_secs;
                end - interval_secs
            }
            _ => align_to_interval(self.time.floor() as i64, interval_secs),
        }
    }

    /// Normalise into a [`Candle`], validating the price fields.
    pub fn to_candle(&self, interval_secs: i64) -> Result<Candle, DataError> {
        let prices = [self.open, self.high, self.low, self.close, self.volume];
        if prices.iter().any(|value| !value.is_finite() || *value < 0.0) {
            return Err(DataError::InvalidBar(format!(
                "non-finite or negative field in {self:?}"
            )));
        }
        if self.high < self.low {
            return Err(DataError::InvalidBar(format!(
                "high {} below low {}",
                self.high, self.low
            )));
        }

        Ok(Candle {
            period_start: self.period_start(interval_secs),
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
        })
    }
}

/// Numeric fields arrive as JSON strings ("37050.1") or numbers (611).
fn field_f64(value: &Value, field: &'static str) -> Result<f64, DataError> {
    match value {
        Value::String(raw) => raw.trim().parse::<f64>().ok(),
        Value::Number(number) => number.as_f64(),
        _ => None,
    }
    .ok_or_else(|| DataError::InvalidBar(format!("field {field} is not numeric: {value}")))
}
