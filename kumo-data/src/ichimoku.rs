//! Ichimoku Cloud lines and the cloud breakout signal.
//!
//! Every line uses the most recent N candles of the window. The calculator is stateless:
//! identical windows always produce identical readings.

use crate::{WINDOW_CAPACITY, candle::Candle};
use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Conversion line lookback.
pub const TENKAN_PERIOD: usize = 9;
/// Base line lookback.
pub const KIJUN_PERIOD: usize = 26;
/// Leading span B lookback.
pub const SENKOU_B_PERIOD: usize = WINDOW_CAPACITY;
/// Lagging span displacement.
pub const CHIKOU_DISPLACEMENT: usize = 26;

/// Cloud breakout signal.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Signal {
    #[display("BUY")]
    Buy,
    #[display("SELL")]
    Sell,
    #[display("NEUTRAL")]
    Neutral,
}

/// Confidence refinement for a [`Signal`].
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    #[display("high")]
    High,
    #[display("medium")]
    Medium,
    #[display("low")]
    Low,
}

/// Calculator options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct IchimokuOptions {
    /// Attach a [`Confidence`] to every reading.
    pub confidence: bool,
}

impl Default for IchimokuOptions {
    fn default() -> Self {
        Self { confidence: true }
    }
}

/// Output of [`compute`] for one window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IchimokuReading {
    pub tenkan_sen: f64,
    pub kijun_sen: f64,
    pub senkou_span_a: f64,
    pub senkou_span_b: f64,
    pub chikou_span: Option<f64>,
    /// Close of the most recent candle.
    pub price: f64,
    pub signal: Signal,
    pub confidence: Option<Confidence>,
    /// `period_start` of the candle the reading was derived from.
    pub period_start: i64,
}

/// Compute the Ichimoku lines and signal for a window sorted ascending by `period_start`.
///
/// Returns `None` while fewer than [`WINDOW_CAPACITY`] candles have been collected.
pub fn compute(candles: &[Candle], options: IchimokuOptions) -> Option<IchimokuReading> {
    if candles.len() < WINDOW_CAPACITY {
        return None;
    }

    let latest = candles.last()?;
    let price = latest.close;

    let tenkan_sen = midpoint(last_n(candles, TENKAN_PERIOD));
    let kijun_sen = midpoint(last_n(candles, KIJUN_PERIOD));
    let senkou_span_a = (tenkan_sen + kijun_sen) / 2.0;
    let senkou_span_b = midpoint(last_n(candles, SENKOU_B_PERIOD));
    let chikou_span = candles
        .len()
        .checked_sub(CHIKOU_DISPLACEMENT + 1)
        .map(|index| candles[index].close);

    let signal = cloud_signal(price, senkou_span_a, senkou_span_b);
    let confidence = options
        .confidence
        .then(|| confidence(signal, price, tenkan_sen, kijun_sen, chikou_span));

    Some(IchimokuReading {
        tenkan_sen,
        kijun_sen,
        senkou_span_a,
        senkou_span_b,
        chikou_span,
        price,
        signal,
        confidence,
        period_start: latest.period_start,
    })
}

/// Price above the cloud is a [`Signal::Buy`], below is a [`Signal::Sell`], inside is
/// [`Signal::Neutral`].
pub fn cloud_signal(price: f64, senkou_span_a: f64, senkou_span_b: f64) -> Signal {
    let cloud_top = senkou_span_a.max(senkou_span_b);
    let cloud_bottom = senkou_span_a.min(senkou_span_b);

    if price > cloud_top {
        Signal::Buy
    } else if price < cloud_bottom {
        Signal::Sell
    } else {
        Signal::Neutral
    }
}

/// Refine a signal using the conversion/base line ordering and the lagging span.
pub fn confidence(
    signal: Signal,
    price: f64,
    tenkan_sen: f64,
    kijun_sen: f64,
    chikou_span: Option<f64>,
) -> Confidence {
    match signal {
        Signal::Buy if price > tenkan_sen && tenkan_sen > kijun_sen => match chikou_span {
            Some(chikou) if price > chikou => Confidence::High,
            _ => Confidence::Medium,
        },
        Signal::Sell if price < tenkan_sen && tenkan_sen < kijun_sen => match chikou_span {
            Some(chikou) if price < chikou => Confidence::High,
            _ => Confidence::Medium,
        },
        _ => Confidence::Low,
    }
}

fn last_n(candles: &[Candle], n: usize) -> &[Candle] {
    &candles[candles.len().saturating_sub(n)..]
}

/// (highest high + lowest low) / 2
fn midpoint(candles: &[Candle]) -> f64 {
    let (highest, lowest) = candles.iter().fold(
        (f64::NEG_INFINITY, f64::INFINITY),
        |(highest, lowest), candle| (highest.max(candle.high), lowest.min(candle.low)),
    );
    (highest + lowest) / 2.0
}
