use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Duration of one candle in seconds (4 hours).
pub const CANDLE_INTERVAL_SECS: i64 = 4 * 60 * 60;

/// Normalised Kumo [`Candle`] model: one fixed-duration OHLC bar for one pair.
///
/// `period_start` is the unique key of a candle within a pair's window.
#[derive(Clone, Copy, PartialEq, PartialOrd, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Candle {
    /// Start-of-bar timestamp in seconds since the epoch.
    pub period_start: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    /// Traded volume within the bar.
    pub volume: f64,
}

impl Candle {
    /// Start-of-bar instant, falling back to the epoch for out-of-range timestamps.
    pub fn time(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.period_start, 0).unwrap_or_default()
    }
}

/// Align a timestamp in seconds down to the start of the interval it falls in.
#[inline]
pub fn align_to_interval(ts: i64, interval_secs: i64) -> i64 {
    ts.div_euclid(interval_secs) * interval_secs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candle_time() {
        let candle = Candle {
            period_start: 1_700_006_400,
            open: 1.0,
            high: 1.0,
            low: 1.0,
            close: 1.0,
            volume: 0.0,
        };
        assert_eq!(candle.time().to_rfc3339(), "2023-11-15T00:00:00+00:00");
    }

    #[test]
    fn test_align_to_interval() {
        assert_eq!(align_to_interval(1_700_006_400, CANDLE_INTERVAL_SECS), 1_700_006_400);
        assert_eq!(align_to_interval(1_700_006_401, CANDLE_INTERVAL_SECS), 1_700_006_400);
        assert_eq!(
            align_to_interval(1_700_006_400 + CANDLE_INTERVAL_SECS - 1, CANDLE_INTERVAL_SECS),
            1_700_006_400
        );
    }
}
