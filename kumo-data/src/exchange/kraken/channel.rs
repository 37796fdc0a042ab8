use serde::Serialize;

/// Type that defines a [`Kraken`](super) WebSocket channel and the interval it is subscribed
/// with.
///
/// See docs: <https://docs.kraken.com/api/docs/websocket-v1/ohlc>
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize)]
pub struct KrakenChannel {
    pub name: &'static str,
    pub interval: u32,
}

impl KrakenChannel {
    /// [`Kraken`](super) OHLC channel name.
    pub const OHLC: &'static str = "ohlc";

    /// OHLC channel for the provided interval in minutes.
    pub fn ohlc(interval: u32) -> Self {
        Self {
            name: Self::OHLC,
            interval,
        }
    }

    /// Channel name as tagged on incoming messages, eg/ "ohlc-240".
    pub fn channel_name(&self) -> String {
        format!("{}-{}", self.name, self.interval)
    }

    /// Channel interval in seconds.
    pub fn interval_secs(&self) -> i64 {
        i64::from(self.interval) * 60
    }

    /// Determine if an incoming message channel name belongs to this channel.
    pub fn matches(&self, channel_name: &str) -> bool {
        channel_name
            .split_once('-')
            .is_some_and(|(name, interval)| {
                name == self.name && interval.parse::<u32>().ok() == Some(self.interval)
            })
    }
}
