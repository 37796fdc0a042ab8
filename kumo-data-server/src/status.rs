use kumo_data::{WINDOW_CAPACITY, engine::SignalEngine, ingest::FeedStatus};
use std::{sync::Arc, time::Duration};
use tokio::{sync::watch, task::JoinHandle};
use tracing::info;

/// Periodically log per-pair collection progress. Read-only.
pub fn spawn_status_logger(
    engine: Arc<SignalEngine>,
    feed_status: watch::Receiver<FeedStatus>,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        // First tick fires immediately, the backfill summary already covers it
        interval.tick().await;

        loop {
            interval.tick().await;
            log_status(&engine, *feed_status.borrow());
        }
    })
}

/// One status line per tracked pair, returned for inspection.
pub fn log_status(engine: &SignalEngine, feed: FeedStatus) -> Vec<String> {
    let progress = engine.progress();

    engine
        .pairs()
        .iter()
        .map(|pair| {
            let line = match progress.get(&pair.display) {
                Some(progress) => format!(
                    "{}: {}/{} candles ({:.1}%), last candle {}, signal {}",
                    pair.display,
                    progress.candles_collected,
                    progress.candles_required,
                    progress.percentage,
                    progress
                        .last_candle_time
                        .map(|time| time.to_rfc3339())
                        .unwrap_or_else(|| "-".to_string()),
                    if progress.has_signal { "yes" } else { "no" },
                ),
                None => format!(
                    "{}: 0/{WINDOW_CAPACITY} candles (0.0%), last candle -, signal no",
                    pair.display
                ),
            };
            info!(feed = feed.as_str(), "{line}");
            line
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use kumo_data::{candle::Candle, config::TrackedPair};

    #[test]
    fn test_log_status_lines() {
        let engine = SignalEngine::new(
            vec![TrackedPair::new("XBT/USD"), TrackedPair::new("SOL/USD")],
            vec![],
        );
        for i in 1..=13 {
            engine.ingest(
                "XBT/USD",
                Candle {
                    period_start: 1_700_006_400 + i * 14_400,
                    open: 1.0,
                    high: 1.0,
                    low: 1.0,
                    close: 1.0,
                    volume: 1.0,
                },
            );
        }

        let lines = log_status(&engine, FeedStatus::Connected);

        assert_eq!(
            lines,
            vec![
                "XBT/USD: 13/52 candles (25.0%), last candle 2023-11-17T04:00:00+00:00, signal no"
                    .to_string(),
                "SOL/USD: 0/52 candles (0.0%), last candle -, signal no".to_string(),
            ]
        );
    }
}
