//! Bounded per-pair candle windows.
//!
//! Every window holds at most [`WINDOW_CAPACITY`] candles, unique by `period_start` and sorted
//! ascending. An in-progress bar is upserted repeatedly under the same key until its period
//! rolls over.

use crate::{WINDOW_CAPACITY, candle::Candle};
use fnv::FnvHashMap;
use parking_lot::RwLock;
use smol_str::SmolStr;

/// What an [`CandleWindow::upsert`] did to the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// A candle with the same `period_start` was replaced in place.
    Replaced,
    /// The candle was appended and the window is still within capacity.
    Appended,
    /// The candle was appended and the oldest candle was dropped.
    Trimmed,
    /// The candle was older than every candle in a full window and was dropped itself.
    Discarded,
}

/// Ordered window of the most recent candles for one pair.
#[derive(Debug, Clone)]
pub struct CandleWindow {
    candles: Vec<Candle>,
    capacity: usize,
}

impl CandleWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            candles: Vec::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Insert or replace by `period_start`, trim to capacity, then re-sort ascending.
    pub fn upsert(&mut self, candle: Candle) -> UpsertOutcome {
        let outcome = match self
            .candles
            .iter_mut()
            .find(|existing| existing.period_start == candle.period_start)
        {
            Some(existing) => {
                *existing = candle;
                UpsertOutcome::Replaced
            }
            None => {
                self.candles.push(candle);
                UpsertOutcome::Appended
            }
        };

        // Out-of-order delivery is tolerated, so order before dropping the oldest
        self.candles.sort_by_key(|candle| candle.period_start);

        if self.candles.len() > self.capacity {
            let excess = self.candles.len() - self.capacity;
            let discarded = self
                .candles
                .drain(..excess)
                .any(|dropped| dropped.period_start == candle.period_start);
            return if discarded {
                UpsertOutcome::Discarded
            } else {
                UpsertOutcome::Trimmed
            };
        }

        outcome
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    /// Most recent candle, if any.
    pub fn last(&self) -> Option<&Candle> {
        self.candles.last()
    }

}

impl Default for CandleWindow {
    fn default() -> Self {
        Self::new(WINDOW_CAPACITY)
    }
}

/// Process-wide candle windows keyed by display pair.
///
/// Writes come from the single ingestion path; reads (status logger, query service) take a
/// short read lock and copy out.
#[derive(Debug, Default)]
pub struct CandleStore {
    windows: RwLock<FnvHashMap<SmolStr, CandleWindow>>,
}

impl CandleStore {
    /// Construct a store with an empty window for every provided pair.
    pub fn new<'a>(pairs: impl IntoIterator<Item = &'a str>) -> Self {
        let windows = pairs
            .into_iter()
            .map(|pair| (SmolStr::new(pair), CandleWindow::default()))
            .collect();

        Self {
            windows: RwLock::new(windows),
        }
    }

    /// Upsert a candle into the pair's window and return the resulting window contents.
    pub fn upsert(&self, pair: &str, candle: Candle) -> (UpsertOutcome, Vec<Candle>) {
        let mut windows = self.windows.write();
        let window = windows.entry(SmolStr::new(pair)).or_default();
        let outcome = window.upsert(candle);
        (outcome, window.candles().to_vec())
    }

    /// Current ordered window for a pair, empty if the pair has not been seen.
    pub fn window(&self, pair: &str) -> Vec<Candle> {
        self.windows
            .read()
            .get(pair)
            .map(|window| window.candles().to_vec())
            .unwrap_or_default()
    }

    /// Length and most recent candle of every known window.
    pub fn summaries(&self) -> Vec<(SmolStr, usize, Option<Candle>)> {
        self.windows
            .read()
            .iter()
            .map(|(pair, window)| (pair.clone(), window.len(), window.last().copied()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(period_start: i64, close: f64) -> Candle {
        Candle {
            period_start,
            open: close,
            high: close,
            low: close,
            close,
            volume: 1.0,
        }
    }

    fn is_sorted_unique(candles: &[Candle]) -> bool {
        candles
            .windows(2)
            .all(|pair| pair[0].period_start < pair[1].period_start)
    }

    #[test]
    fn test_window_upsert_replaces_in_place() {
        let mut window = CandleWindow::new(3);
        window.upsert(candle(1, 10.0));
        window.upsert(candle(2, 20.0));

        let outcome = window.upsert(candle(2, 21.5));

        assert_eq!(outcome, UpsertOutcome::Replaced);
        assert_eq!(window.len(), 2);
        assert_eq!(window.last().map(|c| c.close), Some(21.5));
    }

    #[test]
    fn test_window_upsert_beyond_capacity_drops_oldest() {
        let mut window = CandleWindow::new(3);
        for ts in 1..=3 {
            assert_eq!(window.upsert(candle(ts, ts as f64)), UpsertOutcome::Appended);
        }

        let outcome = window.upsert(candle(4, 4.0));

        assert_eq!(outcome, UpsertOutcome::Trimmed);
        let starts: Vec<_> = window.candles().iter().map(|c| c.period_start).collect();
        assert_eq!(starts, vec![2, 3, 4]);
    }

    #[test]
    fn test_window_upsert_out_of_order_is_sorted() {
        let mut window = CandleWindow::new(5);
        window.upsert(candle(30, 3.0));
        window.upsert(candle(10, 1.0));
        window.upsert(candle(20, 2.0));

        let starts: Vec<_> = window.candles().iter().map(|c| c.period_start).collect();
        assert_eq!(starts, vec![10, 20, 30]);
    }

    #[test]
    fn test_window_stale_candle_on_full_window_is_dropped() {
        let mut window = CandleWindow::new(2);
        window.upsert(candle(20, 2.0));
        window.upsert(candle(30, 3.0));

        let outcome = window.upsert(candle(10, 1.0));

        assert_eq!(outcome, UpsertOutcome::Discarded);
        let starts: Vec<_> = window.candles().iter().map(|c| c.period_start).collect();
        assert_eq!(starts, vec![20, 30]);
    }

    #[test]
    fn test_window_never_exceeds_capacity_and_stays_sorted() {
        let mut window = CandleWindow::default();

        // Interleave fresh, repeated and late period starts
        for step in 0..500_i64 {
            let period_start = (step * 7919) % 113;
            window.upsert(candle(period_start, step as f64));

            assert!(window.len() <= WINDOW_CAPACITY);
            assert!(is_sorted_unique(window.candles()));
        }
    }

    #[test]
    fn test_store_unknown_pair_has_empty_window() {
        let store = CandleStore::new(["ETH/USD"]);
        assert!(store.window("ETH/USD").is_empty());
        assert!(store.window("DOGE/USD").is_empty());
    }

    #[test]
    fn test_store_upsert_returns_window() {
        let store = CandleStore::new(["ETH/USD"]);
        store.upsert("ETH/USD", candle(2, 2.0));
        let (outcome, window) = store.upsert("ETH/USD", candle(1, 1.0));

        assert_eq!(outcome, UpsertOutcome::Appended);
        assert_eq!(window.len(), 2);
        assert_eq!(window[0].period_start, 1);
        assert_eq!(store.window("ETH/USD"), window);
    }
}
