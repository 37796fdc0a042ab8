use crate::{
    WINDOW_CAPACITY,
    candle::Candle,
    config::{PairAlias, TrackedPair},
    ichimoku::{self, IchimokuOptions},
    registry::{IchimokuSignal, SignalRegistry},
    store::{CandleStore, UpsertOutcome},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::collections::BTreeMap;
use tracing::debug;

/// Candle collection progress of one pair towards the [`WINDOW_CAPACITY`] threshold.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionProgress {
    pub candles_collected: usize,
    pub candles_required: usize,
    /// 0.0 ..= 100.0
    pub percentage: f64,
    pub last_candle_time: Option<DateTime<Utc>>,
    pub has_signal: bool,
}

/// Point-in-time copy of every published signal plus collection diagnostics.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalSnapshot {
    pub signals: BTreeMap<SmolStr, IchimokuSignal>,
    pub progress: BTreeMap<SmolStr, CollectionProgress>,
    pub timestamp: DateTime<Utc>,
}

/// Process-wide state shared between the ingestion task and readers.
///
/// Every accepted candle is upserted into the [`CandleStore`], the pair's window is passed to
/// [`ichimoku::compute`], and any resulting signal is published to the [`SignalRegistry`].
#[derive(Debug)]
pub struct SignalEngine {
    pairs: Vec<TrackedPair>,
    store: CandleStore,
    registry: SignalRegistry,
    options: IchimokuOptions,
}

impl SignalEngine {
    pub fn new(pairs: Vec<TrackedPair>, aliases: Vec<PairAlias>) -> Self {
        Self::with_options(pairs, aliases, IchimokuOptions::default())
    }

    pub fn with_options(
        pairs: Vec<TrackedPair>,
        aliases: Vec<PairAlias>,
        options: IchimokuOptions,
    ) -> Self {
        let store = CandleStore::new(pairs.iter().map(|pair| pair.display.as_str()));
        Self {
            pairs,
            store,
            registry: SignalRegistry::new(aliases),
            options,
        }
    }

    pub fn pairs(&self) -> &[TrackedPair] {
        &self.pairs
    }

    pub fn store(&self) -> &CandleStore {
        &self.store
    }

    pub fn registry(&self) -> &SignalRegistry {
        &self.registry
    }

    /// Find the tracked pair for a symbol as it appears on the stream.
    pub fn pair_by_ws_symbol(&self, ws_symbol: &str) -> Option<&TrackedPair> {
        self.pairs.iter().find(|pair| pair.ws_symbol == ws_symbol)
    }

    /// Upsert a candle for a display pair and publish the recomputed signal, if the window is
    /// full enough to produce one.
    pub fn ingest(&self, pair: &str, candle: Candle) -> Option<IchimokuSignal> {
        let (outcome, window) = self.store.upsert(pair, candle);
        debug!(
            %pair,
            period_start = candle.period_start,
            close = candle.close,
            ?outcome,
            candles = window.len(),
            "upserted candle"
        );

        // Window unchanged, the published signal is still current
        if outcome == UpsertOutcome::Discarded {
            return None;
        }

        let reading = ichimoku::compute(&window, self.options)?;
        let signal = IchimokuSignal::from_reading(pair, &reading, Utc::now());
        self.registry.publish(signal.clone());

        Some(signal)
    }

    /// Collection progress for every pair with any collected history.
    pub fn progress(&self) -> BTreeMap<SmolStr, CollectionProgress> {
        self.store
            .summaries()
            .into_iter()
            .filter(|(_, len, _)| *len > 0)
            .map(|(pair, len, last)| {
                let percentage = (len as f64 / WINDOW_CAPACITY as f64 * 100.0).min(100.0);
                let progress = CollectionProgress {
                    candles_collected: len,
                    candles_required: WINDOW_CAPACITY,
                    percentage,
                    last_candle_time: last.map(|candle| candle.time()),
                    has_signal: self.registry.contains(&pair),
                };
                (pair, progress)
            })
            .collect()
    }

    /// Signal Query Service payload.
    pub fn snapshot(&self) -> SignalSnapshot {
        SignalSnapshot {
            signals: self.registry.snapshot(),
            progress: self.progress(),
            timestamp: Utc::now(),
        }
    }
}
