use crate::{
    config::PairAlias,
    ichimoku::{Confidence, IchimokuReading, Signal},
};
use chrono::{DateTime, Utc};
use fnv::FnvHashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Latest Ichimoku signal published for one display pair.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IchimokuSignal {
    pub pair: SmolStr,
    pub signal: Signal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<Confidence>,
    /// Latest close used for the determination.
    pub price: f64,
    pub tenkan_sen: f64,
    pub kijun_sen: f64,
    pub senkou_span_a: f64,
    pub senkou_span_b: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chikou_span: Option<f64>,
    /// Start of the candle the signal was derived from.
    pub timestamp: DateTime<Utc>,
    /// Wall-clock time the record was written.
    pub updated: DateTime<Utc>,
}

impl IchimokuSignal {
    pub fn from_reading(
        pair: impl Into<SmolStr>,
        reading: &IchimokuReading,
        updated: DateTime<Utc>,
    ) -> Self {
        Self {
            pair: pair.into(),
            signal: reading.signal,
            confidence: reading.confidence,
            price: reading.price,
            tenkan_sen: reading.tenkan_sen,
            kijun_sen: reading.kijun_sen,
            senkou_span_a: reading.senkou_span_a,
            senkou_span_b: reading.senkou_span_b,
            chikou_span: reading.chikou_span,
            timestamp: DateTime::from_timestamp(reading.period_start, 0).unwrap_or_default(),
            updated,
        }
    }
}

/// Transition of a pair's signal between two publishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalFlip {
    pub pair: SmolStr,
    pub from: Signal,
    pub to: Signal,
}

/// Latest signal per display pair.
///
/// Publishing the source pair of a [`PairAlias`] also overwrites the alias entry with the same
/// payload under the alias name.
#[derive(Debug, Default)]
pub struct SignalRegistry {
    aliases: Vec<PairAlias>,
    signals: RwLock<FnvHashMap<SmolStr, IchimokuSignal>>,
}

impl SignalRegistry {
    pub fn new(aliases: Vec<PairAlias>) -> Self {
        Self {
            aliases,
            signals: RwLock::new(FnvHashMap::default()),
        }
    }

    /// Overwrite the entry for `signal.pair` (and its aliases), returning the flip if the
    /// signal changed from the previously stored one.
    pub fn publish(&self, signal: IchimokuSignal) -> Option<SignalFlip> {
        let mirrors = self
            .aliases
            .iter()
            .filter(|alias| alias.source == signal.pair)
            .map(|alias| IchimokuSignal {
                pair: alias.alias.clone(),
                ..signal.clone()
            })
            .collect::<Vec<_>>();

        let mut signals = self.signals.write();

        let flip = signals
            .get(&signal.pair)
            .filter(|previous| previous.signal != signal.signal)
            .map(|previous| SignalFlip {
                pair: signal.pair.clone(),
                from: previous.signal,
                to: signal.signal,
            });

        for mirror in mirrors {
            debug!(source = %signal.pair, alias = %mirror.pair, "mirroring signal to alias");
            signals.insert(mirror.pair.clone(), mirror);
        }
        signals.insert(signal.pair.clone(), signal);
        drop(signals);

        if let Some(flip) = &flip {
            info!(pair = %flip.pair, from = %flip.from, to = %flip.to, "Ichimoku signal flipped");
        }

        flip
    }

    pub fn get(&self, pair: &str) -> Option<IchimokuSignal> {
        self.signals.read().get(pair).cloned()
    }

    pub fn contains(&self, pair: &str) -> bool {
        self.signals.read().contains_key(pair)
    }

    /// Copy of the full display pair -> latest signal mapping.
    pub fn snapshot(&self) -> BTreeMap<SmolStr, IchimokuSignal> {
        self.signals
            .read()
            .iter()
            .map(|(pair, signal)| (pair.clone(), signal.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signal(pair: &str, signal: Signal, price: f64) -> IchimokuSignal {
        IchimokuSignal {
            pair: SmolStr::new(pair),
            signal,
            confidence: Some(Confidence::Medium),
            price,
            tenkan_sen: 1.0,
            kijun_sen: 2.0,
            senkou_span_a: 1.5,
            senkou_span_b: 3.0,
            chikou_span: Some(4.0),
            timestamp: DateTime::from_timestamp(1_700_006_400, 0).unwrap(),
            updated: DateTime::from_timestamp(1_700_010_000, 0).unwrap(),
        }
    }

    fn registry() -> SignalRegistry {
        SignalRegistry::new(vec![PairAlias::new("XBT/USD", "BTC/USD")])
    }

    #[test]
    fn test_publish_alias_source_mirrors_entry() {
        let registry = registry();

        registry.publish(signal("XBT/USD", Signal::Buy, 42_000.0));

        let source = registry.get("XBT/USD").unwrap();
        let alias = registry.get("BTC/USD").unwrap();
        assert_eq!(alias.pair, "BTC/USD");
        assert_eq!(
            alias,
            IchimokuSignal {
                pair: SmolStr::new("BTC/USD"),
                ..source
            }
        );
    }

    #[test]
    fn test_publish_non_alias_pair_is_not_mirrored() {
        let registry = registry();

        registry.publish(signal("ETH/USD", Signal::Sell, 2_000.0));

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.contains_key("ETH/USD"));
        assert!(!registry.contains("BTC/USD"));
    }

    #[test]
    fn test_publish_overwrites_alias_with_latest_source() {
        let registry = registry();

        registry.publish(signal("XBT/USD", Signal::Buy, 42_000.0));
        registry.publish(signal("XBT/USD", Signal::Neutral, 41_000.0));

        let alias = registry.get("BTC/USD").unwrap();
        assert_eq!(alias.signal, Signal::Neutral);
        assert_eq!(alias.price, 41_000.0);
    }

    #[test]
    fn test_publish_detects_flip() {
        let registry = registry();

        assert_eq!(registry.publish(signal("ETH/USD", Signal::Buy, 1.0)), None);
        assert_eq!(registry.publish(signal("ETH/USD", Signal::Buy, 2.0)), None);

        let flip = registry.publish(signal("ETH/USD", Signal::Sell, 0.5));

        assert_eq!(
            flip,
            Some(SignalFlip {
                pair: SmolStr::new("ETH/USD"),
                from: Signal::Buy,
                to: Signal::Sell,
            })
        );
        assert_eq!(registry.get("ETH/USD").unwrap().signal, Signal::Sell);
    }

    #[test]
    fn test_multiple_aliases_for_one_source() {
        let registry = SignalRegistry::new(vec![
            PairAlias::new("XBT/USD", "BTC/USD"),
            PairAlias::new("XBT/USD", "XXBTZUSD"),
        ]);

        registry.publish(signal("XBT/USD", Signal::Buy, 1.0));

        let pairs: Vec<_> = registry.snapshot().into_keys().collect();
        assert_eq!(pairs, vec!["BTC/USD", "XBT/USD", "XXBTZUSD"]);
    }

    #[test]
    fn test_signal_serialises_camel_case() {
        let json = serde_json::to_value(signal("ETH/USD", Signal::Buy, 10.0)).unwrap();

        assert_eq!(json["pair"], "ETH/USD");
        assert_eq!(json["signal"], "BUY");
        assert_eq!(json["confidence"], "medium");
        assert_eq!(json["tenkanSen"], 1.0);
        assert_eq!(json["senkouSpanB"], 3.0);
        assert_eq!(json["timestamp"], "2023-11-15T00:00:00Z");
    }

    #[test]
    fn test_signal_without_confidence_omits_field() {
        let mut without = signal("ETH/USD", Signal::Neutral, 10.0);
        without.confidence = None;
        without.chikou_span = None;

        let json = serde_json::to_value(without).unwrap();

        assert!(json.get("confidence").is_none());
        assert!(json.get("chikouSpan").is_none());
    }
}
