//! # Kumo-Data
//! Streaming 4h OHLC candle windows and Ichimoku Cloud signals for the Kraken spot venue.
//!
//! Data flows in one direction:
//! ingestor ([`ingest`]) -> [`store::CandleStore`] -> [`ichimoku::compute`] ->
//! [`registry::SignalRegistry`] -> [`engine::SignalSnapshot`] consumers.
//!
//! All process-wide state lives in one injectable [`engine::SignalEngine`], shared as an
//! `Arc` between the ingestion task and readers.

/// All [`Error`](std::error::Error)s generated in Kumo-Data.
pub mod error;

/// Normalised OHLC [`Candle`](candle::Candle) model.
pub mod candle;

/// Bounded per-pair candle windows.
pub mod store;

/// Pure Ichimoku Cloud calculator and signal derivation.
pub mod ichimoku;

/// Latest signal per display pair, with alias mirroring.
pub mod registry;

/// [`SignalEngine`](engine::SignalEngine) wiring the store, calculator and registry together.
pub mod engine;

/// Tracked pairs, aliases and feed configuration.
pub mod config;

/// Market-data provider integrations.
pub mod exchange;

/// Historical backfill and the reconnecting live OHLC feed.
pub mod ingest;

/// Stream utilities used by the live feed.
pub mod streams;

/// Number of candles required before the calculator emits a signal, and the capacity of every
/// candle window.
pub const WINDOW_CAPACITY: usize = 52;

// Re-export commonly used types for convenience
pub use candle::Candle;
pub use engine::{CollectionProgress, SignalEngine, SignalSnapshot};
pub use error::DataError;
pub use ichimoku::{Confidence, IchimokuOptions, Signal};
pub use ingest::{BackfillResult, FeedStatus, HistoricalCandles};
pub use registry::IchimokuSignal;
