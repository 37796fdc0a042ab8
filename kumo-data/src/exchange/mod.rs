/// `Kraken` spot market-data integration: streaming OHLC, REST backfill and order-flow
/// snapshots.
pub mod kraken;
