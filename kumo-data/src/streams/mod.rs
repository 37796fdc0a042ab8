/// Idle read timeout wrapper that ends a silent stream so the feed reconnects.
pub mod timeout;
