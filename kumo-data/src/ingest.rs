//! Candle ingestion: one-time historical backfill followed by the reconnecting live OHLC feed.
//!
//! The backfill must settle before [`spawn_ohlc_feed`] is called so live updates never compute
//! against an empty window. Reconnects re-subscribe every pair but never re-run the backfill;
//! already stored candles survive.

use crate::{
    WINDOW_CAPACITY,
    candle::Candle,
    config::{FeedConfig, TrackedPair},
    engine::SignalEngine,
    error::DataError,
    exchange::kraken::{
        channel::KrakenChannel,
        message::KrakenMessage,
        ping_request, subscription_requests,
    },
    registry::IchimokuSignal,
    streams::timeout::TimeoutStream,
};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use smol_str::SmolStr;
use std::{collections::BTreeMap, sync::Arc};
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

/// Source of historical candles used for the startup backfill.
#[async_trait]
pub trait HistoricalCandles: Send + Sync {
    async fn fetch_candles(&self, pair: &TrackedPair) -> Result<Vec<Candle>, DataError>;
}

/// Backfill result for a pair
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackfillResult {
    pub candles_loaded: usize,
    pub signal_published: bool,
}

/// Backfill every tracked pair, one at a time.
///
/// A failure for one pair is logged and leaves that pair's window empty; the remaining pairs
/// are still backfilled.
pub async fn backfill_all<Source>(
    engine: &SignalEngine,
    source: &Source,
) -> BTreeMap<SmolStr, BackfillResult>
where
    Source: HistoricalCandles + ?Sized,
{
    let mut results = BTreeMap::new();

    for pair in engine.pairs() {
        let result = match source.fetch_candles(pair).await {
            Ok(candles) => backfill_pair(engine, pair, candles),
            Err(error) => {
                warn!(pair = %pair.display, %error, "backfill failed");
                BackfillResult::default()
            }
        };

        info!(
            pair = %pair.display,
            candles = result.candles_loaded,
            signal = result.signal_published,
            "backfill complete"
        );
        results.insert(pair.display.clone(), result);
    }

    results
}

fn backfill_pair(
    engine: &SignalEngine,
    pair: &TrackedPair,
    mut candles: Vec<Candle>,
) -> BackfillResult {
    // Only the most recent bars can survive in the window
    candles.sort_by_key(|candle| candle.period_start);
    let skip = candles.len().saturating_sub(WINDOW_CAPACITY);

    let mut result = BackfillResult::default();
    for candle in candles.into_iter().skip(skip) {
        result.signal_published |= engine.ingest(&pair.display, candle).is_some();
        result.candles_loaded += 1;
    }
    result
}

/// Connection status of the live feed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedStatus {
    Connecting,
    Connected,
    Disconnected,
}

impl FeedStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedStatus::Connecting => "connecting",
            FeedStatus::Connected => "connected",
            FeedStatus::Disconnected => "disconnected",
        }
    }
}

/// Spawn the live OHLC feed.
///
/// The task runs until aborted: every disconnect is followed by a fixed
/// [`FeedConfig::reconnect_delay`] and a full re-subscription.
pub fn spawn_ohlc_feed(
    engine: Arc<SignalEngine>,
    config: FeedConfig,
    status_tx: watch::Sender<FeedStatus>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        run_feed_loop(engine, config, status_tx).await;
    })
}

async fn run_feed_loop(
    engine: Arc<SignalEngine>,
    config: FeedConfig,
    status_tx: watch::Sender<FeedStatus>,
) {
    let channel = KrakenChannel::ohlc(config.interval_minutes);
    info!(url = %config.url, pairs = engine.pairs().len(), "Starting Kraken OHLC feed");

    loop {
        let _ = status_tx.send(FeedStatus::Connecting);

        match connect_async(config.url.as_str()).await {
            Ok((ws_stream, _)) => {
                info!(url = %config.url, "Connected to Kraken OHLC feed");
                let _ = status_tx.send(FeedStatus::Connected);

                let (mut write, read) = ws_stream.split();

                let mut subscribed = true;
                for request in subscription_requests(engine.pairs(), channel) {
                    if let Err(error) = write.send(request).await {
                        error!(%error, "Failed to send subscription request");
                        subscribed = false;
                        break;
                    }
                }

                if subscribed {
                    // Spawn ping task to keep connection alive
                    let ping_interval = config.ping_interval;
                    let (ping_shutdown_tx, mut ping_shutdown_rx) = mpsc::channel::<()>(1);

                    tokio::spawn(async move {
                        let mut interval = tokio::time::interval(ping_interval);
                        let mut reqid = 0_u64;
                        loop {
                            tokio::select! {
                                _ = interval.tick() => {
                                    reqid += 1;
                                    if write.send(ping_request(reqid)).await.is_err() {
                                        debug!("Failed to send ping, connection likely dead");
                                        break;
                                    }
                                }
                                _ = ping_shutdown_rx.recv() => {
                                    debug!("Ping task shutting down");
                                    break;
                                }
                            }
                        }
                    });

                    let mut read = TimeoutStream::new(read, config.read_timeout);
                    while let Some(message) = read.next().await {
                        match message {
                            Ok(Message::Text(text)) => {
                                process_message(&engine, channel, text.as_str());
                            }
                            Ok(Message::Close(frame)) => {
                                info!(?frame, "Kraken closed the connection");
                                break;
                            }
                            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                                // Heartbeat messages - tungstenite handles these automatically
                            }
                            Ok(_) => {}
                            Err(error) => {
                                let error = DataError::from(error);
                                if error.is_terminal() {
                                    error!(%error, "Kraken OHLC feed transport error");
                                    break;
                                }
                                warn!(%error, "Kraken OHLC feed non-terminal error");
                            }
                        }
                    }

                    if read.timed_out() {
                        warn!(
                            timeout = ?config.read_timeout,
                            "No data received from Kraken within read timeout, reconnecting"
                        );
                    }

                    let _ = ping_shutdown_tx.send(()).await;
                }

                let _ = status_tx.send(FeedStatus::Disconnected);
                warn!("Kraken OHLC feed disconnected, will reconnect...");
            }
            Err(error) => {
                error!(url = %config.url, %error, "Failed to connect to Kraken OHLC feed");
                let _ = status_tx.send(FeedStatus::Disconnected);
            }
        }

        debug!(delay = ?config.reconnect_delay, "Waiting before reconnecting...");
        tokio::time::sleep(config.reconnect_delay).await;
    }
}

/// Decode one text frame and ingest it if it is an OHLC update for a tracked pair.
///
/// Malformed and unrecognised messages are logged and dropped.
pub fn process_message(
    engine: &SignalEngine,
    channel: KrakenChannel,
    text: &str,
) -> Option<IchimokuSignal> {
    match KrakenMessage::parse(text) {
        Ok(KrakenMessage::Ohlc(ohlc)) => {
            if !channel.matches(&ohlc.channel_name) {
                debug!(
                    channel = %ohlc.channel_name,
                    expected = %channel.channel_name(),
                    "ignoring OHLC update for other interval"
                );
                return None;
            }

            let Some(pair) = engine.pair_by_ws_symbol(&ohlc.pair) else {
                debug!(pair = %ohlc.pair, "ignoring OHLC update for untracked pair");
                return None;
            };

            match ohlc.bar.to_candle(channel.interval_secs()) {
                Ok(candle) => engine.ingest(&pair.display, candle),
                Err(error) => {
                    warn!(pair = %ohlc.pair, %error, "dropping malformed OHLC bar");
                    None
                }
            }
        }
        Ok(KrakenMessage::Event(event)) if event.is_error() => {
            warn!(
                event = %event.event,
                pair = ?event.pair,
                message = ?event.error_message,
                "Kraken reported an error"
            );
            None
        }
        Ok(KrakenMessage::Event(event)) => {
            debug!(event = %event.event, status = ?event.status, pair = ?event.pair, "Kraken event");
            None
        }
        Ok(KrakenMessage::Ignore) => None,
        Err(error) => {
            warn!(
                %error,
                payload = %truncate(text, 100),
                "dropping malformed feed message"
            );
            None
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::PairAlias, ichimoku::Signal};
    use fnv::FnvHashMap;
    use std::time::Duration;
    use tokio::{
        net::{TcpListener, TcpStream},
        time::timeout,
    };
    use tokio_tungstenite::{WebSocketStream, accept_async};

    const OHLC_ETH: &str = r#"[42,["1700007012.345678","1700020800.000000","2000.1","2010.0","1990.2","2005.9","2001.4","12.5",61],"ohlc-240","ETH/USD"]"#;

    fn engine() -> SignalEngine {
        SignalEngine::new(
            vec![
                TrackedPair::new("XBT/USD"),
                TrackedPair::new("ETH/USD"),
                TrackedPair::new("SOL/USD"),
            ],
            vec![PairAlias::new("XBT/USD", "BTC/USD")],
        )
    }

    fn candles(count: i64) -> Vec<Candle> {
        (1..=count)
            .map(|i| Candle {
                period_start: i * 14_400,
                open: i as f64,
                high: i as f64,
                low: i as f64,
                close: i as f64,
                volume: 1.0,
            })
            .collect()
    }

    struct StubHistory {
        candles: FnvHashMap<SmolStr, Vec<Candle>>,
    }

    #[async_trait]
    impl HistoricalCandles for StubHistory {
        async fn fetch_candles(&self, pair: &TrackedPair) -> Result<Vec<Candle>, DataError> {
            self.candles
                .get(&pair.rest_symbol)
                .cloned()
                .ok_or_else(|| DataError::Provider(vec!["EQuery:Unknown asset pair".to_string()]))
        }
    }

    #[test]
    fn test_process_message_ingests_tracked_ohlc_update() {
        let engine = engine();

        let signal = process_message(&engine, KrakenChannel::ohlc(240), OHLC_ETH);

        assert_eq!(signal, None);
        let window = engine.store().window("ETH/USD");
        assert_eq!(window.len(), 1);
        assert_eq!(window[0].period_start, 1_700_006_400);
        assert_eq!(window[0].close, 2005.9);
    }

    #[test]
    fn test_process_message_drops_unusable_messages() {
        let engine = engine();
        let channel = KrakenChannel::ohlc(240);

        let inputs = [
            // other interval
            r#"[42,["1700007012.3","1700007300.0","1","1","1","1","1","1",1],"ohlc-5","ETH/USD"]"#,
            // untracked pair
            r#"[42,["1700007012.3","1700020800.0","1","1","1","1","1","1",1],"ohlc-240","DOGE/USD"]"#,
            // malformed bar
            r#"[42,["1700007012.3","1700020800.0","1"],"ohlc-240","ETH/USD"]"#,
            // inverted range
            r#"[42,["1700007012.3","1700020800.0","1","0.5","1","1","1","1",1],"ohlc-240","ETH/USD"]"#,
            // not json
            "definitely not json",
            r#"{"event":"heartbeat"}"#,
            r#"{"errorMessage":"Currency pair not supported","event":"subscriptionStatus","status":"error"}"#,
        ];

        for input in inputs {
            assert_eq!(process_message(&engine, channel, input), None, "{input}");
        }
        assert!(engine.progress().is_empty());
    }

    #[test]
    fn test_process_message_publishes_signal_on_52nd_candle() {
        let engine = engine();
        let channel = KrakenChannel::ohlc(240);
        for candle in candles(51) {
            engine.ingest("XBT/USD", candle);
        }
        assert!(engine.registry().snapshot().is_empty());

        let message = format!(
            r#"[42,["{t}.5","{e}.0","52","52","52","52","52","1",1],"ohlc-240","XBT/USD"]"#,
            t = 52 * 14_400 + 10,
            e = 53 * 14_400,
        );
        let signal = process_message(&engine, channel, &message).unwrap();

        assert_eq!(signal.signal, Signal::Buy);
        assert_eq!(signal.timestamp, candles(52)[51].time());
        let snapshot = engine.registry().snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot["BTC/USD"].price, 52.0);
    }

    #[tokio::test]
    async fn test_backfill_failure_is_contained_to_one_pair() {
        let engine = engine();
        let source = StubHistory {
            candles: [
                (SmolStr::new("XBTUSD"), candles(60)),
                (SmolStr::new("SOLUSD"), candles(10)),
            ]
            .into_iter()
            .collect(),
        };

        let results = backfill_all(&engine, &source).await;

        assert_eq!(
            results["XBT/USD"],
            BackfillResult {
                candles_loaded: 52,
                signal_published: true
            }
        );
        assert_eq!(results["ETH/USD"], BackfillResult::default());
        assert_eq!(
            results["SOL/USD"],
            BackfillResult {
                candles_loaded: 10,
                signal_published: false
            }
        );

        assert_eq!(engine.store().window("XBT/USD").len(), 52);
        assert_eq!(engine.store().window("XBT/USD")[0].period_start, 9 * 14_400);
        assert!(engine.store().window("ETH/USD").is_empty());
        assert!(engine.registry().get("BTC/USD").is_some());
    }

    #[tokio::test]
    async fn test_backfill_then_live_update_recomputes() {
        let engine = engine();
        let source = StubHistory {
            candles: [(SmolStr::new("ETHUSD"), candles(52))].into_iter().collect(),
        };
        backfill_all(&engine, &source).await;

        // in-progress update of the latest bar collapses below the cloud
        let message = format!(
            r#"[42,["{t}.5","{e}.0","52","52","1","1","1","1",1],"ohlc-240","ETH/USD"]"#,
            t = 52 * 14_400 + 10,
            e = 53 * 14_400,
        );
        let signal = process_message(&engine, KrakenChannel::ohlc(240), &message).unwrap();

        assert_eq!(engine.store().window("ETH/USD").len(), 52);
        assert_eq!(signal.signal, Signal::Sell);
    }

    async fn accept(listener: &TcpListener) -> WebSocketStream<TcpStream> {
        let (stream, _) = timeout(Duration::from_secs(5), listener.accept())
            .await
            .expect("feed did not connect in time")
            .unwrap();
        accept_async(stream).await.unwrap()
    }

    async fn read_subscribed_pairs(
        session: &mut WebSocketStream<TcpStream>,
        expected: usize,
    ) -> Vec<String> {
        let mut pairs = Vec::new();
        while pairs.len() < expected {
            let message = timeout(Duration::from_secs(5), session.next())
                .await
                .expect("no subscription received in time")
                .unwrap()
                .unwrap();

            let Message::Text(text) = message else {
                continue;
            };
            let request: serde_json::Value = serde_json::from_str(text.as_str()).unwrap();
            if request["event"] == "subscribe" {
                assert_eq!(request["subscription"]["name"], "ohlc");
                assert_eq!(request["subscription"]["interval"], 240);
                pairs.push(request["pair"][0].as_str().unwrap().to_string());
            }
        }
        pairs
    }

    #[tokio::test]
    async fn test_reconnect_resubscribes_every_pair_and_keeps_candles() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());

        let engine = Arc::new(engine());
        let config = FeedConfig::new(url).with_reconnect_delay(Duration::from_millis(50));
        let (status_tx, status_rx) = watch::channel(FeedStatus::Disconnected);
        let feed = spawn_ohlc_feed(Arc::clone(&engine), config, status_tx);

        // First session: deliver one bar, then close the transport
        let mut session = accept(&listener).await;
        let first = read_subscribed_pairs(&mut session, 3).await;
        session.send(Message::Text(OHLC_ETH.into())).await.unwrap();
        session.close(None).await.unwrap();
        drop(session);

        // Second session after the reconnect delay
        let mut session = accept(&listener).await;
        let second = read_subscribed_pairs(&mut session, 3).await;

        assert_eq!(first, vec!["XBT/USD", "ETH/USD", "SOL/USD"]);
        assert_eq!(second, first);
        assert_eq!(engine.store().window("ETH/USD").len(), 1);
        assert_eq!(*status_rx.borrow(), FeedStatus::Connected);

        feed.abort();
    }

    #[tokio::test]
    async fn test_feed_sends_keepalive_ping() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());

        let engine = Arc::new(engine());
        let config = FeedConfig::new(url).with_ping_interval(Duration::from_millis(100));
        let (status_tx, _status_rx) = watch::channel(FeedStatus::Disconnected);
        let feed = spawn_ohlc_feed(Arc::clone(&engine), config, status_tx);

        let mut session = accept(&listener).await;
        let mut reqids = Vec::new();
        while reqids.len() < 2 {
            let message = timeout(Duration::from_secs(5), session.next())
                .await
                .expect("no ping received in time")
                .unwrap()
                .unwrap();

            let Message::Text(text) = message else {
                continue;
            };
            let request: serde_json::Value = serde_json::from_str(text.as_str()).unwrap();
            if request["event"] == "ping" {
                reqids.push(request["reqid"].as_u64().expect("ping without numeric reqid"));
            }
        }

        assert_ne!(reqids[0], reqids[1]);

        feed.abort();
    }
}
