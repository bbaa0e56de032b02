//! End-to-end subscription flows over scripted providers.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal_macros::dec;
use serde_json::json;
use tokio::time::{sleep, timeout};

use finboard_market_stream::{
    ConfigUpdate, DataOrigin, ProviderChain, QuoteProvider, RawIndex, RawQuote, StreamConfig,
    StreamError, StreamEvent, StreamManager, StreamPayload, StreamRequest, SubscribeOptions,
    SYNTHETIC_SOURCE,
};

/// Fails its first `fail_first` quote calls, then serves a fixed quote.
struct ScriptedProvider {
    fail_first: usize,
    delay: Duration,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    fn new(fail_first: usize) -> Arc<Self> {
        Arc::new(Self {
            fail_first,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        })
    }

    /// Variant whose fetches take a while, for in-flight cancellation tests.
    fn slow(fail_first: usize, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            fail_first,
            delay,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QuoteProvider for ScriptedProvider {
    fn id(&self) -> &'static str {
        "SCRIPTED"
    }

    fn calls_per_minute(&self) -> u32 {
        60_000
    }

    async fn fetch_quote(&self, symbol: &str) -> Result<RawQuote, StreamError> {
        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.fail_first {
            return Err(StreamError::Transport {
                provider: "SCRIPTED".to_string(),
                status: Some(500),
                message: "HTTP 500".to_string(),
            });
        }
        let mut raw = RawQuote::for_symbol(symbol);
        raw.name = Some("Scripted Equity".to_string());
        raw.price = json!(1550.25);
        raw.previous_close = json!(1540.00);
        raw.volume = json!(1_250_000);
        Ok(raw)
    }

    async fn fetch_indices(&self) -> Result<Vec<RawIndex>, StreamError> {
        Ok(Vec::new())
    }
}

fn manager_over(provider: Arc<ScriptedProvider>, config: StreamConfig) -> StreamManager {
    StreamManager::with_config(ProviderChain::new(vec![provider]), config)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_retry_window_success_delivers_one_data_event() {
    let provider = ScriptedProvider::new(2);
    let config = StreamConfig {
        quote_interval: Duration::from_secs(60),
        retry_delay: Duration::from_millis(10),
        ..StreamConfig::default()
    };
    let manager = manager_over(provider.clone(), config);

    let mut handle = manager
        .subscribe(
            "watchlist",
            StreamRequest::quote("INFY.NS"),
            SubscribeOptions::default(),
        )
        .unwrap();

    let event = timeout(Duration::from_secs(2), handle.next_event())
        .await
        .expect("delivery within the retry window")
        .expect("subscription alive");

    match event {
        StreamEvent::Data(data) => {
            assert!(matches!(data.origin, DataOrigin::Provider(_)));
            match data.payload {
                StreamPayload::Quote(quote) => {
                    assert_eq!(quote.price, dec!(1550.25));
                    assert_eq!(quote.source, "SCRIPTED");
                }
                other => panic!("expected a single quote, got {:?}", other),
            }
        }
        other => panic!("expected live data, got {:?}", other),
    }
    assert_eq!(provider.calls(), 3);
    assert!(handle.try_next_event().is_none());

    let status = manager.status();
    assert!(status.connected);
    assert_eq!(status.retry_count, 0);
    assert!(status.last_update.is_some());
    assert!(status.last_latency.is_some());

    manager.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_retry_exhaustion_emits_one_error_then_fallback() {
    let provider = ScriptedProvider::new(usize::MAX);
    let config = StreamConfig {
        quote_interval: Duration::from_millis(200),
        max_retries: 2,
        retry_delay: Duration::from_millis(5),
        ..StreamConfig::default()
    };
    let manager = manager_over(provider.clone(), config);

    let mut handle = manager
        .subscribe(
            "broken",
            StreamRequest::quote("NTPC.NS"),
            SubscribeOptions::default(),
        )
        .unwrap();

    let first = timeout(Duration::from_secs(2), handle.next_event())
        .await
        .expect("exhaustion within window")
        .expect("subscription alive");
    assert!(matches!(
        first,
        StreamEvent::Error(StreamError::UpstreamExhausted { .. })
    ));

    let second = timeout(Duration::from_secs(2), handle.next_event())
        .await
        .expect("fallback follows the error")
        .expect("subscription alive");
    match second {
        StreamEvent::Data(data) => {
            assert_eq!(data.origin, DataOrigin::Fallback);
            match data.payload {
                StreamPayload::Quote(quote) => assert_eq!(quote.source, SYNTHETIC_SOURCE),
                other => panic!("expected a quote payload, got {:?}", other),
            }
        }
        other => panic!("expected fallback data, got {:?}", other),
    }

    let status = manager.status();
    assert!(!status.connected);
    assert_eq!(status.retry_count, 0);
    assert!(!status.recent_errors.is_empty());

    // The timer survives exhaustion: the next tick fails over again rather
    // than serving the (uncached) fallback from the cache.
    let third = timeout(Duration::from_secs(2), handle.next_event())
        .await
        .expect("timer still armed after exhaustion")
        .expect("subscription alive");
    assert!(third.is_error());

    manager.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_unsubscribe_before_first_tick_delivers_nothing() {
    let provider = ScriptedProvider::slow(0, Duration::from_millis(40));
    let config = StreamConfig {
        quote_interval: Duration::from_millis(50),
        ..StreamConfig::default()
    };
    let manager = manager_over(provider.clone(), config);

    let mut handle = manager
        .subscribe(
            "short-lived",
            StreamRequest::quote("TCS.NS"),
            SubscribeOptions::default(),
        )
        .unwrap();
    assert!(manager.unsubscribe("short-lived"));
    assert_eq!(manager.subscription_count(), 0);

    // Give a possible in-flight fetch time to complete and be discarded.
    sleep(Duration::from_millis(150)).await;
    assert!(handle.try_next_event().is_none());
    assert!(handle.next_event().await.is_none());
    assert!(provider.calls() <= 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_overlapping_subscriptions_share_one_provider_call() {
    let provider = ScriptedProvider::new(0);
    let config = StreamConfig {
        quote_interval: Duration::from_secs(60),
        ..StreamConfig::default()
    };
    let manager = manager_over(provider.clone(), config);

    let mut first = manager
        .subscribe(
            "dash-a",
            StreamRequest::quote("HDFCBANK.NS"),
            SubscribeOptions::default(),
        )
        .unwrap();
    let event = timeout(Duration::from_secs(2), first.next_event())
        .await
        .expect("first subscription fetches live")
        .expect("subscription alive");
    match event {
        StreamEvent::Data(data) => assert!(data.origin.is_live()),
        other => panic!("expected live data, got {:?}", other),
    }

    let mut second = manager
        .subscribe(
            "dash-b",
            StreamRequest::quote("HDFCBANK.NS"),
            SubscribeOptions::default(),
        )
        .unwrap();
    let event = timeout(Duration::from_secs(2), second.next_event())
        .await
        .expect("second subscription served promptly")
        .expect("subscription alive");
    match event {
        StreamEvent::Data(data) => assert_eq!(data.origin, DataOrigin::Cache),
        other => panic!("expected cached data, got {:?}", other),
    }

    assert_eq!(provider.calls(), 1);
    manager.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_dropped_handle_detaches_subscription() {
    let provider = ScriptedProvider::new(0);
    let config = StreamConfig {
        quote_interval: Duration::from_millis(20),
        ..StreamConfig::default()
    };
    let manager = manager_over(provider, config);

    let handle = manager
        .subscribe(
            "abandoned",
            StreamRequest::quote("SBIN.NS"),
            SubscribeOptions::default(),
        )
        .unwrap();
    assert_eq!(manager.subscription_count(), 1);
    drop(handle);

    timeout(Duration::from_secs(2), async {
        while manager.subscription_count() > 0 {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("subscription removes itself after the consumer goes away");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_suspend_stops_timer_but_refresh_still_fetches() {
    let provider = ScriptedProvider::new(0);
    let config = StreamConfig {
        quote_interval: Duration::from_millis(30),
        quote_ttl: Duration::from_millis(5),
        ..StreamConfig::default()
    };
    let manager = manager_over(provider.clone(), config);

    let mut handle = manager
        .subscribe(
            "widget",
            StreamRequest::quote("ITC.NS"),
            SubscribeOptions::default(),
        )
        .unwrap();
    timeout(Duration::from_secs(2), handle.next_event())
        .await
        .expect("initial delivery")
        .expect("subscription alive");

    manager.configure(ConfigUpdate::default().auto_refresh(false));

    // Drain whatever was in flight when the suspend landed, then confirm
    // the timer is quiet.
    sleep(Duration::from_millis(100)).await;
    while handle.try_next_event().is_some() {}
    sleep(Duration::from_millis(120)).await;
    assert!(handle.try_next_event().is_none());

    let calls_before = provider.calls();
    assert!(manager.refresh("widget").await);
    let event = handle.try_next_event().expect("manual refresh delivers");
    assert!(event.is_data());
    assert!(provider.calls() > calls_before);

    manager.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_status_watch_signals_connect_transition() {
    let provider = ScriptedProvider::new(0);
    let config = StreamConfig {
        quote_interval: Duration::from_secs(60),
        ..StreamConfig::default()
    };
    let manager = manager_over(provider, config);

    let mut status_watch = manager.status_watch();
    assert!(!status_watch.borrow().connected);

    let mut handle = manager
        .subscribe(
            "status-widget",
            StreamRequest::quote("WIPRO.NS"),
            SubscribeOptions::default(),
        )
        .unwrap();
    timeout(Duration::from_secs(2), handle.next_event())
        .await
        .expect("initial delivery")
        .expect("subscription alive");

    timeout(Duration::from_secs(1), async {
        while !status_watch.borrow_and_update().connected {
            status_watch.changed().await.expect("status sender alive");
        }
    })
    .await
    .expect("status flips to connected");

    manager.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_subscription_interval_override_beats_shared_config() {
    let provider = ScriptedProvider::new(0);
    let config = StreamConfig {
        quote_interval: Duration::from_secs(60),
        ..StreamConfig::default()
    };
    let manager = manager_over(provider, config);

    let mut handle = manager
        .subscribe(
            "fast-lane",
            StreamRequest::quote("ONGC.NS"),
            SubscribeOptions::default().interval(Duration::from_millis(25)),
        )
        .unwrap();

    for _ in 0..2 {
        let event = timeout(Duration::from_secs(2), handle.next_event())
            .await
            .expect("override cadence delivers well before the shared interval")
            .expect("subscription alive");
        assert!(event.is_data());
    }

    manager.shutdown().await;
}
