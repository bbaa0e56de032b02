use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use log::{debug, info, warn};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep, sleep_until, Instant};

use crate::chain::{ChainFetch, DataOrigin, ProviderChain, ResponseCache};
use crate::errors::StreamError;
use crate::models::{StreamPayload, StreamRequest, StreamStatus, SubscriptionId, SymbolMatch};
use crate::provider::providers_from_env;

use super::config::{ConfigUpdate, StreamConfig};
use super::subscription::{StreamData, StreamEvent, SubscribeOptions, SubscriptionHandle};

/// Orchestrates all polling subscriptions over one provider chain.
///
/// Explicitly constructed and cheap to clone (all state lives behind an
/// `Arc`), so one instance can be handed to every widget that needs it and
/// tests can spin up as many isolated managers as they like. Each
/// subscription runs as its own tokio task; the manager owns the shared
/// cache, the runtime configuration, and the global [`StreamStatus`].
///
/// Call [`shutdown`](Self::shutdown) for deterministic teardown: it signals
/// every task and joins them. Without it, tasks linger until their consumers
/// drop their handles.
#[derive(Clone)]
pub struct StreamManager {
    inner: Arc<ManagerInner>,
}

struct ManagerInner {
    chain: ProviderChain,
    cache: ResponseCache<StreamPayload>,
    subscriptions: Mutex<HashMap<SubscriptionId, ActiveSubscription>>,
    status_tx: watch::Sender<StreamStatus>,
    config_tx: watch::Sender<StreamConfig>,
    next_seq: AtomicU64,
}

/// Registry entry for one live subscription.
struct ActiveSubscription {
    request: StreamRequest,
    shutdown: watch::Sender<bool>,
    refresh: mpsc::UnboundedSender<oneshot::Sender<()>>,
    task: JoinHandle<()>,
    seq: u64,
}

impl StreamManager {
    /// Manager over the given chain with default configuration.
    pub fn new(chain: ProviderChain) -> Self {
        Self::with_config(chain, StreamConfig::default())
    }

    pub fn with_config(chain: ProviderChain, config: StreamConfig) -> Self {
        let (status_tx, _) = watch::channel(StreamStatus::default());
        let (config_tx, _) = watch::channel(config);
        Self {
            inner: Arc::new(ManagerInner {
                chain,
                cache: ResponseCache::new(),
                subscriptions: Mutex::new(HashMap::new()),
                status_tx,
                config_tx,
                next_seq: AtomicU64::new(0),
            }),
        }
    }

    /// Convenience constructor over the providers whose API keys are present
    /// in the environment.
    pub fn from_env() -> Self {
        Self::new(ProviderChain::new(providers_from_env()))
    }

    /// Registers a subscription and spawns its polling task. Must be called
    /// from within a tokio runtime.
    ///
    /// Returns `None` when `id` is already live; the existing subscription
    /// keeps running untouched. While auto-refresh is enabled the first fetch
    /// happens immediately, then the timer takes over.
    pub fn subscribe(
        &self,
        id: impl Into<SubscriptionId>,
        request: StreamRequest,
        options: SubscribeOptions,
    ) -> Option<SubscriptionHandle> {
        let id = id.into();
        let mut subscriptions = self.inner.lock_subscriptions();
        if subscriptions.contains_key(&id) {
            debug!("Stream: subscription '{}' already active, ignoring", id);
            return None;
        }

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (refresh_tx, refresh_rx) = mpsc::unbounded_channel();
        let seq = self.inner.next_seq.fetch_add(1, Ordering::Relaxed);

        let worker = SubscriptionWorker {
            inner: Arc::clone(&self.inner),
            id: id.clone(),
            seq,
            request: request.clone(),
            options,
            events: event_tx,
            shutdown: shutdown_rx,
            refresh: refresh_rx,
            config: self.inner.config_tx.subscribe(),
            detached: false,
        };
        let task = tokio::spawn(worker.run());

        info!("Stream: subscribed '{}' to {}", id, request.describe());
        subscriptions.insert(
            id.clone(),
            ActiveSubscription {
                request,
                shutdown: shutdown_tx,
                refresh: refresh_tx,
                task,
                seq,
            },
        );

        Some(SubscriptionHandle::new(
            id,
            event_rx,
            self.inner.status_tx.subscribe(),
        ))
    }

    /// Stops the subscription's polling task and removes it from the
    /// registry. Idempotent; returns whether anything was removed.
    ///
    /// An in-flight fetch is allowed to complete; its result is discarded.
    pub fn unsubscribe(&self, id: &str) -> bool {
        let removed = self.inner.lock_subscriptions().remove(id);
        match removed {
            Some(entry) => {
                let _ = entry.shutdown.send(true);
                info!("Stream: unsubscribed '{}'", id);
                true
            }
            None => {
                debug!("Stream: unsubscribe for unknown id '{}'", id);
                false
            }
        }
    }

    /// Triggers one immediate out-of-band tick for the subscription and
    /// waits for it to complete. Works also while auto-refresh is suspended.
    /// Returns false for an unknown id.
    pub async fn refresh(&self, id: &str) -> bool {
        let ack = {
            let subscriptions = self.inner.lock_subscriptions();
            let Some(entry) = subscriptions.get(id) else {
                debug!("Stream: refresh for unknown id '{}'", id);
                return false;
            };
            let (ack_tx, ack_rx) = oneshot::channel();
            if entry.refresh.send(ack_tx).is_err() {
                return false;
            }
            ack_rx
        };
        ack.await.is_ok()
    }

    /// Refreshes every registered subscription, waiting for all ticks.
    pub async fn refresh_all(&self) {
        let ids: Vec<SubscriptionId> = self.inner.lock_subscriptions().keys().cloned().collect();
        if ids.is_empty() {
            return;
        }
        debug!("Stream: manual refresh of {} subscription(s)", ids.len());
        futures::future::join_all(ids.iter().map(|id| self.refresh(id))).await;
    }

    /// Applies a partial configuration update and broadcasts it to every
    /// polling loop; timers re-arm at the new cadence. Setting
    /// `auto_refresh` to false suspends all timers without touching the
    /// registry.
    pub fn configure(&self, update: ConfigUpdate) {
        self.inner.config_tx.send_modify(|config| update.apply_to(config));
        info!("Stream: configuration updated");
    }

    /// Current runtime configuration.
    pub fn config(&self) -> StreamConfig {
        self.inner.config_tx.borrow().clone()
    }

    /// Snapshot of the shared connectivity status.
    pub fn status(&self) -> StreamStatus {
        self.inner.status_tx.borrow().clone()
    }

    /// Receiver for awaiting status changes; every subscription observes the
    /// same status through an identical receiver.
    pub fn status_watch(&self) -> watch::Receiver<StreamStatus> {
        self.inner.status_tx.subscribe()
    }

    /// One-shot symbol lookup, outside the polling engine.
    pub async fn search(&self, query: &str) -> Result<Vec<SymbolMatch>, StreamError> {
        self.inner.chain.search(query).await
    }

    /// The underlying provider chain, for circuit inspection and resets.
    pub fn chain(&self) -> &ProviderChain {
        &self.inner.chain
    }

    pub fn subscription_count(&self) -> usize {
        self.inner.lock_subscriptions().len()
    }

    /// Active subscription ids with the request each one polls.
    pub fn subscriptions(&self) -> Vec<(SubscriptionId, StreamRequest)> {
        self.inner
            .lock_subscriptions()
            .iter()
            .map(|(id, entry)| (id.clone(), entry.request.clone()))
            .collect()
    }

    /// Signals every polling task and joins them. Safe to call twice.
    pub async fn shutdown(&self) {
        let entries: Vec<ActiveSubscription> = {
            let mut subscriptions = self.inner.lock_subscriptions();
            subscriptions.drain().map(|(_, entry)| entry).collect()
        };
        if entries.is_empty() {
            return;
        }

        for entry in &entries {
            let _ = entry.shutdown.send(true);
        }
        for entry in entries {
            if entry.task.await.is_err() {
                warn!("Stream: a subscription task panicked during shutdown");
            }
        }
        info!("Stream: manager shut down");
    }
}

impl ManagerInner {
    fn lock_subscriptions(&self) -> MutexGuard<'_, HashMap<SubscriptionId, ActiveSubscription>> {
        self.subscriptions.lock().unwrap_or_else(|poisoned| {
            warn!("Stream: subscription registry lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn mark_connected(&self, latency: Duration) {
        self.status_tx.send_modify(|status| {
            status.connected = true;
            status.last_update = Some(Utc::now());
            status.retry_count = 0;
            status.last_latency = Some(latency);
        });
    }

    fn mark_retrying(&self, retries: u32) {
        self.status_tx.send_modify(|status| status.retry_count = retries);
    }

    fn mark_disconnected(&self, error: &StreamError) {
        self.status_tx.send_modify(|status| {
            status.connected = false;
            status.retry_count = 0;
            status.record_error(error.to_string());
        });
    }
}

/// The polling loop behind one subscription.
///
/// Runs until unsubscribed, shut down, or its consumer drops the handle.
/// Ticks are strictly sequential per subscription: the loop body runs to
/// completion before the next firing is considered, so a slow fetch skips
/// missed firings instead of stacking duplicate in-flight requests.
struct SubscriptionWorker {
    inner: Arc<ManagerInner>,
    id: SubscriptionId,
    seq: u64,
    request: StreamRequest,
    options: SubscribeOptions,
    events: mpsc::UnboundedSender<StreamEvent>,
    shutdown: watch::Receiver<bool>,
    refresh: mpsc::UnboundedReceiver<oneshot::Sender<()>>,
    config: watch::Receiver<StreamConfig>,
    detached: bool,
}

impl SubscriptionWorker {
    async fn run(mut self) {
        debug!(
            "Stream: '{}' polling loop started ({})",
            self.id,
            self.request.describe()
        );
        // Fires immediately on the first pass while auto-refresh is on.
        let mut deadline = Instant::now();

        loop {
            // A shutdown observed mid-tick was already consumed from the
            // watch, so the current value has to be re-checked here.
            if *self.shutdown.borrow() {
                break;
            }
            let auto_refresh = self.config.borrow().auto_refresh;

            tokio::select! {
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        break;
                    }
                }
                command = self.refresh.recv() => {
                    match command {
                        Some(ack) => {
                            self.tick().await;
                            let _ = ack.send(());
                        }
                        None => break,
                    }
                }
                changed = self.config.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    deadline = Instant::now() + self.effective_interval();
                    debug!("Stream: '{}' timer re-armed at new cadence", self.id);
                }
                _ = sleep_until(deadline), if auto_refresh => {
                    self.tick().await;
                    deadline = Instant::now() + self.effective_interval();
                }
            }

            if self.detached {
                self.remove_self();
                break;
            }
        }
        debug!("Stream: '{}' polling loop ended", self.id);
    }

    fn effective_interval(&self) -> Duration {
        self.options
            .interval
            .unwrap_or_else(|| self.config.borrow().interval_for(self.request.kind()))
    }

    /// One tick: cache, then the chain with linear-backoff retries.
    async fn tick(&mut self) {
        let key = self.request.cache_key();
        if let Some(payload) = self.inner.cache.get(&key) {
            debug!("Stream: '{}' served from cache", self.id);
            self.deliver(StreamEvent::Data(StreamData {
                payload,
                origin: DataOrigin::Cache,
            }));
            return;
        }

        let (max_retries, retry_delay, ttl) = {
            let config = self.config.borrow();
            (
                self.options.max_retries.unwrap_or(config.max_retries),
                self.options.retry_delay.unwrap_or(config.retry_delay),
                config.ttl_for(self.request.kind()),
            )
        };

        let mut retries = 0u32;
        loop {
            let started = Instant::now();
            let fetched = self.fetch().await;
            if *self.shutdown.borrow() {
                // Result of an in-flight fetch after shutdown is discarded.
                return;
            }

            match fetched.failure {
                None => {
                    if fetched.origin.is_live() {
                        self.inner.cache.set(&key, fetched.data.clone(), ttl);
                        self.inner.mark_connected(started.elapsed());
                    }
                    self.deliver(StreamEvent::Data(StreamData {
                        payload: fetched.data,
                        origin: fetched.origin,
                    }));
                    return;
                }
                Some(error) if retries < max_retries => {
                    retries += 1;
                    self.inner.mark_retrying(retries);
                    let delay = retry_delay * retries;
                    warn!(
                        "Stream: '{}' degraded ({}), retry {}/{} in {:?}",
                        self.id, error, retries, max_retries, delay
                    );
                    if self.backoff(delay).await {
                        return;
                    }
                }
                Some(error) => {
                    warn!(
                        "Stream: '{}' exhausted {} retries, serving fallback: {}",
                        self.id, max_retries, error
                    );
                    self.inner.mark_disconnected(&error);
                    if self.deliver(StreamEvent::Error(error)) {
                        self.deliver(StreamEvent::Data(StreamData {
                            payload: fetched.data,
                            origin: DataOrigin::Fallback,
                        }));
                    }
                    return;
                }
            }
        }
    }

    async fn fetch(&self) -> ChainFetch<StreamPayload> {
        match &self.request {
            StreamRequest::Quote { symbol } => {
                let fetched = self.inner.chain.fetch_quote(symbol).await;
                ChainFetch {
                    data: StreamPayload::Quote(fetched.data),
                    origin: fetched.origin,
                    failure: fetched.failure,
                }
            }
            StreamRequest::Quotes { symbols } => {
                let fetched = self.inner.chain.fetch_quotes(symbols).await;
                ChainFetch {
                    data: StreamPayload::Quotes(fetched.data),
                    origin: fetched.origin,
                    failure: fetched.failure,
                }
            }
            StreamRequest::Indices => {
                let fetched = self.inner.chain.fetch_indices().await;
                ChainFetch {
                    data: StreamPayload::Indices(fetched.data),
                    origin: fetched.origin,
                    failure: fetched.failure,
                }
            }
        }
    }

    /// Sleeps for the backoff delay. Returns true when shutdown fired.
    async fn backoff(&mut self, delay: Duration) -> bool {
        tokio::select! {
            _ = sleep(delay) => false,
            changed = self.shutdown.changed() => {
                changed.is_err() || *self.shutdown.borrow()
            }
        }
    }

    fn deliver(&mut self, event: StreamEvent) -> bool {
        if self.events.send(event).is_err() {
            debug!("Stream: '{}' consumer dropped its handle, detaching", self.id);
            self.detached = true;
            return false;
        }
        true
    }

    /// Removes this subscription's own registry entry after a detach. The
    /// sequence guard keeps a later subscription reusing the id intact.
    fn remove_self(&self) {
        let mut subscriptions = self.inner.lock_subscriptions();
        let owned = subscriptions
            .get(&self.id)
            .is_some_and(|entry| entry.seq == self.seq);
        if owned {
            subscriptions.remove(&self.id);
            info!("Stream: subscription '{}' removed after consumer went away", self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idle_manager() -> StreamManager {
        let config = StreamConfig {
            auto_refresh: false,
            ..StreamConfig::default()
        };
        StreamManager::with_config(ProviderChain::new(Vec::new()), config)
    }

    #[tokio::test]
    async fn test_subscribe_rejects_duplicate_id() {
        let manager = idle_manager();
        let handle = manager.subscribe(
            "watchlist",
            StreamRequest::quote("INFY.NS"),
            SubscribeOptions::default(),
        );
        assert!(handle.is_some());

        let duplicate = manager.subscribe(
            "watchlist",
            StreamRequest::quote("TCS.NS"),
            SubscribeOptions::default(),
        );
        assert!(duplicate.is_none());
        assert_eq!(manager.subscription_count(), 1);
    }

    #[tokio::test]
    async fn test_unsubscribe_is_idempotent() {
        let manager = idle_manager();
        let _handle = manager.subscribe(
            "ticker",
            StreamRequest::indices(),
            SubscribeOptions::default(),
        );

        assert!(manager.unsubscribe("ticker"));
        assert!(!manager.unsubscribe("ticker"));
        assert_eq!(manager.subscription_count(), 0);
    }

    #[tokio::test]
    async fn test_refresh_unknown_id_is_false() {
        let manager = idle_manager();
        assert!(!manager.refresh("nobody").await);
    }

    #[tokio::test]
    async fn test_manual_refresh_degrades_without_providers() {
        let manager = idle_manager();
        let mut handle = manager
            .subscribe(
                "empty-chain",
                StreamRequest::quote("INFY.NS"),
                SubscribeOptions::default().max_retries(0),
            )
            .unwrap();

        assert!(manager.refresh("empty-chain").await);

        let first = handle.try_next_event().expect("error event");
        assert!(matches!(
            first,
            StreamEvent::Error(StreamError::UpstreamExhausted { .. })
        ));
        let second = handle.try_next_event().expect("fallback delivery");
        match second {
            StreamEvent::Data(data) => assert_eq!(data.origin, DataOrigin::Fallback),
            other => panic!("expected fallback data, got {:?}", other),
        }

        let status = manager.status();
        assert!(!status.connected);
        assert_eq!(status.retry_count, 0);
        assert_eq!(status.recent_errors.len(), 1);
    }

    #[tokio::test]
    async fn test_configure_applies_partial_update() {
        let manager = idle_manager();
        manager.configure(
            ConfigUpdate::default()
                .max_retries(7)
                .quote_interval(Duration::from_millis(250)),
        );

        let config = manager.config();
        assert_eq!(config.max_retries, 7);
        assert_eq!(config.quote_interval, Duration::from_millis(250));
        assert_eq!(config.index_interval, Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_subscriptions_lists_active_requests() {
        let manager = idle_manager();
        let _handle = manager.subscribe(
            "indices-widget",
            StreamRequest::indices(),
            SubscribeOptions::default(),
        );

        let listed = manager.subscriptions();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].0, "indices-widget");
        assert_eq!(listed[0].1, StreamRequest::Indices);
    }

    #[tokio::test]
    async fn test_shutdown_clears_registry() {
        let manager = idle_manager();
        let _a = manager.subscribe(
            "a",
            StreamRequest::quote("INFY.NS"),
            SubscribeOptions::default(),
        );
        let _b = manager.subscribe(
            "b",
            StreamRequest::indices(),
            SubscribeOptions::default(),
        );
        assert_eq!(manager.subscription_count(), 2);

        manager.shutdown().await;
        assert_eq!(manager.subscription_count(), 0);

        // Second call finds nothing to tear down.
        manager.shutdown().await;
    }

    #[tokio::test]
    async fn test_handle_observes_manager_status() {
        let manager = idle_manager();
        let handle = manager
            .subscribe(
                "status-widget",
                StreamRequest::quote("SBIN.NS"),
                SubscribeOptions::default(),
            )
            .unwrap();

        assert_eq!(handle.current_status(), manager.status());
        assert!(!handle.current_status().connected);
    }
}
