use std::time::Duration;

use crate::models::DataKind;

const DEFAULT_QUOTE_INTERVAL: Duration = Duration::from_secs(5);
const DEFAULT_INDEX_INTERVAL: Duration = Duration::from_secs(10);
const DEFAULT_QUOTE_TTL: Duration = Duration::from_secs(5);
const DEFAULT_INDEX_TTL: Duration = Duration::from_secs(10);
const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Runtime knobs shared by every polling loop of one manager instance.
///
/// Changes are broadcast over a watch channel, so updates apply to all
/// future ticks without restarting subscriptions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamConfig {
    /// How often quote subscriptions poll
    pub quote_interval: Duration,

    /// How often index subscriptions poll
    pub index_interval: Duration,

    /// Cache lifetime for quote responses
    pub quote_ttl: Duration,

    /// Cache lifetime for index responses
    pub index_ttl: Duration,

    /// Retries per tick before giving up on live data
    pub max_retries: u32,

    /// Base backoff unit; the n-th retry waits `retry_delay * n`
    pub retry_delay: Duration,

    /// When false, timers are suspended and only manual refreshes fetch
    pub auto_refresh: bool,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            quote_interval: DEFAULT_QUOTE_INTERVAL,
            index_interval: DEFAULT_INDEX_INTERVAL,
            quote_ttl: DEFAULT_QUOTE_TTL,
            index_ttl: DEFAULT_INDEX_TTL,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            auto_refresh: true,
        }
    }
}

impl StreamConfig {
    /// Polling interval for the given request kind.
    pub fn interval_for(&self, kind: DataKind) -> Duration {
        match kind {
            DataKind::Quote => self.quote_interval,
            DataKind::Indices => self.index_interval,
        }
    }

    /// Cache TTL for the given request kind. Indices move slower than
    /// individual quotes, so their entries live longer.
    pub fn ttl_for(&self, kind: DataKind) -> Duration {
        match kind {
            DataKind::Quote => self.quote_ttl,
            DataKind::Indices => self.index_ttl,
        }
    }
}

/// Partial update applied on top of the current [`StreamConfig`].
///
/// Only the fields set to `Some` change; everything else keeps its
/// current value.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConfigUpdate {
    pub quote_interval: Option<Duration>,
    pub index_interval: Option<Duration>,
    pub quote_ttl: Option<Duration>,
    pub index_ttl: Option<Duration>,
    pub max_retries: Option<u32>,
    pub retry_delay: Option<Duration>,
    pub auto_refresh: Option<bool>,
}

impl ConfigUpdate {
    pub fn quote_interval(mut self, interval: Duration) -> Self {
        self.quote_interval = Some(interval);
        self
    }

    pub fn index_interval(mut self, interval: Duration) -> Self {
        self.index_interval = Some(interval);
        self
    }

    pub fn quote_ttl(mut self, ttl: Duration) -> Self {
        self.quote_ttl = Some(ttl);
        self
    }

    pub fn index_ttl(mut self, ttl: Duration) -> Self {
        self.index_ttl = Some(ttl);
        self
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = Some(retries);
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = Some(delay);
        self
    }

    pub fn auto_refresh(mut self, enabled: bool) -> Self {
        self.auto_refresh = Some(enabled);
        self
    }

    /// Merges the set fields into `config`, leaving the rest untouched.
    pub fn apply_to(&self, config: &mut StreamConfig) {
        if let Some(interval) = self.quote_interval {
            config.quote_interval = interval;
        }
        if let Some(interval) = self.index_interval {
            config.index_interval = interval;
        }
        if let Some(ttl) = self.quote_ttl {
            config.quote_ttl = ttl;
        }
        if let Some(ttl) = self.index_ttl {
            config.index_ttl = ttl;
        }
        if let Some(retries) = self.max_retries {
            config.max_retries = retries;
        }
        if let Some(delay) = self.retry_delay {
            config.retry_delay = delay;
        }
        if let Some(enabled) = self.auto_refresh {
            config.auto_refresh = enabled;
        }
    }
}
