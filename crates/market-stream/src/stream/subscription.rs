use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, watch};

use crate::chain::DataOrigin;
use crate::errors::StreamError;
use crate::models::{StreamPayload, StreamStatus, SubscriptionId};

/// Everything the manager pushes to one subscriber.
#[derive(Clone, Debug)]
pub enum StreamEvent {
    /// A delivery, live or degraded; check [`StreamData::origin`]
    Data(StreamData),

    /// A tick exhausted its retries; always followed by a fallback delivery
    Error(StreamError),
}

impl StreamEvent {
    pub fn is_data(&self) -> bool {
        matches!(self, Self::Data(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

/// A delivered payload together with where it came from.
#[derive(Clone, Debug, Serialize)]
pub struct StreamData {
    pub payload: StreamPayload,
    pub origin: DataOrigin,
}

/// Per-subscription overrides on top of the manager-wide [`StreamConfig`].
///
/// Unset fields fall back to the shared configuration current at each tick.
///
/// [`StreamConfig`]: super::StreamConfig
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SubscribeOptions {
    pub interval: Option<Duration>,
    pub max_retries: Option<u32>,
    pub retry_delay: Option<Duration>,
}

impl SubscribeOptions {
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
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
}

/// The consumer's end of one subscription.
///
/// Dropping the handle closes the event channel; the polling task notices on
/// its next delivery and detaches itself, so abandoned handles do not leak
/// background work.
#[derive(Debug)]
pub struct SubscriptionHandle {
    id: SubscriptionId,
    events: mpsc::UnboundedReceiver<StreamEvent>,
    status: watch::Receiver<StreamStatus>,
}

impl SubscriptionHandle {
    pub(crate) fn new(
        id: SubscriptionId,
        events: mpsc::UnboundedReceiver<StreamEvent>,
        status: watch::Receiver<StreamStatus>,
    ) -> Self {
        Self { id, events, status }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Waits for the next delivery. Returns `None` once the subscription is
    /// gone (unsubscribed or the manager shut down) and the buffer is drained.
    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        self.events.recv().await
    }

    /// Non-blocking variant of [`next_event`](Self::next_event).
    pub fn try_next_event(&mut self) -> Option<StreamEvent> {
        self.events.try_recv().ok()
    }

    /// Snapshot of the shared manager status.
    pub fn current_status(&self) -> StreamStatus {
        self.status.borrow().clone()
    }

    /// A dedicated receiver for awaiting status changes.
    pub fn status_watch(&self) -> watch::Receiver<StreamStatus> {
        self.status.clone()
    }
}
