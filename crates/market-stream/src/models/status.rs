use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How many error messages the rolling log keeps.
pub const MAX_RECENT_ERRORS: usize = 5;

/// Shared connectivity status of one stream manager instance.
///
/// Global to the manager, not per-subscription: it is recalculated after
/// every fetch attempt and broadcast to every active subscription, so all
/// widgets show the same connected/disconnected badge.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamStatus {
    /// True after the most recent fetch attempt succeeded
    pub connected: bool,

    /// When the last successful update happened
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_update: Option<DateTime<Utc>>,

    /// Rolling log of the last few error messages, oldest first
    pub recent_errors: Vec<String>,

    /// Consecutive-retry count of the most recent failing tick
    pub retry_count: u32,

    /// Latency of the last completed fetch
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_latency: Option<Duration>,
}

impl StreamStatus {
    /// Appends an error message, dropping the oldest past the cap.
    pub fn record_error(&mut self, message: impl Into<String>) {
        self.recent_errors.push(message.into());
        if self.recent_errors.len() > MAX_RECENT_ERRORS {
            self.recent_errors.remove(0);
        }
    }
}
