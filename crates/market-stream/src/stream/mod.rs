//! Subscription manager and polling loops
//!
//! One [`StreamManager`] coordinates any number of subscriptions, each
//! polled by its own tokio task against the shared provider chain and
//! response cache. Consumers receive deliveries over per-subscription
//! channels and observe one global [`StreamStatus`] through a watch
//! channel.
//!
//! [`StreamStatus`]: crate::models::StreamStatus

mod config;
mod manager;
mod subscription;

pub use config::{ConfigUpdate, StreamConfig};
pub use manager::StreamManager;
pub use subscription::{StreamData, StreamEvent, SubscribeOptions, SubscriptionHandle};
