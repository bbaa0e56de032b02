//! Market stream data models
//!
//! This module contains the core data types the streaming engine moves around:
//! - `types` - Type aliases for common identifiers (ProviderId, SubscriptionId)
//! - `quote` - Canonical quote shape (Quote, PriceRange)
//! - `index` - Index snapshots and the tracked-index catalog (IndexSnapshot, TRACKED_INDICES)
//! - `request` - Subscription request descriptors and payloads (StreamRequest, StreamPayload)
//! - `status` - Shared connectivity status (StreamStatus)
//! - `search` - One-shot symbol lookup results (SymbolMatch)

mod index;
mod quote;
mod request;
mod search;
mod status;
mod types;

pub use index::{index_info, IndexInfo, IndexSnapshot, TRACKED_INDICES};
pub use quote::{PriceRange, Quote};
pub use request::{DataKind, StreamPayload, StreamRequest};
pub use search::SymbolMatch;
pub use status::{StreamStatus, MAX_RECENT_ERRORS};
pub use types::{ProviderId, SubscriptionId};
