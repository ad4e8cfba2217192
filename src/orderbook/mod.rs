//! Live order book depth for WEX pairs
//!
//! Architecture: Pusher depth deltas + REST seed snapshot, reconciled by a
//! single actor task
//! - Lazy initialization: subscribe and seed on first query per pair
//! - Cached snapshots answered without refetching until a delta arrives
//! - Cost evaluation and currency inversion on immutable snapshots

pub mod cache;
pub mod feed;
pub mod snapshot;
pub mod types;

#[cfg(feature = "websocket")]
pub mod websocket;

pub use cache::{DepthAnswer, DepthCache, DepthCacheHandle};
pub use feed::{PushEvent, PushFeed, RESUBSCRIBED_EVENT};
pub use snapshot::{Evaluation, OrderBookSnapshot, PriceLevel};
pub use types::{BookSide, DepthDelta, PairState, RawSide};

#[cfg(feature = "websocket")]
pub use websocket::PusherFeed;
