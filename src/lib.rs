// Library exports for wex-provider

pub mod config; // Configuration management
pub mod error;
pub mod wex; // WEX API client

#[cfg(feature = "orderbook")]
pub mod orderbook; // Pusher-fed depth cache

pub use error::{ApiError, CacheError, CallOutcome, FeedError};
pub use wex::{CallContext, WexClient};
