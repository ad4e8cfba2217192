//! Push feed seam between the depth cache and the transport delivering deltas

use crate::error::FeedError;
use async_trait::async_trait;

/// Event name the feed emits when a channel that was live before a reconnect
/// is acknowledged again; deltas published during the gap are lost
pub const RESUBSCRIBED_EVENT: &str = "pusher_internal:subscription_succeeded";

/// A channel event delivered by the push feed
#[derive(Debug, Clone, PartialEq)]
pub struct PushEvent {
    pub channel: String,
    pub event: String,
    /// Event payload as a JSON document
    pub data: String,
}

impl PushEvent {
    pub fn new(
        channel: impl Into<String>,
        event: impl Into<String>,
        data: impl Into<String>,
    ) -> Self {
        Self {
            channel: channel.into(),
            event: event.into(),
            data: data.into(),
        }
    }
}

/// Subscription side of a push feed
///
/// Events themselves arrive on the receiver handed out when the feed is
/// created.
#[async_trait]
pub trait PushFeed: Send + Sync {
    /// Subscribes to `channel` and returns once the subscription is live
    async fn subscribe(&self, channel: &str) -> Result<(), FeedError>;
}
