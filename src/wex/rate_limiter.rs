//! Client-side rate limiter for exchange requests
//!
//! Implements GCRA (Generic Cell Rate Algorithm) via governor crate.
//! Every HTTP attempt, retries included, takes one permit.

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter as GovernorRateLimiter,
};
use std::num::NonZeroU32;
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Rate limiter errors
#[derive(Debug, Error)]
pub enum RateLimiterError {
    #[error("Rate limit queue timeout after {0:?}")]
    QueueTimeout(Duration),
}

/// Client-side rate limiter for REST API requests
///
/// Queues excess requests up to the queue timeout, then rejects them.
pub struct RateLimiter {
    limiter: GovernorRateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    queue_timeout: Duration,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("queue_timeout", &self.queue_timeout)
            .finish()
    }
}

impl RateLimiter {
    /// Create a rate limiter allowing `requests_per_minute` (minimum 1)
    pub fn new(requests_per_minute: u32, queue_timeout: Duration) -> Self {
        let quota = Quota::per_minute(NonZeroU32::new(requests_per_minute).unwrap_or(NonZeroU32::MIN));

        Self {
            limiter: GovernorRateLimiter::direct(quota),
            queue_timeout,
        }
    }

    /// Wait for rate limit permission
    ///
    /// Returns Ok(()) when the request is allowed, Err if the queue timeout is exceeded.
    pub async fn wait(&self) -> Result<(), RateLimiterError> {
        if self.limiter.check().is_ok() {
            return Ok(());
        }

        warn!("Rate limit reached, queueing request");

        match timeout(self.queue_timeout, self.limiter.until_ready()).await {
            Ok(()) => {
                debug!("Rate limit permission granted");
                Ok(())
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.queue_timeout.as_millis() as u64,
                    "Rate limit queue timeout exceeded"
                );
                Err(RateLimiterError::QueueTimeout(self.queue_timeout))
            }
        }
    }
}
