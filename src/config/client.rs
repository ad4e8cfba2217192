//! REST Client Configuration
//!
//! Base URL, per-attempt timeout, client-side rate limit and the two retry
//! budgets of the trade API client.

use std::time::Duration;

/// Default base URL of the exchange
pub const DEFAULT_BASE_URL: &str = "https://wex.nz";

/// Retry budgets for API calls
///
/// The two budgets are independent: transport retries replay the same signed
/// request after a network/HTTP failure, nonce corrections re-sign the request
/// with the nonce the exchange asked for.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Additional attempts after a transport failure (total = N + 1)
    pub transient_error_attempts: u32,
    /// Nonce corrections allowed per call
    pub nonce_correction_attempts: u32,
    /// Delay before the first transport retry
    pub initial_backoff: Duration,
    /// Cap on the delay between transport retries
    pub max_backoff: Duration,
    /// Delay multiplier applied after each transport retry
    pub backoff_factor: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            transient_error_attempts: 5,
            nonce_correction_attempts: 10,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(5),
            backoff_factor: 2,
        }
    }
}

impl RetryPolicy {
    /// Policy with the given budgets and no delay between attempts
    pub fn immediate(transient_error_attempts: u32, nonce_correction_attempts: u32) -> Self {
        Self {
            transient_error_attempts,
            nonce_correction_attempts,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            backoff_factor: 1,
        }
    }

    /// Delay before transport retry number `retry` (0-indexed)
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let factor = self.backoff_factor.saturating_pow(retry);
        std::cmp::min(self.initial_backoff.saturating_mul(factor), self.max_backoff)
    }
}

/// Trade API client configuration
///
/// ## Environment Variables
///
/// - `WEX_BASE_URL`: API base URL (default: https://wex.nz)
/// - `WEX_HTTP_TIMEOUT_SECS`: Per-attempt HTTP timeout (default: 5)
/// - `WEX_TRANSIENT_RETRIES`: Transport retry budget (default: 5)
/// - `WEX_NONCE_RETRIES`: Nonce correction budget (default: 10)
/// - `WEX_REQUESTS_PER_MINUTE`: Client-side rate limit (default: 600)
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub retry: RetryPolicy,
    pub requests_per_minute: u32,
    /// How long a request may wait for rate limit permission
    pub rate_limit_queue_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(5),
            retry: RetryPolicy::default(),
            requests_per_minute: 600,
            rate_limit_queue_timeout: Duration::from_secs(30),
        }
    }
}

impl ClientConfig {
    /// Load client configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns error if a variable is set to an unparseable value
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let defaults = Self::default();

        let base_url = std::env::var("WEX_BASE_URL").unwrap_or(defaults.base_url);
        let timeout_secs: u64 = std::env::var("WEX_HTTP_TIMEOUT_SECS")
            .unwrap_or_else(|_| "5".to_string())
            .parse()?;
        let transient: u32 = std::env::var("WEX_TRANSIENT_RETRIES")
            .unwrap_or_else(|_| defaults.retry.transient_error_attempts.to_string())
            .parse()?;
        let nonce: u32 = std::env::var("WEX_NONCE_RETRIES")
            .unwrap_or_else(|_| defaults.retry.nonce_correction_attempts.to_string())
            .parse()?;
        let requests_per_minute: u32 = std::env::var("WEX_REQUESTS_PER_MINUTE")
            .unwrap_or_else(|_| "600".to_string())
            .parse()?;

        if requests_per_minute == 0 {
            return Err("WEX_REQUESTS_PER_MINUTE must be greater than zero".into());
        }

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(timeout_secs),
            retry: RetryPolicy {
                transient_error_attempts: transient,
                nonce_correction_attempts: nonce,
                ..defaults.retry
            },
            requests_per_minute,
            rate_limit_queue_timeout: defaults.rate_limit_queue_timeout,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}
