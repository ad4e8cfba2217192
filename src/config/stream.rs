//! Push Feed and Depth Cache Configuration

use std::time::Duration;

/// Public Pusher application key of the exchange's push API
pub const DEFAULT_PUSHER_APP_KEY: &str = "c354d4d129ee0faa5c92";

/// Default Pusher WebSocket host
pub const DEFAULT_PUSHER_URL: &str = "wss://ws.pusherapp.com";

/// Pusher connection configuration
///
/// ## Environment Variables
///
/// - `WEX_PUSHER_URL`: WebSocket host (default: wss://ws.pusherapp.com)
/// - `WEX_PUSHER_APP_KEY`: Pusher application key (default: the exchange's public key)
#[derive(Debug, Clone)]
pub struct PusherConfig {
    pub url: String,
    pub app_key: String,
    /// How long `subscribe` waits for the subscription acknowledgement
    pub subscribe_timeout: Duration,
    /// Upper bound for the reconnection backoff
    pub max_reconnect_delay: Duration,
}

impl Default for PusherConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_PUSHER_URL.to_string(),
            app_key: DEFAULT_PUSHER_APP_KEY.to_string(),
            subscribe_timeout: Duration::from_secs(10),
            max_reconnect_delay: Duration::from_secs(30),
        }
    }
}

impl PusherConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            url: std::env::var("WEX_PUSHER_URL").unwrap_or(defaults.url),
            app_key: std::env::var("WEX_PUSHER_APP_KEY").unwrap_or(defaults.app_key),
            ..defaults
        }
    }

    /// Full connection URL for Pusher protocol 7
    pub fn connect_url(&self) -> String {
        format!(
            "{}/app/{}?protocol=7&client=wex-provider&version={}",
            self.url.trim_end_matches('/'),
            self.app_key,
            env!("CARGO_PKG_VERSION")
        )
    }
}

/// Depth cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Levels per side requested for the REST seed snapshot
    pub seed_depth: u32,
    /// Pause between the subscription acknowledgement and the REST seed fetch
    pub settle_delay: Duration,
    /// Capacity of the query channel
    pub queue_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            seed_depth: 100,
            settle_delay: Duration::from_millis(500),
            queue_capacity: 64,
        }
    }
}
