// Shared fakes for integration tests
//
// FakeTransport answers HTTP requests from closures and records every
// attempt; FakeFeed acknowledges subscriptions and lets the test push events.

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use wex_provider::config::{ClientConfig, Credentials, RetryPolicy};
use wex_provider::error::{ApiError, FeedError};
use wex_provider::orderbook::{PushEvent, PushFeed};
use wex_provider::wex::{Transport, WexClient};

pub const BASE_URL: &str = "https://wex.test";

pub const INFO_JSON: &str = r#"{
    "server_time": 1370814956,
    "pairs": {
        "btc_usd": {"decimal_places": 3, "min_price": 0.1, "max_price": 400000,
                    "min_amount": 0.001, "hidden": 0, "fee": 0.2},
        "ltc_btc": {"decimal_places": 5, "min_price": 0.0001, "max_price": 10,
                    "min_amount": 0.1, "hidden": 0, "fee": 0.2}
    }
}"#;

type Handler = Box<dyn Fn(usize, &str) -> Result<String, ApiError> + Send + Sync>;

/// One recorded trade API attempt
#[derive(Debug, Clone)]
pub struct RecordedPost {
    pub url: String,
    pub key: String,
    pub sign: String,
    pub body: String,
}

impl RecordedPost {
    pub fn field(&self, name: &str) -> Option<String> {
        let fields: Vec<(String, String)> = serde_urlencoded::from_str(&self.body).ok()?;
        fields.into_iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn nonce(&self) -> u64 {
        self.field("nonce")
            .and_then(|n| n.parse().ok())
            .unwrap_or_default()
    }
}

/// Scripted transport; handlers get the attempt index and the URL (GET) or body (POST)
pub struct FakeTransport {
    get: Handler,
    post: Handler,
    gets: Mutex<Vec<String>>,
    posts: Mutex<Vec<RecordedPost>>,
    get_count: AtomicUsize,
    post_count: AtomicUsize,
}

impl FakeTransport {
    /// Serves `info` and `depth` for btc_usd; rejects trade API calls
    pub fn new() -> Self {
        Self {
            get: Box::new(|_: usize, url: &str| default_get(url)),
            post: Box::new(|_: usize, _: &str| {
                Err(ApiError::Transport("no trade API route".to_string()))
            }),
            gets: Mutex::new(Vec::new()),
            posts: Mutex::new(Vec::new()),
            get_count: AtomicUsize::new(0),
            post_count: AtomicUsize::new(0),
        }
    }

    pub fn on_get(
        mut self,
        handler: impl Fn(usize, &str) -> Result<String, ApiError> + Send + Sync + 'static,
    ) -> Self {
        self.get = Box::new(handler);
        self
    }

    pub fn on_post(
        mut self,
        handler: impl Fn(usize, &str) -> Result<String, ApiError> + Send + Sync + 'static,
    ) -> Self {
        self.post = Box::new(handler);
        self
    }

    pub fn gets(&self) -> Vec<String> {
        self.gets.lock().unwrap().clone()
    }

    pub fn posts(&self) -> Vec<RecordedPost> {
        self.posts.lock().unwrap().clone()
    }
}

pub fn default_get(url: &str) -> Result<String, ApiError> {
    if url.contains("/api/3/info") {
        Ok(INFO_JSON.to_string())
    } else if url.contains("/api/3/depth/btc_usd") {
        Ok(r#"{"btc_usd": {"asks": [[100, 1]], "bids": [[99, 2]]}}"#.to_string())
    } else {
        Err(ApiError::Transport(format!("no route for {}", url)))
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn get(&self, url: &str) -> Result<String, ApiError> {
        let attempt = self.get_count.fetch_add(1, Ordering::SeqCst);
        self.gets.lock().unwrap().push(url.to_string());
        (self.get)(attempt, url)
    }

    async fn post_form(
        &self,
        url: &str,
        headers: &[(&'static str, String)],
        body: &str,
    ) -> Result<String, ApiError> {
        let attempt = self.post_count.fetch_add(1, Ordering::SeqCst);
        let header = |name: &str| {
            headers
                .iter()
                .find(|(n, _)| *n == name)
                .map(|(_, v)| v.clone())
                .unwrap_or_default()
        };
        self.posts.lock().unwrap().push(RecordedPost {
            url: url.to_string(),
            key: header("Key"),
            sign: header("Sign"),
            body: body.to_string(),
        });
        (self.post)(attempt, body)
    }
}

pub fn client_config(transient: u32, nonce: u32) -> ClientConfig {
    ClientConfig::default()
        .with_base_url(BASE_URL)
        .with_retry(RetryPolicy::immediate(transient, nonce))
}

/// Authenticated client starting at nonce 1
pub fn trade_client(transport: Arc<FakeTransport>, transient: u32, nonce: u32) -> WexClient {
    WexClient::with_transport(client_config(transient, nonce), transport)
        .with_credentials(Credentials::new("test-key", "test-secret", 1))
}

pub fn public_client(transport: Arc<FakeTransport>) -> WexClient {
    WexClient::with_transport(client_config(0, 0), transport)
}

pub fn success(payload: &str) -> Result<String, ApiError> {
    Ok(format!(r#"{{"success":1,"return":{}}}"#, payload))
}

pub fn failure(message: &str) -> Result<String, ApiError> {
    Ok(format!(r#"{{"success":0,"error":"{}"}}"#, message))
}

pub fn nonce_error(corrected: u64) -> Result<String, ApiError> {
    failure(&format!(
        "invalid nonce parameter; on key:{}, you sent:1, you should send:{}",
        corrected - 1,
        corrected
    ))
}

pub fn transport_error() -> Result<String, ApiError> {
    Err(ApiError::Transport("connection reset".to_string()))
}

/// Push feed that acknowledges every subscription immediately
pub struct FakeFeed {
    subscriptions: Mutex<Vec<String>>,
    fail: bool,
}

impl FakeFeed {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedSender<PushEvent>, mpsc::UnboundedReceiver<PushEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let feed = Arc::new(Self {
            subscriptions: Mutex::new(Vec::new()),
            fail: false,
        });
        (feed, tx, rx)
    }

    pub fn failing() -> (Arc<Self>, mpsc::UnboundedSender<PushEvent>, mpsc::UnboundedReceiver<PushEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let feed = Arc::new(Self {
            subscriptions: Mutex::new(Vec::new()),
            fail: true,
        });
        (feed, tx, rx)
    }

    pub fn subscriptions(&self) -> Vec<String> {
        self.subscriptions.lock().unwrap().clone()
    }
}

#[async_trait]
impl PushFeed for FakeFeed {
    async fn subscribe(&self, channel: &str) -> Result<(), FeedError> {
        self.subscriptions.lock().unwrap().push(channel.to_string());
        if self.fail {
            Err(FeedError::SubscribeTimeout(channel.to_string()))
        } else {
            Ok(())
        }
    }
}

/// A `depth` event for `pair`
pub fn depth_event(pair: &str, data: &str) -> PushEvent {
    PushEvent::new(format!("{}.depth", pair), "depth", data)
}
