// Integration tests for the Pusher feed
//
// A local WebSocket server plays the Pusher side of the protocol and verifies:
// - A channel acknowledged again after a reconnect reloads the cached book
// - A subscribe whose acknowledgement never came is sent again on retry
// - `pusher:error` fails the subscriptions in flight

#![cfg(feature = "websocket")]

mod common;

use common::*;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tokio_util::sync::CancellationToken;
use wex_provider::config::{CacheConfig, PusherConfig};
use wex_provider::error::FeedError;
use wex_provider::orderbook::{DepthCache, PriceLevel, PushFeed, PusherFeed};

type ServerSocket = WebSocketStream<TcpStream>;

async fn listen() -> (TcpListener, PusherConfig) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let config = PusherConfig {
        url: format!("ws://{}", listener.local_addr().unwrap()),
        max_reconnect_delay: Duration::from_millis(20),
        ..PusherConfig::default()
    };
    (listener, config)
}

/// Accepts one client and sends `pusher:connection_established`
async fn accept(listener: &TcpListener) -> ServerSocket {
    let (stream, _) = listener.accept().await.unwrap();
    let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
    send(
        &mut ws,
        json!({"event": "pusher:connection_established", "data": "{\"socket_id\":\"1.1\"}"}),
    )
    .await;
    ws
}

async fn send(ws: &mut ServerSocket, frame: Value) {
    ws.send(Message::text(frame.to_string())).await.unwrap();
}

/// Waits for the next `pusher:subscribe` and returns its channel
async fn next_subscribe(ws: &mut ServerSocket) -> String {
    while let Some(message) = ws.next().await {
        let Ok(Message::Text(text)) = message else { continue };
        let frame: Value = serde_json::from_str(text.as_str()).unwrap();
        if frame["event"] == "pusher:subscribe" {
            return frame["data"]["channel"].as_str().unwrap().to_string();
        }
    }
    panic!("client disconnected before subscribing");
}

async fn ack(ws: &mut ServerSocket, channel: &str) {
    send(
        ws,
        json!({"event": "pusher_internal:subscription_succeeded", "channel": channel, "data": "{}"}),
    )
    .await;
}

/// Keeps the connection open until the client goes away
async fn hold(mut ws: ServerSocket) {
    while let Some(Ok(_)) = ws.next().await {}
}

#[tokio::test]
async fn test_reconnect_reloads_cached_book() {
    let (listener, pusher) = listen().await;
    let (disconnect, disconnect_rx) = oneshot::channel::<()>();

    let server = tokio::spawn(async move {
        let mut first = accept(&listener).await;
        let channel = next_subscribe(&mut first).await;
        ack(&mut first, &channel).await;

        let _ = disconnect_rx.await;
        drop(first);

        let mut second = accept(&listener).await;
        let channel = next_subscribe(&mut second).await;
        ack(&mut second, &channel).await;
        hold(second).await;
    });

    let fetches = AtomicUsize::new(0);
    let transport = Arc::new(FakeTransport::new().on_get(move |_, url| {
        if url.contains("/api/3/depth/") && fetches.fetch_add(1, Ordering::SeqCst) > 0 {
            return Ok(r#"{"btc_usd": {"asks": [[200, 1]], "bids": [[99, 2]]}}"#.to_string());
        }
        default_get(url)
    }));
    let client = Arc::new(public_client(Arc::clone(&transport)));
    let cache_config = CacheConfig {
        settle_delay: Duration::ZERO,
        ..CacheConfig::default()
    };
    let cache = DepthCache::start_pusher(client, pusher, cache_config);

    let before = cache.query("btc_usd").await.unwrap().unwrap();
    assert_eq!(before.asks, vec![PriceLevel::new(100.0, 1.0)]);

    disconnect.send(()).unwrap();

    // The level at 100 vanished during the outage; the reloaded book must not serve it
    let reloaded = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let snapshot = cache.query("btc_usd").await.unwrap().unwrap();
            if snapshot.asks != before.asks {
                return snapshot;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .unwrap();

    assert_eq!(reloaded.asks, vec![PriceLevel::new(200.0, 1.0)]);
    assert_eq!(
        transport
            .gets()
            .iter()
            .filter(|url| url.contains("/api/3/depth/"))
            .count(),
        2
    );

    cache.shutdown().await;
    server.abort();
}

#[tokio::test]
async fn test_subscribe_is_resent_after_missing_ack() {
    let (listener, pusher) = listen().await;
    let pusher = PusherConfig {
        subscribe_timeout: Duration::from_millis(200),
        ..pusher
    };

    let server = tokio::spawn(async move {
        let mut ws = accept(&listener).await;
        // The first request goes unanswered
        next_subscribe(&mut ws).await;
        let channel = next_subscribe(&mut ws).await;
        ack(&mut ws, &channel).await;
        hold(ws).await;
    });

    let shutdown = CancellationToken::new();
    let (feed, _events) = PusherFeed::start(pusher, shutdown.clone());

    let err = feed.subscribe("btc_usd.depth").await.unwrap_err();
    assert!(matches!(err, FeedError::SubscribeTimeout(ref channel) if channel == "btc_usd.depth"));

    feed.subscribe("btc_usd.depth").await.unwrap();

    shutdown.cancel();
    server.abort();
}

#[tokio::test]
async fn test_pusher_error_fails_pending_subscribe() {
    let (listener, pusher) = listen().await;

    let server = tokio::spawn(async move {
        let mut ws = accept(&listener).await;
        next_subscribe(&mut ws).await;
        send(
            &mut ws,
            json!({"event": "pusher:error", "data": {"message": "Over capacity", "code": 4100}}),
        )
        .await;
        hold(ws).await;
    });

    let shutdown = CancellationToken::new();
    let (feed, _events) = PusherFeed::start(pusher, shutdown.clone());

    let err = feed.subscribe("btc_usd.depth").await.unwrap_err();
    assert!(matches!(
        err,
        FeedError::Rejected { ref channel, ref message }
            if channel == "btc_usd.depth" && message.contains("Over capacity")
    ));

    shutdown.cancel();
    server.abort();
}
