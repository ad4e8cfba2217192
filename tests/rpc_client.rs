// Integration tests for the WEX RPC client
//
// These tests drive WexClient through a scripted transport and verify:
// - Transport retries replay the same signed request
// - Nonce correction re-signs with the server-supplied value
// - The two retry budgets are independent
// - Empty-result reclassification and error classification
// - Parameter formatting with pair metadata, and the public API

mod common;

use common::*;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use wex_provider::config::{Credentials, RetryPolicy};
use wex_provider::error::ApiError;
use wex_provider::wex::signer::sign;
use wex_provider::wex::{
    ActiveOrdersParams, CallContext, GetInfoParams, TradeHistoryParams, TradeParams, TradeType,
    WexClient,
};

#[tokio::test]
async fn test_signed_request_shape() {
    let transport = Arc::new(FakeTransport::new().on_post(|_, _| {
        success(r#"{"funds":{"usd":325.0,"btc":23.998},"rights":{"info":1,"trade":0,"withdraw":0},
                    "transaction_count":0,"open_orders":1,"server_time":1342123547}"#)
    }));
    let client = trade_client(Arc::clone(&transport), 0, 0);

    let info = client.get_info().await.unwrap();
    assert_eq!(info.funds.get("usd"), Some(&325.0));
    assert_eq!(info.open_orders, 1);

    let posts = transport.posts();
    assert_eq!(posts.len(), 1);
    let post = &posts[0];
    assert_eq!(post.url, "https://wex.test/tapi");
    assert_eq!(post.key, "test-key");
    assert_eq!(post.field("method").as_deref(), Some("getInfo"));
    assert_eq!(post.nonce(), 1);
    assert_eq!(post.sign, sign("test-secret", &post.body).unwrap());
}

#[tokio::test]
async fn test_transient_budget_gives_n_plus_one_attempts() {
    let transport = Arc::new(FakeTransport::new().on_post(|_, _| transport_error()));
    let client = trade_client(Arc::clone(&transport), 3, 10);

    let err = client.get_info().await.unwrap_err();
    assert!(matches!(err, ApiError::Transport(_)));

    let posts = transport.posts();
    assert_eq!(posts.len(), 4);
    // Replays carry the identical signed body
    for post in &posts[1..] {
        assert_eq!(post.body, posts[0].body);
        assert_eq!(post.sign, posts[0].sign);
    }
    // One nonce consumed for the whole logical request
    assert_eq!(client.current_nonce().await, Some(2));
}

#[tokio::test]
async fn test_transient_failure_then_success() {
    let transport = Arc::new(FakeTransport::new().on_post(|attempt, _| {
        if attempt < 2 {
            transport_error()
        } else {
            success(r#"{"order_id": 7, "funds": {"usd": 1.5}}"#)
        }
    }));
    let client = trade_client(Arc::clone(&transport), 5, 0);

    let result = client.cancel_order(7).await.unwrap();
    assert_eq!(result.order_id, 7);
    assert_eq!(transport.posts().len(), 3);
}

#[tokio::test]
async fn test_nonce_correction_resigns() {
    let transport = Arc::new(FakeTransport::new().on_post(|attempt, _| {
        if attempt == 0 {
            nonce_error(4_000_001)
        } else {
            success(r#"{"address": "1BtcAddress"}"#)
        }
    }));
    let client = trade_client(Arc::clone(&transport), 0, 3);

    let result = client.coin_deposit_address("BTC").await.unwrap();
    assert_eq!(result.address, "1BtcAddress");

    let posts = transport.posts();
    assert_eq!(posts.len(), 2);
    assert_eq!(posts[0].nonce(), 1);
    assert_eq!(posts[1].nonce(), 4_000_001);
    assert_ne!(posts[0].sign, posts[1].sign);
    assert_eq!(posts[1].sign, sign("test-secret", &posts[1].body).unwrap());
    assert_eq!(posts[1].field("coinName").as_deref(), Some("BTC"));
    assert_eq!(client.current_nonce().await, Some(4_000_002));
}

#[tokio::test]
async fn test_nonce_budget_exhausted() {
    let transport = Arc::new(FakeTransport::new().on_post(|attempt, _| {
        nonce_error(100 + attempt as u64)
    }));
    let client = trade_client(Arc::clone(&transport), 5, 2);

    let err = client.get_info().await.unwrap_err();
    assert!(matches!(err, ApiError::Nonce(ref msg) if msg.starts_with("invalid nonce parameter;")));
    assert_eq!(transport.posts().len(), 3);
}

#[tokio::test]
async fn test_unparseable_nonce_error_is_not_retried() {
    let transport = Arc::new(
        FakeTransport::new().on_post(|_, _| failure("invalid nonce parameter; try again later")),
    );
    let client = trade_client(Arc::clone(&transport), 5, 5);

    let err = client.get_info().await.unwrap_err();
    assert!(matches!(err, ApiError::Nonce(_)));
    assert_eq!(transport.posts().len(), 1);
}

#[tokio::test]
async fn test_budgets_are_independent() {
    // Two transport failures before every answer, two nonce corrections, then success
    let transport = Arc::new(FakeTransport::new().on_post(|attempt, _| match attempt {
        0 | 1 | 3 | 4 | 6 | 7 => transport_error(),
        2 => nonce_error(200),
        5 => nonce_error(300),
        _ => success(r#"{"order_id": 1, "funds": {}}"#),
    }));
    let client = trade_client(Arc::clone(&transport), 2, 2);

    let result = client.cancel_order(1).await.unwrap();
    assert_eq!(result.order_id, 1);

    let nonces: Vec<u64> = transport.posts().iter().map(|p| p.nonce()).collect();
    assert_eq!(nonces, vec![1, 1, 1, 200, 200, 200, 300, 300, 300]);
}

#[tokio::test]
async fn test_nonce_strictly_increases_across_calls() {
    let transport = Arc::new(FakeTransport::new().on_post(|attempt, _| match attempt {
        2 => nonce_error(50),
        _ => success(r#"{"order_id": 1, "funds": {}}"#),
    }));
    let seen = Arc::new(AtomicU64::new(0));
    let sink = Arc::clone(&seen);
    let credentials = Credentials::new("test-key", "test-secret", 1)
        .with_listener(Arc::new(move |next: u64| sink.store(next, Ordering::SeqCst)));
    let client = WexClient::with_transport(client_config(0, 3), Arc::clone(&transport) as _)
        .with_credentials(credentials);

    for _ in 0..4 {
        client.cancel_order(1).await.unwrap();
    }

    let nonces: Vec<u64> = transport.posts().iter().map(|p| p.nonce()).collect();
    assert_eq!(nonces, vec![1, 2, 3, 50, 51]);
    assert!(nonces.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(seen.load(Ordering::SeqCst), 52);
}

#[tokio::test]
async fn test_active_orders_no_orders_is_empty_success() {
    let transport = Arc::new(FakeTransport::new().on_post(|_, _| failure("no orders")));
    let client = trade_client(Arc::clone(&transport), 0, 0);

    let orders = client.active_orders("").await.unwrap();
    assert!(orders.is_empty());
    // No pair, so no metadata fetch
    assert!(transport.gets().is_empty());
}

#[tokio::test]
async fn test_trade_history_no_trades_is_empty_success() {
    let transport = Arc::new(FakeTransport::new().on_post(|_, _| failure("no trades")));
    let client = trade_client(Arc::clone(&transport), 0, 0);

    let params = TradeHistoryParams {
        count: 10,
        ..Default::default()
    };
    let trades = client.trade_history(&params).await.unwrap();
    assert!(trades.is_empty());

    let post = &transport.posts()[0];
    assert_eq!(post.field("count").as_deref(), Some("10"));
    assert_eq!(post.field("from_id"), None);
}

#[tokio::test]
async fn test_empty_result_only_for_its_method() {
    let transport = Arc::new(FakeTransport::new().on_post(|_, _| failure("no orders")));
    let client = trade_client(Arc::clone(&transport), 0, 0);

    let err = client.get_info().await.unwrap_err();
    assert!(matches!(err, ApiError::Domain(ref msg) if msg == "no orders"));
}

#[tokio::test]
async fn test_domain_error_is_not_retried() {
    let transport = Arc::new(FakeTransport::new().on_post(|_, _| failure("It is not enough BTC")));
    let client = trade_client(Arc::clone(&transport), 5, 5);

    let err = client.get_info().await.unwrap_err();
    assert!(matches!(err, ApiError::Domain(_)));
    assert_eq!(transport.posts().len(), 1);
}

#[tokio::test]
async fn test_malformed_envelope_is_decode_error() {
    let transport =
        Arc::new(FakeTransport::new().on_post(|_, _| Ok("<html>maintenance</html>".to_string())));
    let client = trade_client(Arc::clone(&transport), 5, 5);

    let err = client.get_info().await.unwrap_err();
    assert!(matches!(err, ApiError::Decode(_)));
    assert_eq!(transport.posts().len(), 1);
}

#[tokio::test]
async fn test_trade_formats_rate_and_amount() {
    let transport = Arc::new(FakeTransport::new().on_post(|_, _| {
        success(r#"{"received": 0.1, "remains": 0.4, "order_id": 12345, "funds": {"usd": 1.0}}"#)
    }));
    let client = trade_client(Arc::clone(&transport), 0, 0);

    let params = TradeParams {
        pair: "btc_usd".to_string(),
        order_type: TradeType::Sell,
        rate: Decimal::from_str("6543.21987").unwrap(),
        amount: Decimal::from_str("0.5").unwrap(),
    };
    let result = client.trade(&params).await.unwrap();
    assert_eq!(result.order_id, 12345);
    client.trade(&params).await.unwrap();

    let post = &transport.posts()[0];
    assert_eq!(post.field("method").as_deref(), Some("Trade"));
    assert_eq!(post.field("pair").as_deref(), Some("btc_usd"));
    assert_eq!(post.field("type").as_deref(), Some("sell"));
    assert_eq!(post.field("rate").as_deref(), Some("6543.220"));
    assert_eq!(post.field("amount").as_deref(), Some("0.50000000"));

    // Metadata fetched once for both calls
    let info_fetches = transport
        .gets()
        .iter()
        .filter(|url| url.ends_with("/api/3/info"))
        .count();
    assert_eq!(info_fetches, 1);
}

#[tokio::test]
async fn test_unknown_pair_fails_before_sending() {
    let transport = Arc::new(FakeTransport::new().on_post(|_, _| success("{}")));
    let client = trade_client(Arc::clone(&transport), 0, 0);

    let err = client
        .call(&ActiveOrdersParams {
            pair: "foo_bar".to_string(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Config(ref msg) if msg.contains("foo_bar")));
    assert!(transport.posts().is_empty());
    assert_eq!(client.current_nonce().await, Some(1));
}

#[tokio::test]
async fn test_public_ticker_path() {
    let transport = Arc::new(FakeTransport::new().on_get(|_, _| {
        Ok(r#"{"btc_usd": {"high": 110, "low": 90, "avg": 100, "vol": 1000, "vol_cur": 10,
                          "last": 101, "buy": 100.5, "sell": 101.5, "updated": 1370816308}}"#
            .to_string())
    }));
    let client = public_client(Arc::clone(&transport));

    let tickers = client.ticker(&["btc_usd", "ltc_btc"]).await.unwrap();
    assert_eq!(tickers["btc_usd"].last, 101.0);
    assert_eq!(transport.gets(), vec!["https://wex.test/api/3/ticker/btc_usd-ltc_btc"]);
}

#[tokio::test]
async fn test_public_error_envelope() {
    let transport = Arc::new(
        FakeTransport::new().on_get(|_, _| failure("Invalid pair name: foo_bar")),
    );
    let client = public_client(Arc::clone(&transport));

    let err = client.depth(&["foo_bar"], 10).await.unwrap_err();
    assert!(matches!(err, ApiError::Domain(ref msg) if msg.contains("foo_bar")));
    assert_eq!(transport.gets(), vec!["https://wex.test/api/3/depth/foo_bar?limit=10"]);
}

#[tokio::test]
async fn test_public_info_is_cached() {
    let transport = Arc::new(FakeTransport::new());
    let client = public_client(Arc::clone(&transport));

    let first = client.info().await.unwrap();
    let second = client.info().await.unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.pairs["ltc_btc"].decimal_places, 5);
    assert_eq!(transport.gets().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_deadline_cuts_off_transport_backoff() {
    let transport = Arc::new(FakeTransport::new().on_post(|_, _| transport_error()));
    let retry = RetryPolicy {
        initial_backoff: Duration::from_secs(10),
        max_backoff: Duration::from_secs(10),
        ..RetryPolicy::immediate(5, 0)
    };
    let client = WexClient::with_transport(client_config(0, 0).with_retry(retry), transport.clone())
        .with_credentials(Credentials::new("test-key", "test-secret", 1));

    let ctx = CallContext::new().with_timeout(Duration::from_millis(100));
    let err = client.call_with(&GetInfoParams, &ctx).await.unwrap_err();

    assert!(matches!(err, ApiError::DeadlineExceeded));
    // Gave up during the first backoff
    assert_eq!(transport.posts().len(), 1);
}
