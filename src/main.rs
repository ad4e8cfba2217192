use std::sync::Arc;
use std::time::Duration;
use wex_provider::config::{CacheConfig, PusherConfig};
use wex_provider::orderbook::DepthCache;
use wex_provider::WexClient;

/// Amount of base currency evaluated on every tick
const EVALUATION_AMOUNT: f64 = 1.0;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let (pairs, interval) = parse_args(&args);

    // Logs go to stderr so stdout stays free for piping
    tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    if pairs.is_empty() {
        print_usage();
        std::process::exit(1);
    }

    tracing::info!(pairs = ?pairs, "Starting WEX depth watcher...");

    let client = Arc::new(WexClient::from_env()?);
    let cache = DepthCache::start_pusher(client, PusherConfig::from_env(), CacheConfig::default());

    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                match result {
                    Ok(()) => tracing::info!("Received shutdown signal (Ctrl+C)"),
                    Err(err) => tracing::error!("Failed to listen for shutdown signal: {}", err),
                }
                break;
            }
            _ = ticker.tick() => {
                for pair in &pairs {
                    match cache.query(pair).await {
                        Ok(Some(snapshot)) => {
                            let eval = snapshot.evaluation(EVALUATION_AMOUNT);
                            tracing::info!(
                                pair = %pair,
                                version = snapshot.version,
                                asks = snapshot.asks.len(),
                                bids = snapshot.bids.len(),
                                buy = eval.buy,
                                sell = eval.sell,
                                "Depth evaluation for {} unit",
                                EVALUATION_AMOUNT
                            );
                        }
                        Ok(None) => tracing::warn!(pair = %pair, "Unknown pair"),
                        Err(e) => tracing::error!(pair = %pair, error = %e, "Depth query failed"),
                    }
                }
            }
        }
    }

    cache.shutdown().await;
    tracing::info!("Depth watcher stopped");
    Ok(())
}

/// Parse command-line arguments into pairs and the evaluation interval
fn parse_args(args: &[String]) -> (Vec<String>, Duration) {
    let mut pairs = Vec::new();
    let mut interval = Duration::from_secs(5);

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--interval" => {
                if i + 1 < args.len() {
                    interval = Duration::from_secs(args[i + 1].parse().unwrap_or(5).max(1));
                    i += 1;
                }
            }
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            other if other.starts_with('-') => {
                eprintln!("Unknown argument: {}", other);
                print_usage();
                std::process::exit(1);
            }
            pair => pairs.push(pair.to_lowercase()),
        }
        i += 1;
    }

    (pairs, interval)
}

/// Print usage information
fn print_usage() {
    println!("wex-depth - live order book evaluation for WEX pairs");
    println!();
    println!("USAGE:");
    println!("    wex-depth [OPTIONS] <PAIR>...");
    println!();
    println!("OPTIONS:");
    println!("    --interval <SECS>   Seconds between evaluations (default: 5)");
    println!("    --help, -h          Print this help message");
    println!();
    println!("ENVIRONMENT VARIABLES:");
    println!("    WEX_BASE_URL          API base URL (default: https://wex.nz)");
    println!("    WEX_PUSHER_URL        Pusher WebSocket host (default: wss://ws.pusherapp.com)");
    println!("    WEX_PUSHER_APP_KEY    Pusher application key");
    println!("    WEX_API_KEY           Trade API key (optional)");
    println!("    WEX_API_SECRET        Trade API secret (optional)");
    println!("    RUST_LOG              Logging level (default: info)");
    println!();
    println!("EXAMPLES:");
    println!("    wex-depth btc_usd ltc_btc");
    println!("    wex-depth --interval 10 eth_usd");
}
