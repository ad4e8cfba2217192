//! Depth cache actor
//!
//! One task owns the state of every tracked pair. Queries arrive over a
//! bounded channel, push events over the feed's event channel, and both are
//! handled strictly one at a time, so a delta is never applied halfway
//! through a rebuild.
//!
//! The first query for a pair subscribes `<pair>.depth`, waits for the
//! subscription acknowledgement plus a settle delay, loads a REST snapshot
//! and then applies the deltas that queued up meanwhile. The feed carries no
//! sequence numbers, so a delta published between the acknowledgement and
//! the REST response may be applied on top of a snapshot that already
//! contains it. Upserts and deletes are idempotent, which keeps that case
//! harmless unless the same level changed again in between.

use crate::config::CacheConfig;
use crate::error::{ApiError, CacheError};
use crate::orderbook::feed::{PushEvent, PushFeed, RESUBSCRIBED_EVENT};
use crate::orderbook::snapshot::OrderBookSnapshot;
use crate::orderbook::types::{parse_depth_event, PairState};
use crate::wex::params::PairMetadata;
use crate::wex::{CallContext, WexClient};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Name of the push event carrying depth deltas
const DEPTH_EVENT: &str = "depth";

/// Answer to a depth query; `None` means the pair does not exist
pub type DepthAnswer = Result<Option<Arc<OrderBookSnapshot>>, CacheError>;

enum Command {
    Query {
        pair: String,
        reply: oneshot::Sender<DepthAnswer>,
    },
}

/// Handle to a running depth cache
///
/// Dropping every handle stops the actor; `shutdown` stops it explicitly and
/// waits for it to finish.
#[derive(Debug)]
pub struct DepthCacheHandle {
    commands: mpsc::Sender<Command>,
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Query { pair, .. } => f.debug_struct("Query").field("pair", pair).finish(),
        }
    }
}

impl DepthCacheHandle {
    /// Current depth of `pair`
    pub async fn query(&self, pair: &str) -> DepthAnswer {
        self.query_with(pair, &CallContext::default()).await
    }

    /// Current depth of `pair`, bounded by the context's token and deadline
    ///
    /// Giving up does not abort work the actor already started; a seed in
    /// progress still completes and is cached for the next query.
    pub async fn query_with(&self, pair: &str, ctx: &CallContext) -> DepthAnswer {
        let (reply, reply_rx) = oneshot::channel();
        let command = Command::Query {
            pair: pair.to_string(),
            reply,
        };

        let exchange = async {
            self.commands
                .send(command)
                .await
                .map_err(|_| CacheError::Stopped)?;
            reply_rx.await.map_err(|_| CacheError::Stopped)?
        };

        match ctx.run(async { Ok(exchange.await) }).await {
            Ok(answer) => answer,
            Err(ApiError::DeadlineExceeded) => Err(CacheError::DeadlineExceeded),
            Err(_) => Err(CacheError::Cancelled),
        }
    }

    /// Token cancelled on shutdown; shared with the push feed by `DepthCache::start_pusher`
    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    /// Stops the actor and waits for it to exit
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        if let Err(e) = self.task.await {
            error!(error = %e, "Depth cache task failed");
        }
    }
}

/// The actor owning all per-pair state
pub struct DepthCache {
    client: Arc<WexClient>,
    feed: Arc<dyn PushFeed>,
    config: CacheConfig,
    pairs: HashMap<String, PairState>,
    next_version: u64,
    shutdown: CancellationToken,
}

impl DepthCache {
    /// Spawns the actor
    ///
    /// `events` must be the receiver paired with `feed`.
    pub fn start(
        client: Arc<WexClient>,
        feed: Arc<dyn PushFeed>,
        events: mpsc::UnboundedReceiver<PushEvent>,
        config: CacheConfig,
    ) -> DepthCacheHandle {
        Self::start_with_token(client, feed, events, config, CancellationToken::new())
    }

    /// Starts a Pusher feed and a cache sharing one shutdown token
    #[cfg(feature = "websocket")]
    pub fn start_pusher(
        client: Arc<WexClient>,
        pusher: crate::config::PusherConfig,
        config: CacheConfig,
    ) -> DepthCacheHandle {
        let shutdown = CancellationToken::new();
        let (feed, events) =
            crate::orderbook::websocket::PusherFeed::start(pusher, shutdown.clone());
        Self::start_with_token(client, Arc::new(feed), events, config, shutdown)
    }

    fn start_with_token(
        client: Arc<WexClient>,
        feed: Arc<dyn PushFeed>,
        events: mpsc::UnboundedReceiver<PushEvent>,
        config: CacheConfig,
        shutdown: CancellationToken,
    ) -> DepthCacheHandle {
        let (command_tx, command_rx) = mpsc::channel(config.queue_capacity.max(1));

        let actor = Self {
            client,
            feed,
            config,
            pairs: HashMap::new(),
            next_version: 0,
            shutdown: shutdown.clone(),
        };
        let task = tokio::spawn(actor.run(command_rx, events));

        DepthCacheHandle {
            commands: command_tx,
            shutdown,
            task,
        }
    }

    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut events: mpsc::UnboundedReceiver<PushEvent>,
    ) {
        info!("Depth cache started");
        let shutdown = self.shutdown.clone();
        let mut events_open = true;

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                event = events.recv(), if events_open => match event {
                    Some(event) => self.apply_event(event),
                    None => {
                        warn!("Push feed closed, cached books will no longer update");
                        events_open = false;
                    }
                },
                command = commands.recv() => match command {
                    Some(Command::Query { pair, reply }) => {
                        let answer = self.depth(&pair, &mut events).await;
                        if let Err(e) = &answer {
                            error!(pair = %pair, error = %e, "Depth query failed");
                        }
                        let _ = reply.send(answer);
                    }
                    None => break,
                },
            }
        }

        info!(pairs = self.pairs.len(), "Depth cache stopped");
    }

    /// Applies one push event; unknown pairs and malformed payloads are dropped
    fn apply_event(&mut self, event: PushEvent) {
        if event.event == RESUBSCRIBED_EVENT {
            self.invalidate(&event.channel);
            return;
        }
        if event.event != DEPTH_EVENT {
            debug!(channel = %event.channel, event = %event.event, "Ignoring push event");
            return;
        }
        let Some(pair) = event.channel.strip_suffix(".depth") else {
            debug!(channel = %event.channel, "Ignoring depth event on unexpected channel");
            return;
        };
        let Some(state) = self.pairs.get_mut(pair) else {
            debug!(pair = %pair, "Ignoring depth event for untracked pair");
            return;
        };

        match parse_depth_event(&event.data) {
            Ok(delta) => {
                debug!(
                    pair = %pair,
                    ask_count = delta.ask.len(),
                    bid_count = delta.bid.len(),
                    "Applied depth delta"
                );
                state.apply_delta(&delta);
            }
            Err(e) => {
                warn!(pair = %pair, error = %e, data = %event.data, "Dropping malformed depth event");
            }
        }
    }

    /// Forgets the seed of a pair whose channel went through a reconnect
    fn invalidate(&mut self, channel: &str) {
        let Some(state) = channel
            .strip_suffix(".depth")
            .and_then(|pair| self.pairs.get_mut(pair))
        else {
            return;
        };
        if state.seeded {
            info!(channel = %channel, "Depth channel resubscribed, order book will be reloaded");
        }
        state.invalidate();
    }

    async fn depth(
        &mut self,
        pair: &str,
        events: &mut mpsc::UnboundedReceiver<PushEvent>,
    ) -> DepthAnswer {
        let ctx = CallContext::new().with_cancel(self.shutdown.child_token());
        let seeding_error = |source| CacheError::Seeding {
            pair: pair.to_string(),
            source,
        };

        let info = self.client.info_with(&ctx).await.map_err(seeding_error)?;
        if !info.pair_exists(pair) {
            debug!(pair = %pair, "Unknown pair");
            return Ok(None);
        }

        let state = self.pairs.entry(pair.to_string()).or_default();
        if let Some(snapshot) = state.cached.as_ref().filter(|_| state.seeded) {
            return Ok(Some(Arc::clone(snapshot)));
        }

        if !state.subscribed {
            let channel = format!("{}.depth", pair);
            info!(pair = %pair, channel = %channel, "Subscribing to depth channel");

            tokio::select! {
                _ = self.shutdown.cancelled() => return Err(CacheError::Stopped),
                result = self.feed.subscribe(&channel) => {
                    result.map_err(|source| CacheError::Subscription {
                        pair: pair.to_string(),
                        source,
                    })?;
                }
            }
            state.subscribed = true;

            tokio::select! {
                _ = self.shutdown.cancelled() => return Err(CacheError::Stopped),
                _ = tokio::time::sleep(self.config.settle_delay) => {}
            }
        }

        if !state.seeded {
            info!(pair = %pair, depth = self.config.seed_depth, "Seeding order book");
            let mut depth = self
                .client
                .depth_with(&[pair], self.config.seed_depth, &ctx)
                .await
                .map_err(seeding_error)?;
            let seed = depth.remove(pair).unwrap_or_default();
            state.seed(&seed);
            info!(
                pair = %pair,
                asks = state.asks.len(),
                bids = state.bids.len(),
                "Order book seeded"
            );

            while let Ok(event) = events.try_recv() {
                self.apply_event(event);
            }
        }

        let Some(state) = self.pairs.get_mut(pair) else {
            return Err(CacheError::Stopped);
        };
        if let Some(snapshot) = &state.cached {
            return Ok(Some(Arc::clone(snapshot)));
        }

        self.next_version += 1;
        let snapshot = Arc::new(OrderBookSnapshot::build(
            &state.asks,
            &state.bids,
            self.next_version,
        ));
        debug!(pair = %pair, version = snapshot.version, "Rebuilt depth snapshot");
        state.cached = Some(Arc::clone(&snapshot));

        Ok(Some(snapshot))
    }
}
