//! Pusher client for the exchange's depth channels
//!
//! Speaks Pusher protocol 7: waits for `pusher:connection_established`,
//! subscribes `<pair>.depth` channels, answers `pusher:ping`, and forwards
//! every channel event to the depth cache. On disconnect it reconnects with
//! exponential backoff (1s, 2s, 4s, ... capped) and resubscribes all channels;
//! a channel acknowledged again after a reconnect is reported to the cache as
//! `RESUBSCRIBED_EVENT` so its book gets reloaded.

use crate::config::PusherConfig;
use crate::error::FeedError;
use crate::orderbook::feed::{PushEvent, PushFeed, RESUBSCRIBED_EVENT};
use async_trait::async_trait;
use futures_util::{Sink, SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::{BTreeSet, HashMap};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep, timeout, Duration};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const CONNECTION_ESTABLISHED: &str = "pusher:connection_established";
const SUBSCRIPTION_SUCCEEDED: &str = "pusher_internal:subscription_succeeded";

/// Raw Pusher frame
#[derive(Debug, Deserialize)]
struct PusherFrame {
    event: String,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    data: Value,
}

impl PusherFrame {
    /// Pusher double-encodes `data` as a JSON string; accept both forms
    fn data_text(&self) -> String {
        match &self.data {
            Value::String(text) => text.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }
}

enum FeedCommand {
    Subscribe {
        channel: String,
        ack: oneshot::Sender<Result<(), FeedError>>,
    },
}

/// Handle to a running Pusher connection
#[derive(Debug, Clone)]
pub struct PusherFeed {
    commands: mpsc::UnboundedSender<FeedCommand>,
    subscribe_timeout: Duration,
}

impl std::fmt::Debug for FeedCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeedCommand::Subscribe { channel, .. } => {
                f.debug_struct("Subscribe").field("channel", channel).finish()
            }
        }
    }
}

impl PusherFeed {
    /// Starts the connection task
    ///
    /// Returns the feed handle and the receiver of channel events. The task
    /// runs until `shutdown` is cancelled, every handle is dropped, or the
    /// event receiver is dropped.
    pub fn start(
        config: PusherConfig,
        shutdown: CancellationToken,
    ) -> (Self, mpsc::UnboundedReceiver<PushEvent>) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let feed = Self {
            commands: command_tx,
            subscribe_timeout: config.subscribe_timeout,
        };

        let connection = PusherConnection {
            config,
            commands: command_rx,
            events: event_tx,
            shutdown,
            channels: BTreeSet::new(),
            acked: BTreeSet::new(),
            confirmed: BTreeSet::new(),
            pending: HashMap::new(),
            retry_count: 0,
        };
        tokio::spawn(connection.run());

        (feed, event_rx)
    }
}

#[async_trait]
impl PushFeed for PusherFeed {
    async fn subscribe(&self, channel: &str) -> Result<(), FeedError> {
        let (ack, ack_rx) = oneshot::channel();
        self.commands
            .send(FeedCommand::Subscribe {
                channel: channel.to_string(),
                ack,
            })
            .map_err(|_| FeedError::Closed)?;

        match timeout(self.subscribe_timeout, ack_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(FeedError::Closed),
            Err(_) => Err(FeedError::SubscribeTimeout(channel.to_string())),
        }
    }
}

/// Outcome of one connection attempt
enum Disconnect {
    /// Stop for good
    Stop,
    /// Reconnect after backoff
    Retry(FeedError),
}

struct PusherConnection {
    config: PusherConfig,
    commands: mpsc::UnboundedReceiver<FeedCommand>,
    events: mpsc::UnboundedSender<PushEvent>,
    shutdown: CancellationToken,
    /// Every channel ever requested; resubscribed after reconnect
    channels: BTreeSet<String>,
    /// Channels acknowledged on the current connection
    acked: BTreeSet<String>,
    /// Channels acknowledged on any connection
    confirmed: BTreeSet<String>,
    pending: HashMap<String, Vec<oneshot::Sender<Result<(), FeedError>>>>,
    retry_count: u32,
}

impl PusherConnection {
    async fn run(mut self) {
        loop {
            match self.connect_and_process().await {
                Disconnect::Stop => {
                    info!("Pusher connection closed");
                    break;
                }
                Disconnect::Retry(e) => {
                    let delay = std::cmp::min(
                        Duration::from_secs(2_u64.saturating_pow(self.retry_count)),
                        self.config.max_reconnect_delay,
                    );

                    warn!(
                        error = %e,
                        retry_count = self.retry_count,
                        delay_secs = delay.as_secs(),
                        "Pusher connection failed, retrying with exponential backoff"
                    );

                    tokio::select! {
                        _ = self.shutdown.cancelled() => break,
                        _ = sleep(delay) => {}
                    }
                    self.retry_count = self.retry_count.saturating_add(1).min(16);
                }
            }
        }

        for (_, waiters) in self.pending.drain() {
            for ack in waiters {
                let _ = ack.send(Err(FeedError::Closed));
            }
        }
    }

    async fn connect_and_process(&mut self) -> Disconnect {
        let url = self.config.connect_url();
        info!(url = %url, "Connecting to Pusher");

        let ws_stream = tokio::select! {
            _ = self.shutdown.cancelled() => return Disconnect::Stop,
            result = connect_async(url.as_str()) => match result {
                Ok((ws_stream, _)) => ws_stream,
                Err(e) => return Disconnect::Retry(FeedError::Connection(e.to_string())),
            },
        };
        let (mut write, mut read) = ws_stream.split();

        self.acked.clear();
        let mut established = false;
        let shutdown = self.shutdown.clone();

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    let _ = write.send(Message::Close(None)).await;
                    return Disconnect::Stop;
                }
                command = self.commands.recv() => {
                    let Some(FeedCommand::Subscribe { channel, ack }) = command else {
                        debug!("All feed handles dropped");
                        let _ = write.send(Message::Close(None)).await;
                        return Disconnect::Stop;
                    };
                    if self.acked.contains(&channel) {
                        let _ = ack.send(Ok(()));
                        continue;
                    }
                    // Not acked yet: (re)send, the earlier request may have been lost
                    self.pending.entry(channel.clone()).or_default().push(ack);
                    self.channels.insert(channel.clone());
                    if established {
                        if let Err(e) = send_subscribe(&mut write, &channel).await {
                            return Disconnect::Retry(e);
                        }
                    }
                }
                msg = read.next() => match msg {
                    Some(Ok(Message::Text(text))) => {
                        let frame = match serde_json::from_str::<PusherFrame>(text.as_str()) {
                            Ok(frame) => frame,
                            Err(e) => {
                                warn!(error = %e, text = %text.as_str(), "Dropping malformed Pusher frame");
                                continue;
                            }
                        };

                        match frame.event.as_str() {
                            CONNECTION_ESTABLISHED => {
                                info!("Pusher connection established");
                                established = true;
                                self.retry_count = 0;
                                for channel in &self.channels {
                                    if let Err(e) = send_subscribe(&mut write, channel).await {
                                        return Disconnect::Retry(e);
                                    }
                                }
                            }
                            SUBSCRIPTION_SUCCEEDED => {
                                let Some(channel) = frame.channel.clone() else { continue };
                                info!(channel = %channel, "Subscription succeeded");
                                if let Some(waiters) = self.pending.remove(&channel) {
                                    for ack in waiters {
                                        let _ = ack.send(Ok(()));
                                    }
                                }
                                self.acked.insert(channel.clone());

                                if !self.confirmed.insert(channel.clone()) {
                                    info!(channel = %channel, "Channel resubscribed after reconnect");
                                    let event = PushEvent::new(channel, RESUBSCRIBED_EVENT, frame.data_text());
                                    if self.events.send(event).is_err() {
                                        info!("Event receiver dropped, closing Pusher connection");
                                        let _ = write.send(Message::Close(None)).await;
                                        return Disconnect::Stop;
                                    }
                                }
                            }
                            "pusher:ping" => {
                                debug!("Received pusher:ping, sending pusher:pong");
                                let pong = json!({"event": "pusher:pong", "data": {}});
                                if let Err(e) = send_json(&mut write, &pong).await {
                                    return Disconnect::Retry(e);
                                }
                            }
                            "pusher:pong" => {}
                            // Pusher errors name no channel; every subscribe in flight fails
                            "pusher:error" => {
                                let message = frame.data_text();
                                warn!(data = %message, pending = self.pending.len(), "Pusher reported an error");
                                for (channel, waiters) in self.pending.drain() {
                                    for ack in waiters {
                                        let _ = ack.send(Err(FeedError::Rejected {
                                            channel: channel.clone(),
                                            message: message.clone(),
                                        }));
                                    }
                                }
                            }
                            _ => {
                                let Some(channel) = frame.channel.clone() else {
                                    debug!(event = %frame.event, "Ignoring event without channel");
                                    continue;
                                };
                                let event = PushEvent {
                                    channel,
                                    data: frame.data_text(),
                                    event: frame.event,
                                };
                                if self.events.send(event).is_err() {
                                    info!("Event receiver dropped, closing Pusher connection");
                                    let _ = write.send(Message::Close(None)).await;
                                    return Disconnect::Stop;
                                }
                            }
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if write.send(Message::Pong(data)).await.is_err() {
                            return Disconnect::Retry(FeedError::Connection("Failed to send pong".to_string()));
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        info!(frame = ?frame, "WebSocket close frame received");
                        return Disconnect::Retry(FeedError::Connection("Closed by server".to_string()));
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        error!(error = %e, "WebSocket error");
                        return Disconnect::Retry(FeedError::Connection(e.to_string()));
                    }
                    None => {
                        return Disconnect::Retry(FeedError::Connection("Stream ended".to_string()));
                    }
                }
            }
        }
    }
}

async fn send_json<S>(write: &mut S, value: &Value) -> Result<(), FeedError>
where
    S: Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    write
        .send(Message::text(value.to_string()))
        .await
        .map_err(|e| FeedError::Connection(e.to_string()))
}

async fn send_subscribe<S>(write: &mut S, channel: &str) -> Result<(), FeedError>
where
    S: Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    debug!(channel = %channel, "Subscribing");
    send_json(
        write,
        &json!({"event": "pusher:subscribe", "data": {"channel": channel}}),
    )
    .await
}
