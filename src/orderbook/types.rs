//! Raw per-pair order book state
//!
//! Levels are kept as the exchange printed them, keyed by a canonical form
//! of the price so that `100`, `100.0` and `1e2` address the same level.

use crate::error::FeedError;
use crate::orderbook::snapshot::OrderBookSnapshot;
use crate::wex::types::{DepthInfo, Offer};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

/// Side of the book a cost is evaluated against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookSide {
    /// Buying consumes asks, cheapest first
    Asks,
    /// Selling consumes bids, highest first
    Bids,
}

fn parse_decimal(text: &str) -> Option<Decimal> {
    let text = text.trim();
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .ok()
}

/// Canonical key for a price; unparseable text is kept verbatim
pub fn canonical_price(price: &str) -> String {
    match parse_decimal(price) {
        Some(value) => value.normalize().to_string(),
        None => price.trim().to_string(),
    }
}

fn is_zero_size(size: &str) -> bool {
    match parse_decimal(size) {
        Some(value) => value.is_zero(),
        None => size.trim() == "0",
    }
}

/// One side of a pair's book: price text → size text
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawSide {
    levels: HashMap<String, String>,
}

impl RawSide {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upserts a level, or removes it when the size is zero
    pub fn apply(&mut self, price: &str, size: &str) {
        let key = canonical_price(price);
        if is_zero_size(size) {
            self.levels.remove(&key);
        } else {
            self.levels.insert(key, size.trim().to_string());
        }
    }

    pub fn get(&self, price: &str) -> Option<&str> {
        self.levels.get(&canonical_price(price)).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn clear(&mut self) {
        self.levels.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.levels.iter().map(|(p, s)| (p.as_str(), s.as_str()))
    }
}

impl FromIterator<(String, String)> for RawSide {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut side = RawSide::new();
        for (price, size) in iter {
            side.apply(&price, &size);
        }
        side
    }
}

/// Payload of a Pusher `depth` event
///
/// # Example
/// ```json
/// {"ask": [["105", "2"], ["100", "0"]], "bid": [[99.5, 1.25]]}
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DepthDelta {
    #[serde(default)]
    pub ask: Vec<Offer>,
    #[serde(default)]
    pub bid: Vec<Offer>,
}

/// Decodes the data of a `depth` event
pub fn parse_depth_event(data: &str) -> Result<DepthDelta, FeedError> {
    serde_json::from_str(data).map_err(|e| FeedError::Decode(e.to_string()))
}

/// Cache actor state of one pair
#[derive(Debug, Default)]
pub struct PairState {
    pub asks: RawSide,
    pub bids: RawSide,
    /// Last built snapshot; cleared by every applied delta
    pub cached: Option<Arc<OrderBookSnapshot>>,
    /// The depth channel subscription was acknowledged
    pub subscribed: bool,
    /// The REST snapshot was loaded
    pub seeded: bool,
}

impl PairState {
    pub fn apply_delta(&mut self, delta: &DepthDelta) {
        for offer in &delta.ask {
            self.asks.apply(offer.price(), offer.amount());
        }
        for offer in &delta.bid {
            self.bids.apply(offer.price(), offer.amount());
        }
        self.cached = None;
    }

    /// Replaces both sides with a REST depth snapshot
    pub fn seed(&mut self, depth: &DepthInfo) {
        self.asks.clear();
        self.bids.clear();
        for offer in &depth.asks {
            self.asks.apply(offer.price(), offer.amount());
        }
        for offer in &depth.bids {
            self.bids.apply(offer.price(), offer.amount());
        }
        self.seeded = true;
        self.cached = None;
    }

    /// Marks the book stale; the next query loads a fresh REST snapshot
    pub fn invalidate(&mut self) {
        self.seeded = false;
        self.cached = None;
    }
}
