//! Immutable depth snapshots and cost evaluation

use crate::orderbook::types::{BookSide, RawSide};
use serde::Serialize;
use std::cmp::Ordering;
use tracing::warn;

/// One price level of a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PriceLevel {
    pub price: f64,
    pub size: f64,
}

impl PriceLevel {
    pub fn new(price: f64, size: f64) -> Self {
        Self { price, size }
    }
}

/// Cost of buying and proceeds of selling a base-currency amount
///
/// NaN marks a side without enough depth for the amount.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Evaluation {
    pub buy: f64,
    pub sell: f64,
}

/// Point-in-time view of one pair's book
///
/// Asks are sorted ascending by price, bids descending. `version` grows with
/// every rebuild, so two snapshots with equal versions have equal content.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderBookSnapshot {
    pub asks: Vec<PriceLevel>,
    pub bids: Vec<PriceLevel>,
    pub version: u64,
    /// Build time (milliseconds since Unix epoch)
    pub timestamp: i64,
}

fn parse_side(side: &RawSide) -> Vec<PriceLevel> {
    side.iter()
        .filter_map(|(price, size)| match (price.parse::<f64>(), size.parse::<f64>()) {
            (Ok(price), Ok(size)) => Some(PriceLevel::new(price, size)),
            _ => {
                warn!(price, size, "Skipping unparseable price level");
                None
            }
        })
        .collect()
}

/// Greedy best-first cost of `amount` against `levels`
fn sum_depth(mut amount: f64, levels: &[PriceLevel]) -> f64 {
    if amount.is_nan() {
        return f64::NAN;
    }

    let mut cost = 0.0;
    let mut levels = levels.iter();
    while amount > 0.0 {
        let Some(level) = levels.next() else {
            return f64::NAN;
        };
        if amount < level.size {
            return cost + amount * level.price;
        }
        cost += level.size * level.price;
        amount -= level.size;
    }
    cost
}

impl OrderBookSnapshot {
    /// Builds a snapshot from raw sides
    ///
    /// Levels whose text does not parse as a number are skipped.
    pub fn build(asks: &RawSide, bids: &RawSide, version: u64) -> Self {
        let mut asks = parse_side(asks);
        let mut bids = parse_side(bids);
        asks.sort_by(|a, b| a.price.partial_cmp(&b.price).unwrap_or(Ordering::Equal));
        bids.sort_by(|a, b| b.price.partial_cmp(&a.price).unwrap_or(Ordering::Equal));

        Self {
            asks,
            bids,
            version,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn best_ask(&self) -> Option<&PriceLevel> {
        self.asks.first()
    }

    pub fn best_bid(&self) -> Option<&PriceLevel> {
        self.bids.first()
    }

    /// Cost of taking `amount` from one side, NaN if the side is too thin
    pub fn evaluate(&self, amount: f64, side: BookSide) -> f64 {
        match side {
            BookSide::Asks => sum_depth(amount, &self.asks),
            BookSide::Bids => sum_depth(amount, &self.bids),
        }
    }

    pub fn evaluation(&self, amount: f64) -> Evaluation {
        Evaluation {
            buy: self.evaluate(amount, BookSide::Asks),
            sell: self.evaluate(amount, BookSide::Bids),
        }
    }

    /// The same book seen from the quote currency
    ///
    /// Bids become asks and vice versa; each price becomes `1/price` and each
    /// size becomes `size * price`. Order is preserved, which keeps both
    /// sides correctly sorted. The version is kept.
    pub fn invert(&self) -> Self {
        let flip = |levels: &[PriceLevel]| -> Vec<PriceLevel> {
            levels
                .iter()
                .map(|level| PriceLevel::new(1.0 / level.price, level.size * level.price))
                .collect()
        };

        Self {
            asks: flip(&self.bids),
            bids: flip(&self.asks),
            version: self.version,
            timestamp: self.timestamp,
        }
    }
}
