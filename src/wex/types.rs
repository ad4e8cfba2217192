//! Public API Type Definitions
//!
//! Type definitions for the public v3 API (`/api/3/...`) and the response
//! envelope shared by the trade API and failed public calls.

use crate::wex::params::PairMetadata;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

/// Result of the public `info` method
///
/// Fetched once per client and cached; pair metadata is treated as static.
///
/// # Example Response
/// ```json
/// {
///   "server_time": 1370814956,
///   "pairs": {
///     "btc_usd": {"decimal_places": 3, "min_price": 0.1, "max_price": 400,
///                 "min_amount": 0.01, "hidden": 0, "fee": 0.2}
///   }
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PublicInfo {
    pub server_time: i64,
    pub pairs: HashMap<String, PairInfo>,
}

/// Trading rules of one pair
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PairInfo {
    /// Price precision accepted by the exchange
    pub decimal_places: u32,
    pub min_price: f64,
    pub max_price: f64,
    pub min_amount: f64,
    #[serde(default)]
    pub hidden: u8,
    /// Fee in percent
    pub fee: f64,
}

impl PairMetadata for PublicInfo {
    fn pair_exists(&self, pair: &str) -> bool {
        self.pairs.contains_key(pair)
    }

    fn decimal_places(&self, pair: &str) -> Option<u32> {
        self.pairs.get(pair).map(|info| info.decimal_places)
    }
}

/// Result item of the public `ticker` method
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickerInfo {
    pub high: f64,
    pub low: f64,
    pub avg: f64,
    pub vol: f64,
    pub vol_cur: f64,
    #[serde(default)]
    pub last: f64,
    pub buy: f64,
    pub sell: f64,
    pub updated: i64,
}

/// One `[price, amount]` entry of a depth response
///
/// Values are kept as the exchange printed them; the exchange sends JSON
/// numbers, which are captured in their textual form.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Offer(
    #[serde(deserialize_with = "number_or_string")] pub String,
    #[serde(deserialize_with = "number_or_string")] pub String,
);

impl Offer {
    pub fn price(&self) -> &str {
        &self.0
    }

    pub fn amount(&self) -> &str {
        &self.1
    }
}

/// Result item of the public `depth` method
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DepthInfo {
    #[serde(default)]
    pub asks: Vec<Offer>,
    #[serde(default)]
    pub bids: Vec<Offer>,
}

/// Envelope of every trade API response and of failed public calls
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteResult {
    #[serde(default = "success_default")]
    pub success: u8,
    #[serde(default)]
    pub error: String,
    #[serde(rename = "return", default)]
    pub payload: Option<serde_json::Value>,
}

fn success_default() -> u8 {
    1
}

impl RemoteResult {
    pub fn is_success(&self) -> bool {
        self.success != 0
    }
}

/// Accepts a JSON number or string and keeps its text
pub fn number_or_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected number or string, got {}",
            other
        ))),
    }
}
