//! Trade API parameter formatting
//!
//! Every request type declares a static schema once: the wire name of each
//! field, how to read it, and which formatting rule applies. Formatting walks
//! that schema and produces the flat key/value mapping that gets url-encoded
//! and signed.

use crate::error::ApiError;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;

/// Fractional digits used for every amount field
pub const AMOUNT_DECIMAL_PLACES: u32 = 8;

/// Wire key/value pairs of a request, sorted by key
pub type WireFields = BTreeMap<String, String>;

/// Pair metadata lookups needed by the formatter and the depth cache
pub trait PairMetadata: Send + Sync {
    fn pair_exists(&self, pair: &str) -> bool;

    /// Price precision for a pair, `None` if the pair is unknown
    fn decimal_places(&self, pair: &str) -> Option<u32>;
}

/// How a field is rendered on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRule {
    /// Always rendered with 8 fractional digits, zero included
    Amount,
    /// Rendered with the pair's declared precision
    Rate,
    /// Omitted when zero/empty, otherwise rendered as-is
    Plain,
}

/// Value read from a request field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Str(String),
    Int(i64),
    UInt(u64),
    Decimal(Decimal),
}

impl FieldValue {
    /// Zero values mean "filter unset" and are not sent
    fn is_blank(&self) -> bool {
        match self {
            FieldValue::Str(s) => s.is_empty(),
            FieldValue::Int(v) => *v == 0,
            FieldValue::UInt(v) => *v == 0,
            FieldValue::Decimal(d) => d.is_zero(),
        }
    }

    fn as_decimal(&self) -> Option<Decimal> {
        match self {
            FieldValue::Decimal(d) => Some(*d),
            FieldValue::Int(v) => Some(Decimal::from(*v)),
            FieldValue::UInt(v) => Some(Decimal::from(*v)),
            FieldValue::Str(s) => s.parse().ok(),
        }
    }

    fn render(&self) -> String {
        match self {
            FieldValue::Str(s) => s.clone(),
            FieldValue::Int(v) => v.to_string(),
            FieldValue::UInt(v) => v.to_string(),
            FieldValue::Decimal(d) => d.normalize().to_string(),
        }
    }
}

impl From<&String> for FieldValue {
    fn from(value: &String) -> Self {
        FieldValue::Str(value.clone())
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Int(value)
    }
}

impl From<u64> for FieldValue {
    fn from(value: u64) -> Self {
        FieldValue::UInt(value)
    }
}

impl From<u32> for FieldValue {
    fn from(value: u32) -> Self {
        FieldValue::UInt(u64::from(value))
    }
}

impl From<Decimal> for FieldValue {
    fn from(value: Decimal) -> Self {
        FieldValue::Decimal(value)
    }
}

/// One field of a request schema
pub struct FieldSpec<R> {
    pub wire_name: String,
    pub rule: FieldRule,
    get: fn(&R) -> FieldValue,
}

/// Static description of a request type
pub struct Schema<R> {
    method: &'static str,
    fields: Vec<FieldSpec<R>>,
}

impl<R> Schema<R> {
    pub fn new(method: &'static str) -> Self {
        Self {
            method,
            fields: Vec::new(),
        }
    }

    /// Adds a field; `name` is the field's CamelCase name, mapped to its wire name here
    pub fn field(mut self, name: &str, rule: FieldRule, get: fn(&R) -> FieldValue) -> Self {
        self.fields.push(FieldSpec {
            wire_name: wire_name(name),
            rule,
            get,
        });
        self
    }

    /// Trade API method name
    pub fn method(&self) -> &'static str {
        self.method
    }

    pub fn fields(&self) -> &[FieldSpec<R>] {
        &self.fields
    }
}

/// A trade API request with a statically declared schema
pub trait ApiRequest: Sized + Send + Sync + 'static {
    /// Shape of the `return` payload on success
    type Response: DeserializeOwned + Default + Send;

    /// Error message prefix that this method uses to report an empty result
    const EMPTY_RESULT_ERROR: Option<&'static str> = None;

    fn schema() -> &'static Schema<Self>;

    /// Pair this request concerns, if any
    fn pair(&self) -> Option<&str> {
        None
    }
}

/// Maps a CamelCase field name to its wire name
///
/// Names are lower-cased, a trailing `Id` becomes `_id` (`OrderId` →
/// `order_id`), and `CoinName` keeps the exchange's spelling `coinName`.
pub fn wire_name(field: &str) -> String {
    let name = match field.strip_suffix("Id") {
        Some(stem) => format!("{}_id", stem),
        None => field.to_string(),
    };
    let lower = name.to_lowercase();
    if lower == "coinname" {
        "coinName".to_string()
    } else {
        lower
    }
}

/// Renders a decimal with exactly `places` fractional digits
pub fn format_fixed(value: Decimal, places: u32) -> String {
    let mut rounded = value.round_dp_with_strategy(places, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(places);
    rounded.to_string()
}

/// Converts a request into its wire fields
///
/// `method` and `nonce` are not included; the client adds them.
///
/// # Errors
/// * `Config` - the request names a pair unknown to `metadata`, or has a rate
///   field but no pair to take the precision from
pub fn format_params<R: ApiRequest>(
    request: &R,
    metadata: Option<&dyn PairMetadata>,
) -> Result<WireFields, ApiError> {
    let decimal_places = match request.pair().filter(|p| !p.is_empty()) {
        Some(pair) => {
            let places = metadata
                .and_then(|m| m.decimal_places(pair))
                .ok_or_else(|| ApiError::Config(format!("Unknown pair: {}", pair)))?;
            Some(places)
        }
        None => None,
    };

    let mut fields = WireFields::new();
    for spec in R::schema().fields() {
        let value = (spec.get)(request);
        let rendered = match spec.rule {
            FieldRule::Amount => {
                let amount = value.as_decimal().ok_or_else(|| {
                    ApiError::Config(format!("{} is not a number", spec.wire_name))
                })?;
                Some(format_fixed(amount, AMOUNT_DECIMAL_PLACES))
            }
            FieldRule::Rate => {
                let places = decimal_places.ok_or_else(|| {
                    ApiError::Config(format!("{} requires a currency pair", spec.wire_name))
                })?;
                let rate = value.as_decimal().ok_or_else(|| {
                    ApiError::Config(format!("{} is not a number", spec.wire_name))
                })?;
                Some(format_fixed(rate, places))
            }
            FieldRule::Plain if value.is_blank() => None,
            FieldRule::Plain => Some(value.render()),
        };

        if let Some(rendered) = rendered {
            fields.insert(spec.wire_name.clone(), rendered);
        }
    }

    Ok(fields)
}
