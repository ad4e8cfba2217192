//! Trade API Type Definitions
//!
//! Parameters and results of the authenticated (`/tapi`) methods. Each
//! parameter type carries its wire schema; results are decoded from the
//! `return` field of the response envelope.

use crate::wex::params::{ApiRequest, FieldRule, FieldValue, Schema};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

/// Balances by currency, returned by most trading methods
pub type Funds = HashMap<String, f64>;

/// Direction of a trade order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeType {
    #[default]
    Buy,
    Sell,
}

impl fmt::Display for TradeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeType::Buy => write!(f, "buy"),
            TradeType::Sell => write!(f, "sell"),
        }
    }
}

/// Sort order for history queries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

fn sort_order_value(order: Option<SortOrder>) -> FieldValue {
    FieldValue::Str(match order {
        Some(SortOrder::Asc) => "ASC".to_string(),
        Some(SortOrder::Desc) => "DESC".to_string(),
        None => String::new(),
    })
}

// getInfo

/// Parameters of the private `getInfo` method (account balances and rights)
#[derive(Debug, Clone, Default)]
pub struct GetInfoParams;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Rights {
    pub info: u8,
    pub trade: u8,
    pub withdraw: u8,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GetInfoResult {
    #[serde(default)]
    pub funds: Funds,
    #[serde(default)]
    pub rights: Rights,
    #[serde(default)]
    pub transaction_count: u64,
    #[serde(default)]
    pub open_orders: u64,
    #[serde(default)]
    pub server_time: i64,
}

impl ApiRequest for GetInfoParams {
    type Response = GetInfoResult;

    fn schema() -> &'static Schema<Self> {
        static SCHEMA: OnceLock<Schema<GetInfoParams>> = OnceLock::new();
        SCHEMA.get_or_init(|| Schema::<Self>::new("getInfo"))
    }
}

// ActiveOrders

#[derive(Debug, Clone, Default)]
pub struct ActiveOrdersParams {
    /// Restrict to one pair; empty means all pairs
    pub pair: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActiveOrder {
    pub pair: String,
    #[serde(rename = "type")]
    pub order_type: TradeType,
    pub amount: f64,
    pub rate: f64,
    pub timestamp_created: i64,
    pub status: u8,
}

/// Open orders keyed by order id
pub type ActiveOrdersResult = HashMap<u64, ActiveOrder>;

impl ApiRequest for ActiveOrdersParams {
    type Response = ActiveOrdersResult;

    const EMPTY_RESULT_ERROR: Option<&'static str> = Some("no orders");

    fn schema() -> &'static Schema<Self> {
        static SCHEMA: OnceLock<Schema<ActiveOrdersParams>> = OnceLock::new();
        SCHEMA.get_or_init(|| {
            Schema::<Self>::new("ActiveOrders").field("Pair", FieldRule::Plain, |p| (&p.pair).into())
        })
    }

    fn pair(&self) -> Option<&str> {
        Some(&self.pair)
    }
}

// Trade

#[derive(Debug, Clone, Default)]
pub struct TradeParams {
    pub pair: String,
    pub order_type: TradeType,
    pub rate: Decimal,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TradeResult {
    pub received: f64,
    pub remains: f64,
    /// Zero when the order was filled immediately
    pub order_id: u64,
    #[serde(default)]
    pub funds: Funds,
}

impl ApiRequest for TradeParams {
    type Response = TradeResult;

    fn schema() -> &'static Schema<Self> {
        static SCHEMA: OnceLock<Schema<TradeParams>> = OnceLock::new();
        SCHEMA.get_or_init(|| {
            Schema::<Self>::new("Trade")
                .field("Pair", FieldRule::Plain, |p| (&p.pair).into())
                .field("Type", FieldRule::Plain, |p| {
                    FieldValue::Str(p.order_type.to_string())
                })
                .field("Rate", FieldRule::Rate, |p| p.rate.into())
                .field("Amount", FieldRule::Amount, |p| p.amount.into())
        })
    }

    fn pair(&self) -> Option<&str> {
        Some(&self.pair)
    }
}

// OrderInfo

#[derive(Debug, Clone, Default)]
pub struct OrderInfoParams {
    pub order_id: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderInfo {
    pub pair: String,
    #[serde(rename = "type")]
    pub order_type: TradeType,
    pub start_amount: f64,
    pub amount: f64,
    pub rate: f64,
    pub timestamp_created: i64,
    pub status: u8,
}

pub type OrderInfoResult = HashMap<u64, OrderInfo>;

impl ApiRequest for OrderInfoParams {
    type Response = OrderInfoResult;

    fn schema() -> &'static Schema<Self> {
        static SCHEMA: OnceLock<Schema<OrderInfoParams>> = OnceLock::new();
        SCHEMA.get_or_init(|| {
            Schema::<Self>::new("OrderInfo").field("OrderId", FieldRule::Plain, |p| p.order_id.into())
        })
    }
}

// CancelOrder

#[derive(Debug, Clone, Default)]
pub struct CancelOrderParams {
    pub order_id: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CancelOrderResult {
    pub order_id: u64,
    #[serde(default)]
    pub funds: Funds,
}

impl ApiRequest for CancelOrderParams {
    type Response = CancelOrderResult;

    fn schema() -> &'static Schema<Self> {
        static SCHEMA: OnceLock<Schema<CancelOrderParams>> = OnceLock::new();
        SCHEMA.get_or_init(|| {
            Schema::<Self>::new("CancelOrder").field("OrderId", FieldRule::Plain, |p| p.order_id.into())
        })
    }
}

// TradeHistory

/// History filters; zero/empty fields are not sent
#[derive(Debug, Clone, Default)]
pub struct TradeHistoryParams {
    pub from: u64,
    pub count: u64,
    pub from_id: u64,
    pub end_id: u64,
    pub order: Option<SortOrder>,
    pub since: i64,
    pub end: i64,
    pub pair: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TradeHistoryItem {
    pub pair: String,
    #[serde(rename = "type")]
    pub order_type: TradeType,
    pub amount: f64,
    pub rate: f64,
    pub order_id: u64,
    pub is_your_order: u8,
    pub timestamp: i64,
}

pub type TradeHistoryResult = HashMap<u64, TradeHistoryItem>;

impl ApiRequest for TradeHistoryParams {
    type Response = TradeHistoryResult;

    const EMPTY_RESULT_ERROR: Option<&'static str> = Some("no trades");

    fn schema() -> &'static Schema<Self> {
        static SCHEMA: OnceLock<Schema<TradeHistoryParams>> = OnceLock::new();
        SCHEMA.get_or_init(|| {
            Schema::<Self>::new("TradeHistory")
                .field("From", FieldRule::Plain, |p| p.from.into())
                .field("Count", FieldRule::Plain, |p| p.count.into())
                .field("FromId", FieldRule::Plain, |p| p.from_id.into())
                .field("EndId", FieldRule::Plain, |p| p.end_id.into())
                .field("Order", FieldRule::Plain, |p| sort_order_value(p.order))
                .field("Since", FieldRule::Plain, |p| p.since.into())
                .field("End", FieldRule::Plain, |p| p.end.into())
                .field("Pair", FieldRule::Plain, |p| (&p.pair).into())
        })
    }

    fn pair(&self) -> Option<&str> {
        Some(&self.pair)
    }
}

// TransHistory

#[derive(Debug, Clone, Default)]
pub struct TransHistoryParams {
    pub from: u64,
    pub count: u64,
    pub from_id: u64,
    pub end_id: u64,
    pub order: Option<SortOrder>,
    pub since: i64,
    pub end: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransHistoryItem {
    #[serde(rename = "type")]
    pub trans_type: u8,
    pub amount: f64,
    pub currency: String,
    pub desc: String,
    pub status: u8,
    pub timestamp: i64,
}

pub type TransHistoryResult = HashMap<u64, TransHistoryItem>;

impl ApiRequest for TransHistoryParams {
    type Response = TransHistoryResult;

    fn schema() -> &'static Schema<Self> {
        static SCHEMA: OnceLock<Schema<TransHistoryParams>> = OnceLock::new();
        SCHEMA.get_or_init(|| {
            Schema::<Self>::new("TransHistory")
                .field("From", FieldRule::Plain, |p| p.from.into())
                .field("Count", FieldRule::Plain, |p| p.count.into())
                .field("FromId", FieldRule::Plain, |p| p.from_id.into())
                .field("EndId", FieldRule::Plain, |p| p.end_id.into())
                .field("Order", FieldRule::Plain, |p| sort_order_value(p.order))
                .field("Since", FieldRule::Plain, |p| p.since.into())
                .field("End", FieldRule::Plain, |p| p.end.into())
        })
    }
}

// CoinDepositAddress

#[derive(Debug, Clone, Default)]
pub struct CoinDepositAddressParams {
    pub coin_name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CoinDepositAddressResult {
    pub address: String,
}

impl ApiRequest for CoinDepositAddressParams {
    type Response = CoinDepositAddressResult;

    fn schema() -> &'static Schema<Self> {
        static SCHEMA: OnceLock<Schema<CoinDepositAddressParams>> = OnceLock::new();
        SCHEMA.get_or_init(|| {
            Schema::<Self>::new("CoinDepositAddress")
                .field("CoinName", FieldRule::Plain, |p| (&p.coin_name).into())
        })
    }
}

// WithdrawCoin

#[derive(Debug, Clone, Default)]
pub struct WithdrawCoinParams {
    pub coin_name: String,
    pub amount: Decimal,
    pub address: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WithdrawCoinResult {
    #[serde(rename = "tId")]
    pub trans_id: u64,
    #[serde(rename = "amountSent")]
    pub amount_sent: f64,
    #[serde(default)]
    pub funds: Funds,
}

impl ApiRequest for WithdrawCoinParams {
    type Response = WithdrawCoinResult;

    fn schema() -> &'static Schema<Self> {
        static SCHEMA: OnceLock<Schema<WithdrawCoinParams>> = OnceLock::new();
        SCHEMA.get_or_init(|| {
            Schema::<Self>::new("WithdrawCoin")
                .field("CoinName", FieldRule::Plain, |p| (&p.coin_name).into())
                .field("Amount", FieldRule::Amount, |p| p.amount.into())
                .field("Address", FieldRule::Plain, |p| (&p.address).into())
        })
    }
}

// CreateCoupon

#[derive(Debug, Clone, Default)]
pub struct CreateCouponParams {
    pub currency: String,
    pub amount: Decimal,
    /// Restrict redemption to this user; empty means anyone
    pub receiver: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateCouponResult {
    pub coupon: String,
    #[serde(rename = "transID")]
    pub trans_id: u64,
    #[serde(default)]
    pub funds: Funds,
}

impl ApiRequest for CreateCouponParams {
    type Response = CreateCouponResult;

    fn schema() -> &'static Schema<Self> {
        static SCHEMA: OnceLock<Schema<CreateCouponParams>> = OnceLock::new();
        SCHEMA.get_or_init(|| {
            Schema::<Self>::new("CreateCoupon")
                .field("Currency", FieldRule::Plain, |p| (&p.currency).into())
                .field("Amount", FieldRule::Amount, |p| p.amount.into())
                .field("Receiver", FieldRule::Plain, |p| (&p.receiver).into())
        })
    }
}

// RedeemCoupon

#[derive(Debug, Clone, Default)]
pub struct RedeemCouponParams {
    pub coupon: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RedeemCouponResult {
    #[serde(rename = "couponAmount")]
    pub coupon_amount: f64,
    #[serde(rename = "couponCurrency")]
    pub coupon_currency: String,
    #[serde(rename = "transID")]
    pub trans_id: u64,
    #[serde(default)]
    pub funds: Funds,
}

impl ApiRequest for RedeemCouponParams {
    type Response = RedeemCouponResult;

    fn schema() -> &'static Schema<Self> {
        static SCHEMA: OnceLock<Schema<RedeemCouponParams>> = OnceLock::new();
        SCHEMA.get_or_init(|| {
            Schema::<Self>::new("RedeemCoupon").field("Coupon", FieldRule::Plain, |p| (&p.coupon).into())
        })
    }
}
