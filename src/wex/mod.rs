//! WEX exchange API client
//!
//! Public v3 API (`info`, `ticker`, `depth`) and the signed trade API
//! (`/tapi`), with per-method request schemas and typed results.

pub mod client;
pub mod params;
pub mod private;
pub mod rate_limiter;
pub mod signer;
pub mod transport;
pub mod types;

pub use client::{parse_nonce_correction, CallContext, WexClient};
pub use params::{ApiRequest, FieldRule, FieldValue, PairMetadata, Schema};
pub use private::*;
pub use transport::{HttpTransport, Transport};
pub use types::{DepthInfo, Offer, PairInfo, PublicInfo, RemoteResult, TickerInfo};
