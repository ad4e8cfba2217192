//! WEX HTTP Client
//!
//! Public v3 API and authenticated trade API over a pluggable transport.
//!
//! A trade API call goes through two independent retry loops: transport
//! failures replay the same signed body, while an "invalid nonce" reply makes
//! the client adopt the nonce the exchange asked for and sign a fresh request.
//! Calls on one client are serialized by the credentials lock, since a nonce
//! is read, incremented and used as one step.

use crate::config::{ClientConfig, Credentials, RetryPolicy};
use crate::error::{ApiError, CallOutcome};
use crate::wex::params::{format_params, ApiRequest, PairMetadata};
use crate::wex::private::{
    ActiveOrdersParams, ActiveOrdersResult, CancelOrderParams, CancelOrderResult,
    CoinDepositAddressParams, CoinDepositAddressResult, CreateCouponParams, CreateCouponResult,
    GetInfoParams, GetInfoResult, OrderInfoParams, OrderInfoResult, RedeemCouponParams,
    RedeemCouponResult, TradeHistoryParams, TradeHistoryResult, TradeParams, TradeResult,
    TransHistoryParams, TransHistoryResult, WithdrawCoinParams, WithdrawCoinResult,
};
use crate::wex::rate_limiter::RateLimiter;
use crate::wex::signer;
use crate::wex::transport::{HttpTransport, Transport};
use crate::wex::types::{DepthInfo, PublicInfo, RemoteResult, TickerInfo};
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OnceCell};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// Prefix of the trade API error that carries a corrected nonce
const INVALID_NONCE_PREFIX: &str = "invalid nonce parameter;";

/// Cancellation and deadline for one call
///
/// The default context never cancels and has no deadline; each HTTP attempt
/// is still bounded by the transport timeout.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl CallContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Runs `fut` until it completes, the token is cancelled or the deadline passes
    pub async fn run<T, F>(&self, fut: F) -> Result<T, ApiError>
    where
        F: Future<Output = Result<T, ApiError>>,
    {
        let deadline = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ApiError::Cancelled),
            _ = deadline => Err(ApiError::DeadlineExceeded),
            result = fut => result,
        }
    }
}

/// Extracts the corrected nonce from an "invalid nonce" error message
///
/// The exchange reports e.g. `invalid nonce parameter; on key:4000000, you
/// sent:1, you should send:4000001`; the value after the last colon is the
/// nonce to use next.
pub fn parse_nonce_correction(message: &str) -> Option<u64> {
    if !message.starts_with(INVALID_NONCE_PREFIX) {
        return None;
    }
    let (_, tail) = message.rsplit_once(':')?;
    tail.trim().parse().ok()
}

/// WEX REST API client
///
/// Explicitly constructed and owned by the caller; there is no shared
/// default instance.
pub struct WexClient {
    transport: Arc<dyn Transport>,
    base_url: String,
    retry: RetryPolicy,
    credentials: Option<Mutex<Credentials>>,
    info: OnceCell<Arc<PublicInfo>>,
    rate_limiter: RateLimiter,
}

impl std::fmt::Debug for WexClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WexClient")
            .field("base_url", &self.base_url)
            .field("retry", &self.retry)
            .field("authenticated", &self.credentials.is_some())
            .finish()
    }
}

impl WexClient {
    /// Creates a client using the reqwest transport
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        let transport = HttpTransport::new(config.timeout)?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Creates a client over a custom transport
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            base_url: config.base_url,
            retry: config.retry,
            credentials: None,
            info: OnceCell::new(),
            rate_limiter: RateLimiter::new(
                config.requests_per_minute,
                config.rate_limit_queue_timeout,
            ),
        }
    }

    /// Creates a client from `WEX_*` environment variables
    ///
    /// Credentials are attached when `WEX_API_KEY` and `WEX_API_SECRET` are
    /// set; otherwise only public methods work.
    pub fn from_env() -> Result<Self, ApiError> {
        let config = ClientConfig::from_env().map_err(|e| ApiError::Config(e.to_string()))?;
        let client = Self::new(config)?;
        match Credentials::from_env() {
            Ok(credentials) => {
                info!(key = %credentials.key, "API credentials found, trade API enabled");
                Ok(client.with_credentials(credentials))
            }
            Err(reason) => {
                warn!(reason = %reason, "API credentials not found, only public methods will work");
                Ok(client)
            }
        }
    }

    /// Attaches trade API credentials
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(Mutex::new(credentials));
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Nonce the next trade API request will carry
    pub async fn current_nonce(&self) -> Option<u64> {
        match &self.credentials {
            Some(credentials) => Some(credentials.lock().await.nonce()),
            None => None,
        }
    }

    /// Resolves a path against the base URL; absolute URLs pass through
    pub fn resolve(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// Runs one logical request with the transport retry budget
    ///
    /// Each attempt replays the same request; the closure must not re-sign.
    async fn send_with_retries<F, Fut>(&self, what: &str, attempt: F) -> Result<String, ApiError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<String, ApiError>>,
    {
        let budget = self.retry.transient_error_attempts;
        let mut retry = 0;

        loop {
            let result = match self.rate_limiter.wait().await {
                Ok(()) => attempt().await,
                Err(e) => Err(ApiError::Transport(e.to_string())),
            };

            match result {
                Ok(body) => return Ok(body),
                Err(e) if e.is_retryable() && retry < budget => {
                    let delay = self.retry.backoff_for(retry);
                    retry += 1;
                    warn!(
                        request = %what,
                        error = %e,
                        error_type = e.error_type(),
                        retry,
                        budget,
                        delay_ms = delay.as_millis() as u64,
                        "Transport failure, retrying"
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
                Err(e) => {
                    warn!(
                        request = %what,
                        error = %e,
                        error_type = e.error_type(),
                        retries = retry,
                        "Request failed"
                    );
                    return Err(e);
                }
            }
        }
    }

    // Public API

    /// Calls a public v3 method for the given pairs
    ///
    /// Calls GET /api/3/<method>/<pair-pair-...>
    ///
    /// # Errors
    /// * `Transport` - all attempts failed
    /// * `Domain` - the exchange answered with `{"success":0,"error":...}`
    /// * `Decode` - the body is not the expected shape
    pub async fn call_public<T: DeserializeOwned>(
        &self,
        method: &str,
        pairs: &[&str],
        query: &[(&str, String)],
        ctx: &CallContext,
    ) -> Result<T, ApiError> {
        ctx.run(self.call_public_inner(method, pairs, query)).await
    }

    async fn call_public_inner<T: DeserializeOwned>(
        &self,
        method: &str,
        pairs: &[&str],
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let mut path = format!("/api/3/{}", method);
        if !pairs.is_empty() {
            path.push('/');
            path.push_str(&pairs.join("-"));
        }
        if !query.is_empty() {
            let encoded = serde_urlencoded::to_string(query)
                .map_err(|e| ApiError::Config(format!("Cannot encode query: {}", e)))?;
            path.push('?');
            path.push_str(&encoded);
        }
        let url = self.resolve(&path);

        debug!(method = %method, url = %url, "Calling public API");
        let body = self
            .send_with_retries(method, || self.transport.get(&url))
            .await?;

        let value: serde_json::Value = serde_json::from_str(&body)?;
        if let Ok(envelope) = serde_json::from_value::<RemoteResult>(value.clone()) {
            if !envelope.is_success() {
                return Err(ApiError::Domain(envelope.error));
            }
        }

        serde_json::from_value(value).map_err(ApiError::from)
    }

    /// Pair metadata, fetched on first use and cached for the client's lifetime
    pub async fn info(&self) -> Result<Arc<PublicInfo>, ApiError> {
        self.info_with(&CallContext::default()).await
    }

    pub async fn info_with(&self, ctx: &CallContext) -> Result<Arc<PublicInfo>, ApiError> {
        ctx.run(self.info_inner()).await
    }

    async fn info_inner(&self) -> Result<Arc<PublicInfo>, ApiError> {
        self.info
            .get_or_try_init(|| async {
                let info: PublicInfo = self.call_public_inner("info", &[], &[]).await?;
                info!(pairs = info.pairs.len(), "Fetched pair metadata");
                Ok::<_, ApiError>(Arc::new(info))
            })
            .await
            .cloned()
    }

    /// Ticker for each pair
    pub async fn ticker(&self, pairs: &[&str]) -> Result<HashMap<String, TickerInfo>, ApiError> {
        self.call_public("ticker", pairs, &[], &CallContext::default())
            .await
    }

    /// Order book depth for each pair, up to `limit` levels per side
    pub async fn depth(
        &self,
        pairs: &[&str],
        limit: u32,
    ) -> Result<HashMap<String, DepthInfo>, ApiError> {
        self.depth_with(pairs, limit, &CallContext::default()).await
    }

    pub async fn depth_with(
        &self,
        pairs: &[&str],
        limit: u32,
        ctx: &CallContext,
    ) -> Result<HashMap<String, DepthInfo>, ApiError> {
        self.call_public("depth", pairs, &[("limit", limit.to_string())], ctx)
            .await
    }

    // Trade API

    /// Invokes a trade API method
    ///
    /// # Errors
    /// * `Config` - no credentials, or the request names an unknown pair
    /// * `Transport` - transport budget exhausted
    /// * `Nonce` - nonce correction budget exhausted
    /// * `Domain` - any other error reported by the exchange
    /// * `Decode` - malformed envelope or payload
    pub async fn call<R: ApiRequest>(&self, request: &R) -> CallOutcome<R::Response> {
        self.call_with(request, &CallContext::default()).await
    }

    pub async fn call_with<R: ApiRequest>(
        &self,
        request: &R,
        ctx: &CallContext,
    ) -> CallOutcome<R::Response> {
        ctx.run(self.call_inner(request)).await
    }

    async fn call_inner<R: ApiRequest>(&self, request: &R) -> CallOutcome<R::Response> {
        let credentials = self
            .credentials
            .as_ref()
            .ok_or_else(|| ApiError::Config("API credentials not configured".to_string()))?;

        let metadata = match request.pair().filter(|pair| !pair.is_empty()) {
            Some(_) => Some(self.info_inner().await?),
            None => None,
        };
        let fields = format_params(
            request,
            metadata.as_deref().map(|info| info as &dyn PairMetadata),
        )?;
        let method = R::schema().method();
        trace!(method, ?fields, "RPC params");

        let mut credentials = credentials.lock().await;
        let result = self.remote_call(&mut credentials, method, &fields).await?;
        drop(credentials);

        if !result.is_success() {
            if let Some(prefix) = R::EMPTY_RESULT_ERROR {
                if result.error.starts_with(prefix) {
                    debug!(method, error = %result.error, "Empty result reported as error");
                    return Ok(R::Response::default());
                }
            }
            if result.error.starts_with(INVALID_NONCE_PREFIX) {
                return Err(ApiError::Nonce(result.error));
            }
            return Err(ApiError::Domain(result.error));
        }

        let payload = result.payload.unwrap_or(serde_json::Value::Null);
        serde_json::from_value(payload)
            .map_err(|e| ApiError::Decode(format!("Unexpected {} result: {}", method, e)))
    }

    /// Signs and sends one trade API request, correcting the nonce when asked to
    ///
    /// Returns the envelope as received; a remote failure is a normal result
    /// here. Only transport and envelope decoding failures are errors.
    async fn remote_call(
        &self,
        credentials: &mut Credentials,
        method: &str,
        fields: &BTreeMap<String, String>,
    ) -> Result<RemoteResult, ApiError> {
        let url = self.resolve("/tapi");
        let mut corrections_left = self.retry.nonce_correction_attempts;

        loop {
            let nonce = credentials.next_nonce();

            let mut params = fields.clone();
            params.insert("method".to_string(), method.to_string());
            params.insert("nonce".to_string(), nonce.to_string());
            let body = serde_urlencoded::to_string(&params)
                .map_err(|e| ApiError::Config(format!("Cannot encode parameters: {}", e)))?;

            let signature = signer::sign(credentials.secret.expose_secret(), &body)?;
            let headers = [
                ("Key", credentials.key.expose_secret().to_string()),
                ("Sign", signature),
            ];

            debug!(method, nonce, "Calling trade API");
            let raw = self
                .send_with_retries(method, || self.transport.post_form(&url, &headers, &body))
                .await?;

            let result: RemoteResult = serde_json::from_str(&raw)?;
            trace!(
                method,
                success = result.success,
                error = %result.error,
                payload = ?result.payload,
                "RPC result"
            );

            if !result.is_success() {
                if let Some(corrected) = parse_nonce_correction(&result.error) {
                    if corrections_left == 0 {
                        warn!(method, nonce, "Nonce correction budget exhausted");
                        return Ok(result);
                    }
                    corrections_left -= 1;
                    info!(method, sent = nonce, corrected, "Nonce replaced");
                    credentials.correct_nonce(corrected);
                    continue;
                }
            }

            return Ok(result);
        }
    }

    // Typed trade API wrappers

    pub async fn get_info(&self) -> CallOutcome<GetInfoResult> {
        self.call(&GetInfoParams).await
    }

    /// Open orders, optionally restricted to one pair (empty string = all)
    pub async fn active_orders(&self, pair: &str) -> CallOutcome<ActiveOrdersResult> {
        self.call(&ActiveOrdersParams {
            pair: pair.to_string(),
        })
        .await
    }

    pub async fn trade(&self, params: &TradeParams) -> CallOutcome<TradeResult> {
        self.call(params).await
    }

    pub async fn order_info(&self, order_id: u64) -> CallOutcome<OrderInfoResult> {
        self.call(&OrderInfoParams { order_id }).await
    }

    pub async fn cancel_order(&self, order_id: u64) -> CallOutcome<CancelOrderResult> {
        self.call(&CancelOrderParams { order_id }).await
    }

    pub async fn trade_history(
        &self,
        params: &TradeHistoryParams,
    ) -> CallOutcome<TradeHistoryResult> {
        self.call(params).await
    }

    pub async fn trans_history(
        &self,
        params: &TransHistoryParams,
    ) -> CallOutcome<TransHistoryResult> {
        self.call(params).await
    }

    pub async fn coin_deposit_address(
        &self,
        coin_name: &str,
    ) -> CallOutcome<CoinDepositAddressResult> {
        self.call(&CoinDepositAddressParams {
            coin_name: coin_name.to_string(),
        })
        .await
    }

    pub async fn withdraw_coin(
        &self,
        params: &WithdrawCoinParams,
    ) -> CallOutcome<WithdrawCoinResult> {
        self.call(params).await
    }

    pub async fn create_coupon(
        &self,
        params: &CreateCouponParams,
    ) -> CallOutcome<CreateCouponResult> {
        self.call(params).await
    }

    pub async fn redeem_coupon(&self, coupon: &str) -> CallOutcome<RedeemCouponResult> {
        self.call(&RedeemCouponParams {
            coupon: coupon.to_string(),
        })
        .await
    }
}
