//! HTTP transport
//!
//! One attempt = one request. Retries, signing and envelope decoding live in
//! the client; a transport only moves bytes and reports failures.

use crate::error::ApiError;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

/// User agent sent with every request
const USER_AGENT: &str = concat!("wex-provider/", env!("CARGO_PKG_VERSION"));

/// Single-attempt HTTP transport
///
/// Any failure (network error, timeout, non-2xx status) is reported as
/// `ApiError::Transport`, which the client retries.
#[async_trait]
pub trait Transport: Send + Sync {
    /// GET `url`, returning the response body
    async fn get(&self, url: &str) -> Result<String, ApiError>;

    /// POST a url-encoded `body` with the given headers, returning the response body
    async fn post_form(
        &self,
        url: &str,
        headers: &[(&'static str, String)],
        body: &str,
    ) -> Result<String, ApiError>;
}

/// reqwest-based transport with a fixed per-attempt timeout
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Creates a transport whose requests time out after `timeout`
    pub fn new(timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ApiError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str) -> Result<String, ApiError> {
        let response = self.client.get(url).send().await?;
        let response = response.error_for_status()?;
        Ok(response.text().await?)
    }

    async fn post_form(
        &self,
        url: &str,
        headers: &[(&'static str, String)],
        body: &str,
    ) -> Result<String, ApiError> {
        let mut request = self
            .client
            .post(url)
            .header(
                reqwest::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            )
            .body(body.to_string());

        for (name, value) in headers {
            request = request.header(*name, value);
        }

        let response = request.send().await?.error_for_status()?;
        Ok(response.text().await?)
    }
}
