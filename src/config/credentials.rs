//! API Credential Management
//!
//! Key, secret and nonce for the WEX trade API. The key and secret are wrapped
//! in `SecretString` so they never show up in logs; the nonce is the only part
//! of the credentials that changes at runtime.

use std::fmt;
use std::sync::Arc;

/// Secure string wrapper that masks sensitive data in logs
///
/// Debug output shows only `SecretString(***)` and Display shows the
/// truncated form `first4...last4`.
#[derive(Clone)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(value: String) -> Self {
        SecretString(value)
    }

    /// Returns a reference to the inner string
    ///
    /// Only use this when actually signing or sending a request.
    pub fn expose_secret(&self) -> &str {
        &self.0
    }

    /// Returns a masked version of the secret for safe logging
    pub fn masked(&self) -> String {
        let s = &self.0;
        if s.len() <= 8 {
            return "***".to_string();
        }
        format!("{}...{}", &s[..4], &s[s.len() - 4..])
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretString(***)")
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.masked())
    }
}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        SecretString::new(s)
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        SecretString::new(s.to_string())
    }
}

/// Receives every nonce change so the caller can persist it
///
/// Called with the value the *next* request will use, both after a nonce is
/// consumed and after the exchange supplied a corrected value.
pub trait NonceListener: Send + Sync {
    fn nonce_updated(&self, next_nonce: u64);
}

impl<F> NonceListener for F
where
    F: Fn(u64) + Send + Sync,
{
    fn nonce_updated(&self, next_nonce: u64) {
        self(next_nonce)
    }
}

/// WEX trade API credentials
#[derive(Clone)]
pub struct Credentials {
    /// API key (sent in the `Key` header)
    pub key: SecretString,
    /// API secret (HMAC-SHA512 signing key)
    pub secret: SecretString,
    /// Nonce the next request will carry
    nonce: u64,
    listener: Option<Arc<dyn NonceListener>>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("key", &self.key)
            .field("secret", &self.secret)
            .field("nonce", &self.nonce)
            .finish()
    }
}

impl Credentials {
    pub fn new(key: impl Into<SecretString>, secret: impl Into<SecretString>, nonce: u64) -> Self {
        Self {
            key: key.into(),
            secret: secret.into(),
            nonce,
            listener: None,
        }
    }

    /// Loads credentials from environment variables
    ///
    /// Reads `WEX_API_KEY`, `WEX_API_SECRET` and the optional `WEX_NONCE`
    /// (defaults to 1; a wrong value is corrected by the exchange on the first
    /// call). Key and secret are trimmed and must be non-empty.
    pub fn from_env() -> Result<Self, String> {
        let key = std::env::var("WEX_API_KEY")
            .map_err(|_| "WEX_API_KEY not set".to_string())?;
        let secret = std::env::var("WEX_API_SECRET")
            .map_err(|_| "WEX_API_SECRET not set".to_string())?;

        let key = key.trim().to_string();
        let secret = secret.trim().to_string();

        if key.is_empty() {
            return Err("WEX_API_KEY is empty after trimming whitespace".to_string());
        }
        if secret.is_empty() {
            return Err("WEX_API_SECRET is empty after trimming whitespace".to_string());
        }

        let nonce = match std::env::var("WEX_NONCE") {
            Ok(raw) => raw
                .trim()
                .parse::<u64>()
                .map_err(|e| format!("WEX_NONCE is not a valid integer: {}", e))?,
            Err(_) => 1,
        };

        Ok(Self::new(key, secret, nonce))
    }

    /// Attaches a listener notified on every nonce change
    pub fn with_listener(mut self, listener: Arc<dyn NonceListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Nonce the next request will carry
    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    /// Consumes the current nonce: returns it and advances the stored value
    pub fn next_nonce(&mut self) -> u64 {
        let current = self.nonce;
        self.nonce = current.saturating_add(1);
        self.notify();
        current
    }

    /// Overwrites the stored nonce with a server-supplied value
    pub fn correct_nonce(&mut self, corrected: u64) {
        self.nonce = corrected;
        self.notify();
    }

    fn notify(&self) {
        if let Some(listener) = &self.listener {
            listener.nonce_updated(self.nonce);
        }
    }
}
