//! Trade API request signing

use crate::error::ApiError;
use hmac::{Hmac, Mac};
use sha2::Sha512;

type HmacSha512 = Hmac<Sha512>;

/// Generates the HMAC-SHA512 signature of a request body
///
/// The signature covers the exact url-encoded body bytes that are sent,
/// nonce included, and is returned as lowercase hex.
pub fn sign(secret: &str, body: &str) -> Result<String, ApiError> {
    let mut mac = HmacSha512::new_from_slice(secret.as_bytes())
        .map_err(|e| ApiError::Config(format!("Invalid secret key: {}", e)))?;

    mac.update(body.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}
