//! HMAC-SHA256 signatures carried by outbound webhook deliveries.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Prefix of the signature header value.
pub const SIGNATURE_PREFIX: &str = "sha256=";

/// Raised when a signing key cannot be used.
#[derive(Debug, Error)]
#[error("invalid signing key")]
pub struct SigningError;

/// Sign `body` with `secret`, returning the header value `sha256=<hex>`.
pub fn sign(secret: &str, body: &[u8]) -> Result<String, SigningError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| SigningError)?;
    mac.update(body);
    let digest = mac.finalize().into_bytes();
    Ok(format!("{SIGNATURE_PREFIX}{}", hex::encode(digest)))
}

/// Check a `sha256=<hex>` header value against `body` in constant time.
pub fn verify(secret: &str, body: &[u8], signature: &str) -> bool {
    let Some(encoded) = signature.strip_prefix(SIGNATURE_PREFIX) else {
        return false;
    };
    let Ok(expected) = hex::decode(encoded) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}
