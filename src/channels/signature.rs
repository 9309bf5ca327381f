//! Webhook origin checks
//!
//! - [`verify_hub_signature`]: Messenger `X-Hub-Signature-256` (HMAC-SHA256 of the raw body)
//! - [`constant_time_eq`]: secret comparison for Telegram secrets and API tokens

use hmac::Hmac;
use hmac::Mac;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::errors::Result;
use crate::errors::ShopRagError;

type HmacSha256 = Hmac<Sha256>;

/// Verify a hex-encoded HMAC-SHA256 signature of `body`.
///
/// Verification runs in constant time via `Mac::verify_slice`.
pub fn verify_hmac_sha256(secret: &[u8], body: &[u8], signature_hex: &str) -> Result<()> {
    let expected_bytes = hex::decode(signature_hex).map_err(|_| ShopRagError::InvalidSignature)?;

    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|_| ShopRagError::ConfigError("invalid HMAC key".to_string()))?;
    mac.update(body);

    mac.verify_slice(&expected_bytes)
        .map_err(|_| ShopRagError::InvalidSignature)
}

/// Verify a Messenger `X-Hub-Signature-256` header value (`sha256=<hex>`).
///
/// A missing header, a missing prefix or a wrong digest are all
/// [`ShopRagError::InvalidSignature`].
pub fn verify_hub_signature(app_secret: &str, body: &[u8], header: Option<&str>) -> Result<()> {
    let signature = header
        .map(str::trim)
        .and_then(|h| h.strip_prefix("sha256="))
        .ok_or(ShopRagError::InvalidSignature)?;
    verify_hmac_sha256(app_secret.as_bytes(), body, signature)
}

/// Hex-encoded HMAC-SHA256, as Messenger computes it
pub fn compute_hmac_sha256_hex(secret: &[u8], body: &[u8]) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|_| ShopRagError::ConfigError("invalid HMAC key".to_string()))?;
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Compare secrets in constant time; only the length comparison short-circuits
#[must_use]
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    bool::from(a.ct_eq(b))
}
