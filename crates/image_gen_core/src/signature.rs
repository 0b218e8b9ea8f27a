//! Webhook request signatures: base64-encoded HMAC-SHA256 of the raw body,
//! keyed by the channel secret.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::digest::InvalidLength;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub fn sign_body(channel_secret: &str, body: &str) -> Result<String, InvalidLength> {
    let mut mac = HmacSha256::new_from_slice(channel_secret.as_bytes())?;
    mac.update(body.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// Checks `signature` against the body in constant time.
pub fn verify_signature(channel_secret: &str, body: &str, signature: &str) -> bool {
    let Ok(expected) = STANDARD.decode(signature.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(channel_secret.as_bytes()) else {
        return false;
    };
    mac.update(body.as_bytes());
    mac.verify_slice(&expected).is_ok()
}
