//! HMAC-SHA256 signing for time-limited artifact download links.
//!
//! A link carries `expires` (unix seconds) and `signature`, the hex HMAC of
//! `"{path}\n{expires}"` under the storage signing secret.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::CoreError;

type HmacSha256 = Hmac<Sha256>;

/// Longest TTL a caller may request for a download link (7 days).
pub const MAX_URL_TTL_SECS: u64 = 7 * 24 * 3600;

/// Default TTL for download links (1 hour).
pub const DEFAULT_URL_TTL_SECS: u64 = 3600;

fn mac_for(key: &[u8], data: &[u8]) -> HmacSha256 {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(data);
    mac
}

/// Compute the hex signature for a download link.
pub fn sign_download(secret: &str, path: &str, expires_at: i64) -> String {
    let mac = mac_for(secret.as_bytes(), format!("{path}\n{expires_at}").as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Check a download link's signature and expiry against `now` (unix seconds).
pub fn verify_download(
    secret: &str,
    path: &str,
    expires_at: i64,
    signature: &str,
    now: i64,
) -> Result<(), CoreError> {
    if now > expires_at {
        return Err(CoreError::Forbidden("Download link has expired".into()));
    }
    let provided = hex::decode(signature)
        .map_err(|_| CoreError::Forbidden("Malformed download signature".into()))?;
    mac_for(secret.as_bytes(), format!("{path}\n{expires_at}").as_bytes())
        .verify_slice(&provided)
        .map_err(|_| CoreError::Forbidden("Invalid download signature".into()))
}

/// Compare two secrets without short-circuiting on the first differing byte.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    const KEY: &[u8] = b"credential-compare";
    let digest_a = mac_for(KEY, a).finalize().into_bytes();
    mac_for(KEY, b).verify_slice(&digest_a).is_ok()
}

/// Clamp a requested TTL into `1..=MAX_URL_TTL_SECS`.
pub fn clamp_ttl(requested: Option<u64>) -> u64 {
    requested
        .unwrap_or(DEFAULT_URL_TTL_SECS)
        .clamp(1, MAX_URL_TTL_SECS)
}
