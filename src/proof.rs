//! Day-rotating proof codes for cache invalidation.
//!
//! A proof is `hex(HMAC-SHA256(secret, days_since_epoch))`. It changes at
//! every UTC midnight and is recomputed per request, never stored.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const SECONDS_PER_DAY: i64 = 86_400;

/// Whole UTC days elapsed since the Unix epoch.
pub fn days_since_epoch(now: DateTime<Utc>) -> i64 {
    now.timestamp().div_euclid(SECONDS_PER_DAY)
}

/// Proof code for `secret` on day `day`.
pub fn compute_proof(secret: &str, day: i64) -> String {
    hex::encode(day_mac(secret, day).finalize().into_bytes())
}

/// Accept `code` if it matches today's proof for any of `secrets`.
///
/// Comparison is constant-time per secret. Which secret matched is not
/// reported.
pub fn verify_proof<'a>(
    code: &str,
    secrets: impl IntoIterator<Item = &'a str>,
    now: DateTime<Utc>,
) -> bool {
    let Ok(candidate) = hex::decode(code.trim()) else {
        return false;
    };
    let day = days_since_epoch(now);

    secrets
        .into_iter()
        .any(|secret| day_mac(secret, day).verify_slice(&candidate).is_ok())
}

fn day_mac(secret: &str, day: i64) -> HmacSha256 {
    // HMAC accepts keys of any length, so construction cannot fail.
    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret.as_bytes())
        .unwrap_or_else(|_| unreachable!("HMAC accepts any key length"));
    mac.update(day.to_string().as_bytes());
    mac
}
