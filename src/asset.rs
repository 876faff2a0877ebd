//! Content-hash ETags for static assets (posters).

use sha2::{Digest, Sha256};

/// Suffix that routes a request to the poster handler.
pub const POSTER_SUFFIX: &str = "_poster.jpg";

/// Strong ETag over the full body: quoted hex SHA-256.
pub fn compute_etag(body: &[u8]) -> String {
    format!("\"{}\"", hex::encode(Sha256::digest(body)))
}

/// Whether an `If-None-Match` header value names `etag`.
///
/// Accepts comma-separated lists and weak validators (`W/"..."`), per the
/// weak comparison rules for `If-None-Match`.
pub fn etag_matches(if_none_match: &str, etag: &str) -> bool {
    let wanted = strip_weak(etag.trim());
    if_none_match
        .split(',')
        .map(|candidate| strip_weak(candidate.trim()))
        .any(|candidate| candidate == "*" || candidate == wanted)
}

fn strip_weak(tag: &str) -> &str {
    tag.strip_prefix("W/").unwrap_or(tag)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn etag_is_quoted_sha256() {
        let etag = compute_etag(b"hello");
        assert_eq!(
            etag,
            "\"2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824\""
        );
    }

    #[test]
    fn same_bytes_same_etag() {
        assert_eq!(compute_etag(b"jpeg"), compute_etag(b"jpeg"));
        assert_ne!(compute_etag(b"jpeg"), compute_etag(b"jpeg2"));
    }

    #[test]
    fn matches_exact_list_and_weak() {
        let etag = "\"abc\"";
        assert!(etag_matches("\"abc\"", etag));
        assert!(etag_matches("\"x\", \"abc\"", etag));
        assert!(etag_matches("W/\"abc\"", etag));
        assert!(!etag_matches("\"abd\"", etag));
        assert!(!etag_matches("", etag));
    }
}
