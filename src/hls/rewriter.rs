//! Line-preserving HLS manifest rewriting.
//!
//! Segment references (media segments, init segments, subtitles) are
//! replaced by signed URLs; relative variant playlist references are
//! rewritten to absolute URLs that route back through this proxy.
//! Everything else in the manifest is left byte-for-byte untouched.

use crate::error::{Result, SigilError};
use chrono::{DateTime, SecondsFormat, Utc};
use futures_util::future::try_join_all;
use std::future::Future;
use std::ops::Range;
use tracing::debug;
use url::Url;

/// File extensions treated as signable segment references.
pub const SEGMENT_EXTENSIONS: &[&str] = &[
    "ts", "m4s", "mp4", "m4a", "m4v", "aac", "mp3", "vtt", "webvtt", "cmfv", "cmfa",
];

pub const MANIFEST_EXTENSION: &str = ".m3u8";

/// Per-request inputs for [`rewrite_manifest`].
#[derive(Clone, Debug)]
pub struct RewriteContext<'a> {
    /// Bucket-relative directory prefix for sibling segments (`""` or `dir/`)
    pub path_in_bucket: &'a str,
    /// Absolute URL of the manifest's directory on this proxy
    pub request_base: &'a Url,
    /// Expiration stamped into the manifest as a comment
    pub expires_at: DateTime<Utc>,
}

/// Location of a URI inside a manifest line.
#[derive(Clone, Debug, PartialEq, Eq)]
struct UriRef {
    line: usize,
    span: Range<usize>,
}

/// Rewrite `text`, obtaining one signed URL per segment reference from `sign`.
///
/// `sign` receives the bucket-relative object key. All sign calls run
/// concurrently; the first failure aborts the rewrite. Output line order is
/// the input line order regardless of completion order.
pub async fn rewrite_manifest<F, Fut>(
    text: &str,
    ctx: &RewriteContext<'_>,
    sign: F,
) -> Result<String>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<String>>,
{
    let mut lines: Vec<String> = text.split('\n').map(str::to_string).collect();

    let refs: Vec<UriRef> = lines
        .iter()
        .enumerate()
        .filter_map(|(line, content)| {
            locate_uri(content)
                .filter(|span| is_segment_reference(&content[span.clone()]))
                .map(|span| UriRef { line, span })
        })
        .collect();

    debug!("Found {} segment references", refs.len());

    let keys: Vec<String> = refs
        .iter()
        .map(|r| segment_key(ctx.path_in_bucket, &lines[r.line][r.span.clone()]))
        .collect();

    // try_join_all keeps results in input order and fails fast.
    let signed = try_join_all(keys.into_iter().map(&sign)).await?;

    for (r, url) in refs.iter().zip(signed) {
        lines[r.line].replace_range(r.span.clone(), &url);
    }

    for line in lines.iter_mut() {
        let Some(span) = locate_uri(line) else {
            continue;
        };
        let absolute = {
            let uri = &line[span.clone()];
            if !is_nested_manifest_reference(uri) {
                continue;
            }
            ctx.request_base
                .join(uri)
                .map_err(|e| {
                    SigilError::InvalidRequest(format!("cannot resolve nested manifest {uri}: {e}"))
                })?
                .to_string()
        };
        line.replace_range(span, &absolute);
    }

    if !refs.is_empty() {
        let mut comment = expiry_comment(ctx.expires_at);
        // Match the header line's terminator
        if lines[0].ends_with('\r') {
            comment.push('\r');
        }
        lines.insert(1, comment);
    }

    Ok(lines.join("\n"))
}

/// Comment line announcing when the signed URLs stop being served from cache.
pub fn expiry_comment(expires_at: DateTime<Utc>) -> String {
    format!(
        "## Signed URLs valid until {}",
        expires_at.to_rfc3339_opts(SecondsFormat::Secs, true)
    )
}

/// Span of the URI carried by a line: the whole line for URI lines, or the
/// quoted value of a `URI="..."` attribute for tag lines.
fn locate_uri(line: &str) -> Option<Range<usize>> {
    let content = line.trim();
    if content.is_empty() {
        return None;
    }

    if !content.starts_with('#') {
        let start = line.len() - line.trim_start().len();
        return Some(start..start + content.len());
    }

    for (idx, _) in line.match_indices("URI=\"") {
        // Only a real attribute: preceded by the tag colon or an attribute comma
        let preceded_ok = line[..idx]
            .chars()
            .next_back()
            .is_some_and(|c| c == ':' || c == ',');
        if !preceded_ok {
            continue;
        }
        let start = idx + "URI=\"".len();
        let end = start + line[start..].find('"')?;
        return (end > start).then_some(start..end);
    }
    None
}

fn is_absolute(uri: &str) -> bool {
    uri.starts_with("//") || Url::parse(uri).is_ok()
}

/// Path portion of a URI reference (query and fragment removed).
fn uri_path(uri: &str) -> &str {
    uri.split(['?', '#']).next().unwrap_or(uri)
}

fn extension_of(path: &str) -> Option<&str> {
    let file = path.rsplit('/').next().unwrap_or(path);
    file.rsplit_once('.').map(|(_, ext)| ext)
}

pub fn is_segment_reference(uri: &str) -> bool {
    if is_absolute(uri) {
        return false;
    }
    extension_of(uri_path(uri)).is_some_and(|ext| {
        SEGMENT_EXTENSIONS
            .iter()
            .any(|known| known.eq_ignore_ascii_case(ext))
    })
}

pub fn is_nested_manifest_reference(uri: &str) -> bool {
    !is_absolute(uri) && uri_path(uri).to_ascii_lowercase().ends_with(MANIFEST_EXTENSION)
}

/// Object key to sign for a segment reference.
///
/// Root-relative references address the bucket root; everything else is
/// relative to the manifest's directory.
fn segment_key(path_in_bucket: &str, uri: &str) -> String {
    let path = uri_path(uri);
    let path = urlencoding::decode(path)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| path.to_string());

    match path.strip_prefix('/') {
        Some(rooted) => rooted.trim_start_matches('/').to_string(),
        None => format!("{path_in_bucket}{path}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    const MEDIA: &str = "#EXTM3U\n\
#EXT-X-VERSION:7\n\
#EXT-X-TARGETDURATION:6\n\
#EXT-X-MAP:URI=\"init.mp4\"\n\
#EXTINF:6.000,\n\
seg_000.m4s\n\
#EXTINF:6.000,\n\
seg_001.m4s\n\
#EXTINF:4.500,\n\
seg_002.m4s\n\
#EXT-X-ENDLIST\n";

    const MASTER: &str = "#EXTM3U\n\
#EXT-X-MEDIA:TYPE=AUDIO,GROUP-ID=\"aud\",NAME=\"en\",URI=\"audio/en.m3u8\"\n\
#EXT-X-STREAM-INF:BANDWIDTH=1280000,RESOLUTION=1280x720,AUDIO=\"aud\"\n\
720p/index.m3u8\n\
#EXT-X-STREAM-INF:BANDWIDTH=640000\n\
https://other.example.com/360p/index.m3u8\n";

    fn base() -> Url {
        Url::parse("https://proxy.example.com/videos/show/").unwrap()
    }

    fn ctx(base: &Url) -> RewriteContext<'_> {
        RewriteContext {
            path_in_bucket: "show/",
            request_base: base,
            expires_at: Utc.with_ymd_and_hms(2024, 3, 15, 13, 0, 0).unwrap(),
        }
    }

    async fn sign_ok(key: String) -> Result<String> {
        Ok(format!("https://bucket.example.com/{key}?X-Amz-Signature=abc"))
    }

    #[tokio::test]
    async fn replaces_every_segment_in_order() {
        let base = base();
        let out = rewrite_manifest(MEDIA, &ctx(&base), sign_ok).await.unwrap();
        let lines: Vec<&str> = out.split('\n').collect();

        assert_eq!(lines[0], "#EXTM3U");
        assert_eq!(lines[1], "## Signed URLs valid until 2024-03-15T13:00:00Z");
        assert_eq!(
            lines[4],
            "#EXT-X-MAP:URI=\"https://bucket.example.com/show/init.mp4?X-Amz-Signature=abc\""
        );
        assert_eq!(lines[6], "https://bucket.example.com/show/seg_000.m4s?X-Amz-Signature=abc");
        assert_eq!(lines[8], "https://bucket.example.com/show/seg_001.m4s?X-Amz-Signature=abc");
        assert_eq!(lines[10], "https://bucket.example.com/show/seg_002.m4s?X-Amz-Signature=abc");
        assert_eq!(out.matches("X-Amz-Signature").count(), 4);
    }

    #[tokio::test]
    async fn non_matching_lines_are_identical() {
        let base = base();
        let out = rewrite_manifest(MEDIA, &ctx(&base), sign_ok).await.unwrap();

        let mut output_lines: Vec<&str> = out.split('\n').collect();
        output_lines.remove(1);
        for (input, output) in MEDIA.split('\n').zip(output_lines) {
            if locate_uri(input).is_some_and(|span| is_segment_reference(&input[span])) {
                continue;
            }
            assert_eq!(input, output);
        }
        assert!(out.ends_with("#EXT-X-ENDLIST\n"));
    }

    #[tokio::test]
    async fn output_order_ignores_completion_order() {
        let base = base();
        // Earlier segments finish last
        let sign = |key: String| async move {
            let delay = if key.ends_with("seg_000.m4s") { 30 } else { 1 };
            tokio::time::sleep(Duration::from_millis(delay)).await;
            Ok(format!("https://signed/{key}"))
        };
        let out = rewrite_manifest(MEDIA, &ctx(&base), sign).await.unwrap();
        let segments: Vec<&str> = out.lines().filter(|l| l.starts_with("https://")).collect();
        assert_eq!(
            segments,
            vec![
                "https://signed/show/seg_000.m4s",
                "https://signed/show/seg_001.m4s",
                "https://signed/show/seg_002.m4s",
            ]
        );
    }

    #[tokio::test]
    async fn signing_runs_concurrently() {
        let base = base();
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let sign = |key: String| {
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok(key)
            }
        };

        rewrite_manifest(MEDIA, &ctx(&base), sign).await.unwrap();
        assert_eq!(peak.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn one_signing_failure_fails_the_rewrite() {
        let base = base();
        let sign = |key: String| async move {
            if key.ends_with("seg_001.m4s") {
                Err(SigilError::SigningError("denied".into()))
            } else {
                Ok(key)
            }
        };
        let err = rewrite_manifest(MEDIA, &ctx(&base), sign).await.unwrap_err();
        assert!(matches!(err, SigilError::SigningError(_)));
    }

    #[tokio::test]
    async fn master_playlist_routes_variants_through_proxy() {
        let base = base();
        let calls = AtomicUsize::new(0);
        let sign = |key: String| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Ok(key) }
        };

        let out = rewrite_manifest(MASTER, &ctx(&base), sign).await.unwrap();
        let lines: Vec<&str> = out.split('\n').collect();

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        // No segments: no expiry comment, header untouched
        assert_eq!(lines[0], "#EXTM3U");
        assert!(lines[1].starts_with("#EXT-X-MEDIA"));
        assert!(lines[1].contains("URI=\"https://proxy.example.com/videos/show/audio/en.m3u8\""));
        assert_eq!(lines[3], "https://proxy.example.com/videos/show/720p/index.m3u8");
        assert_eq!(lines[5], "https://other.example.com/360p/index.m3u8");
    }

    #[tokio::test]
    async fn manifest_without_references_is_unchanged() {
        let base = base();
        let text = "#EXTM3U\n#EXT-X-ENDLIST\n";
        let out = rewrite_manifest(text, &ctx(&base), sign_ok).await.unwrap();
        assert_eq!(out, text);
    }

    #[tokio::test]
    async fn root_relative_and_query_references() {
        let base = base();
        let text = "#EXTM3U\n#EXTINF:2,\n/shared/seg.ts?v=2\n#EXTINF:2,\nsub/seg%201.ts\n";
        let out = rewrite_manifest(text, &ctx(&base), |key| async move { Ok(format!("<{key}>")) })
            .await
            .unwrap();
        let lines: Vec<&str> = out.split('\n').collect();
        assert_eq!(lines[3], "<shared/seg.ts>");
        assert_eq!(lines[5], "<show/sub/seg 1.ts>");
    }

    #[tokio::test]
    async fn crlf_line_endings_survive() {
        let base = base();
        let text = "#EXTM3U\r\n#EXTINF:2,\r\nseg.ts\r\n";
        let out = rewrite_manifest(text, &ctx(&base), |key| async move { Ok(format!("S/{key}")) })
            .await
            .unwrap();
        assert_eq!(
            out,
            "#EXTM3U\r\n## Signed URLs valid until 2024-03-15T13:00:00Z\r\n#EXTINF:2,\r\nS/show/seg.ts\r\n"
        );
    }

    #[tokio::test]
    async fn output_parses_as_media_playlist() {
        let base = base();
        let out = rewrite_manifest(MEDIA, &ctx(&base), sign_ok).await.unwrap();
        match m3u8_rs::parse_playlist_res(out.as_bytes()) {
            Ok(m3u8_rs::Playlist::MediaPlaylist(pl)) => {
                assert_eq!(pl.segments.len(), 3);
                assert!(
                    pl.segments
                        .iter()
                        .all(|s| s.uri.starts_with("https://bucket.example.com/show/"))
                );
            }
            other => panic!("expected media playlist, got {:?}", other),
        }
    }

    #[test]
    fn classifies_references() {
        assert!(is_segment_reference("seg.ts"));
        assert!(is_segment_reference("a/b/SEG.TS"));
        assert!(is_segment_reference("chunk.m4s?token=1"));
        assert!(!is_segment_reference("https://cdn.example.com/seg.ts"));
        assert!(!is_segment_reference("//cdn.example.com/seg.ts"));
        assert!(!is_segment_reference("index.m3u8"));
        assert!(!is_segment_reference("key.bin"));

        assert!(is_nested_manifest_reference("720p/index.m3u8"));
        assert!(is_nested_manifest_reference("/abs/index.m3u8?x=1"));
        assert!(!is_nested_manifest_reference("http://a.example.com/index.m3u8"));
    }

    #[test]
    fn locates_uri_attributes_only() {
        assert_eq!(locate_uri("  seg.ts "), Some(2..8));
        assert_eq!(locate_uri("#EXTINF:6,"), None);
        assert_eq!(locate_uri(""), None);
        let line = "#EXT-X-MAP:URI=\"init.mp4\",BYTERANGE=\"1@0\"";
        assert_eq!(&line[locate_uri(line).unwrap()], "init.mp4");
        assert_eq!(locate_uri("#EXT-X-FOO:XURI=\"a.ts\""), None);
    }
}
