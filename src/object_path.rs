use crate::error::{Result, SigilError};

/// Where a request path points inside a backend's bucket.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectPath {
    /// Object key relative to the bucket root, e.g. `video/index.m3u8`
    pub key: String,
    /// Directory of `key` with trailing slash (empty at the bucket root),
    /// the prefix under which sibling segment files live
    pub path_in_bucket: String,
    /// Directory of the request path as received, with leading and
    /// trailing slash, e.g. `/videos/video/`
    pub request_dir: String,
}

impl ObjectPath {
    /// Resolve a request path against `bucket`.
    ///
    /// The path is percent-decoded; if its first segment equals the bucket
    /// name it is stripped from the key.
    pub fn resolve(request_path: &str, bucket: &str) -> Result<Self> {
        let decoded = urlencoding::decode(request_path)
            .map_err(|_| invalid(format!("path is not valid UTF-8: {request_path}")))?;

        let trimmed = decoded.trim_start_matches('/');
        if trimmed.is_empty() {
            return Err(invalid("empty object path"));
        }

        let segments: Vec<&str> = trimmed.split('/').collect();
        if segments.iter().any(|s| s.is_empty() || *s == "." || *s == "..") {
            return Err(invalid(format!("malformed object path: {decoded}")));
        }

        let key_segments = if segments.len() > 1 && segments[0] == bucket {
            &segments[1..]
        } else {
            &segments[..]
        };

        let key = key_segments.join("/");
        let path_in_bucket = directory_of(&key);

        // Keep the raw (still encoded) form for URLs pointing back at us.
        let request_dir = match request_path.rfind('/') {
            Some(idx) => request_path[..=idx].to_string(),
            None => "/".to_string(),
        };
        let request_dir = if request_dir.starts_with('/') {
            request_dir
        } else {
            format!("/{request_dir}")
        };

        Ok(Self {
            key,
            path_in_bucket,
            request_dir,
        })
    }
}

fn directory_of(key: &str) -> String {
    match key.rfind('/') {
        Some(idx) => key[..=idx].to_string(),
        None => String::new(),
    }
}

fn invalid(msg: impl Into<String>) -> SigilError {
    SigilError::InvalidRequest(msg.into())
}
