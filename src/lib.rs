//! Sigil: an HLS manifest signing proxy.
//!
//! Manifests are fetched from private S3-compatible buckets, every segment
//! reference is replaced with a time-limited signed URL, and the result is
//! cached for slightly less than the signatures' lifetime.

pub mod asset;
pub mod backend;
pub mod cache;
pub mod config;
pub mod error;
pub mod hls;
pub mod metrics;
pub mod object_path;
pub mod proof;
pub mod server;
pub mod store;
