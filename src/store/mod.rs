//! Key-value cache store abstraction.
//!
//! The coordinator only talks to [`CacheStore`]; one adapter exists per
//! deployment target:
//! - [`memory::MemoryStore`] for a single process (default)
//! - `valkey::ValkeyStore` *(feature `valkey`)* shared across instances

pub mod memory;
#[cfg(feature = "valkey")]
pub mod valkey;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Metadata stored alongside every value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMetadata {
    /// Absolute expiration as Unix seconds.
    pub expiration: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub value: String,
    pub metadata: EntryMetadata,
}

/// One page of a key enumeration. `cursor` is `None` on the last page.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KeyPage {
    pub keys: Vec<String>,
    pub cursor: Option<String>,
}

#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn get_with_metadata(&self, key: &str) -> Result<Option<CacheEntry>>;

    /// Store `value` with `metadata`; the store drops it after `ttl`.
    async fn put(&self, key: &str, value: String, metadata: EntryMetadata, ttl: Duration)
    -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;

    /// Enumerate keys starting from `cursor` (`None` = from the beginning).
    async fn list(&self, cursor: Option<String>) -> Result<KeyPage>;
}
