//! Durable key→entry cache.
//!
//! The store is deliberately policy-free: entries are replaced whole, never
//! merged, and staleness is a caller concern checked at read time. Nothing
//! here deletes entries; the entry count is bounded by the set of distinct
//! URLs ever requested.

mod memory_store;
mod sqlite_store;

pub use memory_store::MemoryCacheStore;
pub use sqlite_store::SqliteCacheStore;

use crate::shared::errors::EngineResult;
use chrono::Utc;
use serde_json::Value;
use std::time::Duration;

/// One cached response. Owned exclusively by the store; read-only elsewhere.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedEntry {
    pub payload: Value,
    /// Opaque revalidation token (ETag) if the backend supplied one.
    pub validator: Option<String>,
    /// Wall-clock store time in unix milliseconds. Staleness is measured
    /// from the original fetch, not from any later revalidation.
    pub stored_at_ms: i64,
}

impl CachedEntry {
    pub fn new(payload: Value, validator: Option<String>) -> Self {
        Self {
            payload,
            validator,
            stored_at_ms: Utc::now().timestamp_millis(),
        }
    }

    pub fn age(&self) -> Duration {
        let elapsed = Utc::now().timestamp_millis() - self.stored_at_ms;
        Duration::from_millis(elapsed.max(0) as u64)
    }

    pub fn is_fresh(&self, ttl: Duration) -> bool {
        self.age() < ttl
    }
}

/// Key→entry store surviving restarts. Writes replace whole entries, so
/// concurrent callers cannot observe a partial write. A store that has lost
/// its backing medium degrades to pass-through (every read misses, every
/// write is a no-op) instead of erroring.
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &str) -> EngineResult<Option<CachedEntry>>;
    fn put(&self, key: &str, entry: CachedEntry) -> EngineResult<()>;
}
