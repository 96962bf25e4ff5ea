use super::{CacheStore, CachedEntry};
use crate::shared::errors::EngineResult;
use dashmap::DashMap;

/// Non-durable store used by tests and by hosts that opt out of persistence.
#[derive(Default)]
pub struct MemoryCacheStore {
    entries: DashMap<String, CachedEntry>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl CacheStore for MemoryCacheStore {
    fn get(&self, key: &str) -> EngineResult<Option<CachedEntry>> {
        Ok(self.entries.get(key).map(|e| e.clone()))
    }

    fn put(&self, key: &str, entry: CachedEntry) -> EngineResult<()> {
        self.entries.insert(key.to_string(), entry);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn put_then_get() {
        let store = MemoryCacheStore::new();
        store.put("k", CachedEntry::new(json!("v"), None)).unwrap();
        assert_eq!(store.get("k").unwrap().unwrap().payload, json!("v"));
        assert_eq!(store.len(), 1);
    }
}
