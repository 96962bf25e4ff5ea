use super::{CacheStore, CachedEntry};
use crate::shared::errors::EngineResult;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, warn};

/// SQLite-backed cache store. Each entry is a single row replaced atomically
/// with `INSERT OR REPLACE`.
///
/// When the database cannot be opened the store keeps running without a
/// connection: reads always miss and writes are dropped, so callers simply
/// see a permanently cold cache.
pub struct SqliteCacheStore {
    conn: Option<Mutex<Connection>>,
}

impl SqliteCacheStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        match Connection::open(path.as_ref()).and_then(Self::init_schema) {
            Ok(conn) => Self {
                conn: Some(Mutex::new(conn)),
            },
            Err(e) => {
                warn!(
                    "cache store unavailable at {:?}, degrading to pass-through: {}",
                    path.as_ref(),
                    e
                );
                Self { conn: None }
            }
        }
    }

    /// In-memory database, used by tests.
    pub fn open_in_memory() -> Self {
        match Connection::open_in_memory().and_then(Self::init_schema) {
            Ok(conn) => Self {
                conn: Some(Mutex::new(conn)),
            },
            Err(_) => Self { conn: None },
        }
    }

    /// A store with no backing medium at all; every operation is a no-op.
    pub fn detached() -> Self {
        Self { conn: None }
    }

    fn init_schema(conn: Connection) -> rusqlite::Result<Connection> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS http_cache (
                key          TEXT PRIMARY KEY,
                payload      TEXT NOT NULL,
                validator    TEXT,
                stored_at_ms INTEGER NOT NULL
            )",
        )?;
        Ok(conn)
    }
}

impl CacheStore for SqliteCacheStore {
    fn get(&self, key: &str) -> EngineResult<Option<CachedEntry>> {
        let Some(conn) = &self.conn else {
            return Ok(None);
        };
        let conn = conn.lock().unwrap_or_else(|e| e.into_inner());
        let row = conn
            .query_row(
                "SELECT payload, validator, stored_at_ms FROM http_cache WHERE key = ?1",
                params![key],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, i64>(2)?,
                    ))
                },
            )
            .optional()?;

        match row {
            Some((payload, validator, stored_at_ms)) => {
                let payload = serde_json::from_str(&payload)?;
                debug!("cache hit for {}", key);
                Ok(Some(CachedEntry {
                    payload,
                    validator,
                    stored_at_ms,
                }))
            }
            None => Ok(None),
        }
    }

    fn put(&self, key: &str, entry: CachedEntry) -> EngineResult<()> {
        let Some(conn) = &self.conn else {
            return Ok(());
        };
        let conn = conn.lock().unwrap_or_else(|e| e.into_inner());
        conn.execute(
            "INSERT OR REPLACE INTO http_cache (key, payload, validator, stored_at_ms)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                key,
                entry.payload.to_string(),
                entry.validator,
                entry.stored_at_ms
            ],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn roundtrip_preserves_entry() {
        let store = SqliteCacheStore::open_in_memory();
        let entry = CachedEntry::new(json!({"ratings": [1, 2]}), Some("\"etag-1\"".into()));
        store.put("https://api.mdblist.com/tmdb/movie/603", entry.clone()).unwrap();

        let got = store
            .get("https://api.mdblist.com/tmdb/movie/603")
            .unwrap()
            .unwrap();
        assert_eq!(got, entry);
    }

    #[test]
    fn overwrite_replaces_whole_entry() {
        let store = SqliteCacheStore::open_in_memory();
        store
            .put("k", CachedEntry::new(json!(1), Some("a".into())))
            .unwrap();
        store.put("k", CachedEntry::new(json!(2), None)).unwrap();

        let got = store.get("k").unwrap().unwrap();
        assert_eq!(got.payload, json!(2));
        assert_eq!(got.validator, None);
    }

    #[test]
    fn missing_key_is_none() {
        let store = SqliteCacheStore::open_in_memory();
        assert!(store.get("nope").unwrap().is_none());
    }

    #[test]
    fn detached_store_is_pass_through() {
        let store = SqliteCacheStore::detached();
        store.put("k", CachedEntry::new(json!(1), None)).unwrap();
        assert!(store.get("k").unwrap().is_none());
    }
}
