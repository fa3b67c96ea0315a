//! Cache storage trait with SQLite and in-memory implementations.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection};
use sha2::{Digest, Sha256};
#[cfg(test)]
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::net::Response;

/// A stored response snapshot with its bookkeeping.
#[derive(Debug, Clone)]
pub struct CachedResponse {
  /// The snapshot as it came off the network
  pub response: Response,
  /// When the snapshot was stored
  #[allow(dead_code)]
  pub cached_at: DateTime<Utc>,
}

/// Trait for cache storage backends.
///
/// Buckets are the named caches the worker opens; keys are the normalized
/// request keys from [`super::request_key`].
pub trait CacheStore: Send + Sync {
  /// Create the named bucket if it does not exist.
  fn ensure_bucket(&self, bucket: &str) -> Result<()>;

  /// Whether the named bucket exists.
  fn has_bucket(&self, bucket: &str) -> Result<bool>;

  /// Store a snapshot under the given key, replacing any previous entry.
  fn put(&self, bucket: &str, key: &str, response: &Response) -> Result<()>;

  /// Look up a snapshot by exact key.
  fn get(&self, bucket: &str, key: &str) -> Result<Option<CachedResponse>>;

  /// Remove a single entry. Returns whether an entry existed.
  #[allow(dead_code)]
  fn delete(&self, bucket: &str, key: &str) -> Result<bool>;

  /// All keys in the bucket, in first-insertion order; replacing an entry
  /// keeps its position.
  fn keys(&self, bucket: &str) -> Result<Vec<String>>;
}

/// In-memory storage standing in for the SQLite store in tests; entries
/// live only as long as the process.
#[cfg(test)]
#[derive(Default)]
pub struct MemoryStore {
  buckets: Mutex<HashMap<String, Vec<(String, CachedResponse)>>>,
}

#[cfg(test)]
impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }
}

#[cfg(test)]
impl CacheStore for MemoryStore {
  fn ensure_bucket(&self, bucket: &str) -> Result<()> {
    let mut buckets = self
      .buckets
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    buckets.entry(bucket.to_string()).or_default();
    Ok(())
  }

  fn has_bucket(&self, bucket: &str) -> Result<bool> {
    let buckets = self
      .buckets
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    Ok(buckets.contains_key(bucket))
  }

  fn put(&self, bucket: &str, key: &str, response: &Response) -> Result<()> {
    let mut buckets = self
      .buckets
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    let entries = buckets.entry(bucket.to_string()).or_default();
    let cached = CachedResponse {
      response: response.clone(),
      cached_at: Utc::now(),
    };

    match entries.iter_mut().find(|(k, _)| k == key) {
      Some((_, existing)) => *existing = cached,
      None => entries.push((key.to_string(), cached)),
    }
    Ok(())
  }

  fn get(&self, bucket: &str, key: &str) -> Result<Option<CachedResponse>> {
    let buckets = self
      .buckets
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    Ok(
      buckets
        .get(bucket)
        .and_then(|entries| entries.iter().find(|(k, _)| k == key))
        .map(|(_, cached)| cached.clone()),
    )
  }

  fn delete(&self, bucket: &str, key: &str) -> Result<bool> {
    let mut buckets = self
      .buckets
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    if let Some(entries) = buckets.get_mut(bucket) {
      let before = entries.len();
      entries.retain(|(k, _)| k != key);
      return Ok(entries.len() < before);
    }
    Ok(false)
  }

  fn keys(&self, bucket: &str) -> Result<Vec<String>> {
    let buckets = self
      .buckets
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    Ok(
      buckets
        .get(bucket)
        .map(|entries| entries.iter().map(|(k, _)| k.clone()).collect())
        .unwrap_or_default(),
    )
  }
}

/// SQLite-based cache storage.
pub struct SqliteStore {
  conn: Mutex<Connection>,
}

impl SqliteStore {
  /// Open the cache database, creating it (and its directory) if needed.
  ///
  /// `data_dir` overrides the platform data directory when set.
  pub fn open(data_dir: Option<&Path>) -> Result<Self> {
    let path = Self::database_path(data_dir)?;

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(&path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    Self::from_connection(conn)
  }

  fn from_connection(conn: Connection) -> Result<Self> {
    let store = Self {
      conn: Mutex::new(conn),
    };
    store.run_migrations()?;
    Ok(store)
  }

  /// Resolve the database path, honoring a configured data directory.
  fn database_path(data_dir: Option<&Path>) -> Result<PathBuf> {
    let base = match data_dir {
      Some(dir) => dir.to_path_buf(),
      None => dirs::data_dir()
        .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
        .ok_or_else(|| eyre!("Could not determine data directory"))?
        .join("uniplanner"),
    };

    Ok(base.join("cache.db"))
  }

  /// Run database migrations for cache tables.
  fn run_migrations(&self) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute_batch(CACHE_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;

    Ok(())
  }
}

/// Schema for cache tables.
const CACHE_SCHEMA: &str = r#"
-- Named cache buckets
CREATE TABLE IF NOT EXISTS cache_buckets (
    bucket TEXT PRIMARY KEY,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Response snapshots (serialized JSON), one row per request key
CREATE TABLE IF NOT EXISTS cache_entries (
    bucket TEXT NOT NULL,
    key_hash TEXT NOT NULL,
    request_key TEXT NOT NULL,
    data BLOB NOT NULL,
    cached_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (bucket, key_hash),
    FOREIGN KEY (bucket) REFERENCES cache_buckets(bucket) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_cache_entries_bucket ON cache_entries(bucket);
"#;

impl CacheStore for SqliteStore {
  fn ensure_bucket(&self, bucket: &str) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute(
        "INSERT OR IGNORE INTO cache_buckets (bucket) VALUES (?)",
        params![bucket],
      )
      .map_err(|e| eyre!("Failed to create cache bucket: {}", e))?;

    Ok(())
  }

  fn has_bucket(&self, bucket: &str) -> Result<bool> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut stmt = conn
      .prepare("SELECT 1 FROM cache_buckets WHERE bucket = ?")
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let found: Option<i64> = stmt.query_row(params![bucket], |row| row.get(0)).ok();

    Ok(found.is_some())
  }

  fn put(&self, bucket: &str, key: &str, response: &Response) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let data =
      serde_json::to_vec(response).map_err(|e| eyre!("Failed to serialize response: {}", e))?;

    // Upsert rather than INSERT OR REPLACE so the rowid, and with it the
    // key order, survives re-puts
    conn
      .execute(
        "INSERT INTO cache_entries (bucket, key_hash, request_key, data, cached_at)
         VALUES (?, ?, ?, ?, datetime('now'))
         ON CONFLICT (bucket, key_hash) DO UPDATE SET
           data = excluded.data,
           cached_at = excluded.cached_at",
        params![bucket, key_hash(key), key, data],
      )
      .map_err(|e| eyre!("Failed to store cache entry: {}", e))?;

    Ok(())
  }

  fn get(&self, bucket: &str, key: &str) -> Result<Option<CachedResponse>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut stmt = conn
      .prepare(
        "SELECT data, cached_at FROM cache_entries
         WHERE bucket = ? AND key_hash = ?",
      )
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let result: Option<(Vec<u8>, String)> = stmt
      .query_row(params![bucket, key_hash(key)], |row| {
        Ok((row.get(0)?, row.get(1)?))
      })
      .ok();

    match result {
      Some((data, cached_at_str)) => {
        let response: Response = serde_json::from_slice(&data)
          .map_err(|e| eyre!("Failed to deserialize response: {}", e))?;
        let cached_at = parse_datetime(&cached_at_str)?;
        Ok(Some(CachedResponse {
          response,
          cached_at,
        }))
      }
      None => Ok(None),
    }
  }

  fn delete(&self, bucket: &str, key: &str) -> Result<bool> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let removed = conn
      .execute(
        "DELETE FROM cache_entries WHERE bucket = ? AND key_hash = ?",
        params![bucket, key_hash(key)],
      )
      .map_err(|e| eyre!("Failed to delete cache entry: {}", e))?;

    Ok(removed > 0)
  }

  fn keys(&self, bucket: &str) -> Result<Vec<String>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut stmt = conn
      .prepare("SELECT request_key FROM cache_entries WHERE bucket = ? ORDER BY rowid")
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let keys: Vec<String> = stmt
      .query_map(params![bucket], |row| row.get(0))
      .map_err(|e| eyre!("Failed to query cache keys: {}", e))?
      .filter_map(|r| r.ok())
      .collect();

    Ok(keys)
  }
}

/// SHA256 hash for stable, fixed-length row keys.
fn key_hash(key: &str) -> String {
  let mut hasher = Sha256::new();
  hasher.update(key.as_bytes());
  hex::encode(hasher.finalize())
}

/// Parse a datetime string from SQLite format.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  // SQLite stores as "YYYY-MM-DD HH:MM:SS"
  chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
    .map(|dt| dt.and_utc())
    .map_err(|e| eyre!("Failed to parse datetime '{}': {}", s, e))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn sqlite_store() -> SqliteStore {
    let conn = Connection::open_in_memory().unwrap();
    SqliteStore::from_connection(conn).unwrap()
  }

  fn snapshot(status: u16, body: &str) -> Response {
    Response {
      status,
      headers: std::collections::BTreeMap::new(),
      body: body.as_bytes().to_vec(),
    }
  }

  fn exercise_round_trip(store: &dyn CacheStore) {
    store.ensure_bucket("shell-v1").unwrap();
    assert!(store.has_bucket("shell-v1").unwrap());
    assert!(!store.has_bucket("shell-v2").unwrap());

    // Miss before any put
    assert!(store.get("shell-v1", "GET:/").unwrap().is_none());

    store.put("shell-v1", "GET:/", &snapshot(200, "<html>")).unwrap();
    let hit = store.get("shell-v1", "GET:/").unwrap().unwrap();
    assert_eq!(hit.response.status, 200);
    assert_eq!(hit.response.body, b"<html>");

    // Replace keeps a single entry
    store.put("shell-v1", "GET:/", &snapshot(200, "<html v2>")).unwrap();
    let hit = store.get("shell-v1", "GET:/").unwrap().unwrap();
    assert_eq!(hit.response.body, b"<html v2>");
    assert_eq!(store.keys("shell-v1").unwrap(), vec!["GET:/".to_string()]);

    // Entries in other buckets are invisible
    store.ensure_bucket("other").unwrap();
    assert!(store.get("other", "GET:/").unwrap().is_none());
  }

  fn exercise_delete_and_keys(store: &dyn CacheStore) {
    store.ensure_bucket("shell-v1").unwrap();
    store.put("shell-v1", "GET:/a", &snapshot(200, "a")).unwrap();
    store.put("shell-v1", "GET:/b", &snapshot(200, "b")).unwrap();
    store.put("shell-v1", "GET:/c", &snapshot(200, "c")).unwrap();

    assert_eq!(
      store.keys("shell-v1").unwrap(),
      vec!["GET:/a".to_string(), "GET:/b".to_string(), "GET:/c".to_string()]
    );

    assert!(store.delete("shell-v1", "GET:/b").unwrap());
    assert!(!store.delete("shell-v1", "GET:/b").unwrap());
    assert_eq!(
      store.keys("shell-v1").unwrap(),
      vec!["GET:/a".to_string(), "GET:/c".to_string()]
    );
  }

  fn exercise_reput_keeps_key_position(store: &dyn CacheStore) {
    store.ensure_bucket("shell-v1").unwrap();
    store.put("shell-v1", "GET:/a", &snapshot(200, "a")).unwrap();
    store.put("shell-v1", "GET:/b", &snapshot(200, "b")).unwrap();

    // Re-putting an early key must not move it behind later ones
    store.put("shell-v1", "GET:/a", &snapshot(200, "a2")).unwrap();

    assert_eq!(
      store.keys("shell-v1").unwrap(),
      vec!["GET:/a".to_string(), "GET:/b".to_string()]
    );
    let hit = store.get("shell-v1", "GET:/a").unwrap().unwrap();
    assert_eq!(hit.response.body, b"a2");
  }

  #[test]
  fn test_sqlite_round_trip() {
    exercise_round_trip(&sqlite_store());
  }

  #[test]
  fn test_memory_round_trip() {
    exercise_round_trip(&MemoryStore::new());
  }

  #[test]
  fn test_sqlite_delete_and_keys() {
    exercise_delete_and_keys(&sqlite_store());
  }

  #[test]
  fn test_memory_delete_and_keys() {
    exercise_delete_and_keys(&MemoryStore::new());
  }

  #[test]
  fn test_sqlite_reput_keeps_key_position() {
    exercise_reput_keeps_key_position(&sqlite_store());
  }

  #[test]
  fn test_memory_reput_keeps_key_position() {
    exercise_reput_keeps_key_position(&MemoryStore::new());
  }

  #[test]
  fn test_sqlite_persists_across_reopen() {
    let dir = std::env::temp_dir().join(format!(
      "uniplanner-cache-test-{}-{}",
      std::process::id(),
      chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
    ));

    {
      let store = SqliteStore::open(Some(&dir)).unwrap();
      store.ensure_bucket("shell-v1").unwrap();
      store.put("shell-v1", "GET:/", &snapshot(200, "persisted")).unwrap();
    }

    let store = SqliteStore::open(Some(&dir)).unwrap();
    assert!(store.has_bucket("shell-v1").unwrap());
    let hit = store.get("shell-v1", "GET:/").unwrap().unwrap();
    assert_eq!(hit.response.body, b"persisted");

    let _ = std::fs::remove_dir_all(&dir);
  }

  #[test]
  fn test_bucket_creation_idempotent() {
    let store = sqlite_store();
    store.ensure_bucket("shell-v1").unwrap();
    store.ensure_bucket("shell-v1").unwrap();
    assert!(store.has_bucket("shell-v1").unwrap());
  }
}
