//! Snapshot storage trait and SQLite implementation.
//!
//! The whole collection lives in a single auto-keyed entry. Callers only see
//! "load snapshot" and "save snapshot if absent", so the layout can move to
//! one row per record without touching them.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, TransactionBehavior};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::Mutex;

use super::traits::{Cacheable, Snapshot};
use crate::db::{schema, Database};

/// Trait for offline snapshot backends.
pub trait SnapshotStore: Send + Sync {
  /// Whether the host has persistent storage at all.
  fn is_supported(&self) -> bool {
    true
  }

  /// Read the stored snapshot.
  ///
  /// Walks entries in key order; the first entry decides. An entry without a
  /// value is an error, no entry at all is `Ok(None)`.
  fn load_snapshot<T: Cacheable>(&self) -> Result<Option<Snapshot<T>>>;

  /// Store `data` as a new entry unless the store already holds one.
  ///
  /// Returns whether a write happened. The check and the insert are atomic.
  fn save_snapshot_if_absent<T: Cacheable>(&self, data: &[T]) -> Result<bool>;

  /// Number of stored entries.
  #[allow(dead_code)]
  fn count(&self) -> Result<usize>;
}

/// Storage for hosts without persistent storage - all operations are no-ops.
pub struct NoopStore;

impl SnapshotStore for NoopStore {
  fn is_supported(&self) -> bool {
    false
  }

  fn load_snapshot<T: Cacheable>(&self) -> Result<Option<Snapshot<T>>> {
    Ok(None) // Always miss
  }

  fn save_snapshot_if_absent<T: Cacheable>(&self, _data: &[T]) -> Result<bool> {
    Ok(false) // Discard
  }

  fn count(&self) -> Result<usize> {
    Ok(0)
  }
}

/// SQLite-based snapshot storage (`details_db` table of `restaurant-db`).
pub struct SqliteSnapshotStore {
  conn: Mutex<Connection>,
}

impl SqliteSnapshotStore {
  /// Open or create the store at `path`.
  pub fn open(path: &Path) -> Result<Self> {
    let db = Database::open(path, &schema::RESTAURANT_DB)?;
    Ok(Self {
      conn: Mutex::new(db.into_connection()),
    })
  }

  /// Open a private in-memory store.
  #[cfg(test)]
  pub fn open_in_memory() -> Result<Self> {
    let db = Database::open_in_memory(&schema::RESTAURANT_DB)?;
    Ok(Self {
      conn: Mutex::new(db.into_connection()),
    })
  }

  /// Insert a raw entry, bypassing the first-write-wins check.
  #[cfg(test)]
  fn insert_raw(&self, value: Option<&[u8]>) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    conn
      .execute("INSERT INTO details_db (value) VALUES (?)", params![value])
      .map_err(|e| eyre!("Failed to insert entry: {}", e))?;
    Ok(())
  }
}

impl SnapshotStore for SqliteSnapshotStore {
  fn load_snapshot<T: Cacheable>(&self) -> Result<Option<Snapshot<T>>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut stmt = conn
      .prepare("SELECT key, value, stored_at FROM details_db ORDER BY key")
      .map_err(|e| eyre!("Failed to prepare cursor: {}", e))?;

    let mut cursor = stmt
      .query([])
      .map_err(|e| eyre!("Failed to open cursor: {}", e))?;

    let row = match cursor
      .next()
      .map_err(|e| eyre!("Failed to advance cursor: {}", e))?
    {
      Some(row) => row,
      None => return Ok(None),
    };

    let key: i64 = row.get(0).map_err(|e| eyre!("Failed to read key: {}", e))?;
    let value: Option<Vec<u8>> = row
      .get(1)
      .map_err(|e| eyre!("Failed to read entry {}: {}", key, e))?;
    let stored_at: String = row
      .get(2)
      .map_err(|e| eyre!("Failed to read entry {}: {}", key, e))?;

    let value = value.ok_or_else(|| eyre!("Entry {} has no value", key))?;
    let json: serde_json::Value = serde_json::from_slice(&value)
      .map_err(|e| eyre!("Failed to parse entry {}: {}", key, e))?;
    if json.is_null() {
      return Err(eyre!("Entry {} has no value", key));
    }

    let data: Vec<T> = serde_json::from_value(json)
      .map_err(|e| eyre!("Failed to deserialize entry {}: {}", key, e))?;

    Ok(Some(Snapshot {
      key,
      data,
      stored_at: parse_datetime(&stored_at)?,
    }))
  }

  fn save_snapshot_if_absent<T: Cacheable>(&self, data: &[T]) -> Result<bool> {
    let value =
      serde_json::to_vec(data).map_err(|e| eyre!("Failed to serialize snapshot: {}", e))?;

    let mut conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    // IMMEDIATE takes the write lock up front so the count stays valid until commit
    let tx = conn
      .transaction_with_behavior(TransactionBehavior::Immediate)
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    let count: i64 = tx
      .query_row("SELECT COUNT(*) FROM details_db", [], |row| row.get(0))
      .map_err(|e| eyre!("Failed to count entries: {}", e))?;

    if count > 0 {
      return Ok(false);
    }

    tx.execute(
      "INSERT INTO details_db (value, stored_at) VALUES (?, datetime('now'))",
      params![value],
    )
    .map_err(|e| eyre!("Failed to store snapshot: {}", e))?;

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;

    Ok(true)
  }

  fn count(&self) -> Result<usize> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let count: i64 = conn
      .query_row("SELECT COUNT(*) FROM details_db", [], |row| row.get(0))
      .map_err(|e| eyre!("Failed to count entries: {}", e))?;

    Ok(count as usize)
  }
}

/// SHA-256 of the serialized collection, for comparing snapshots.
pub fn snapshot_digest<T: Serialize>(data: &[T]) -> Result<String> {
  let bytes = serde_json::to_vec(data).map_err(|e| eyre!("Failed to serialize snapshot: {}", e))?;
  let mut hasher = Sha256::new();
  hasher.update(&bytes);
  Ok(hex::encode(hasher.finalize()))
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
  use serde::Deserialize;

  #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
  struct Item {
    id: u32,
    name: String,
  }

  impl Cacheable for Item {
    fn entity_type() -> &'static str {
      "item"
    }
  }

  fn items(names: &[&str]) -> Vec<Item> {
    names
      .iter()
      .enumerate()
      .map(|(i, n)| Item {
        id: i as u32 + 1,
        name: n.to_string(),
      })
      .collect()
  }

  #[test]
  fn test_empty_store_loads_nothing() {
    let store = SqliteSnapshotStore::open_in_memory().unwrap();
    assert_eq!(store.count().unwrap(), 0);
    assert!(store.load_snapshot::<Item>().unwrap().is_none());
  }

  #[test]
  fn test_first_write_wins() {
    let store = SqliteSnapshotStore::open_in_memory().unwrap();
    let first = items(&["a", "b"]);
    let second = items(&["c"]);

    assert!(store.save_snapshot_if_absent(&first).unwrap());
    assert!(!store.save_snapshot_if_absent(&second).unwrap());
    assert_eq!(store.count().unwrap(), 1);

    let snapshot = store.load_snapshot::<Item>().unwrap().unwrap();
    assert_eq!(snapshot.data, first);
    assert_eq!(snapshot.key, 1);
  }

  #[test]
  fn test_entry_without_value_is_error() {
    let store = SqliteSnapshotStore::open_in_memory().unwrap();
    store.insert_raw(None).unwrap();
    assert!(store.load_snapshot::<Item>().is_err());
  }

  #[test]
  fn test_entry_with_null_value_is_error() {
    let store = SqliteSnapshotStore::open_in_memory().unwrap();
    store.insert_raw(Some(b"null")).unwrap();
    assert!(store.load_snapshot::<Item>().is_err());
  }

  #[test]
  fn test_first_entry_decides() {
    let store = SqliteSnapshotStore::open_in_memory().unwrap();
    let first = items(&["a"]);
    store
      .insert_raw(Some(&serde_json::to_vec(&first).unwrap()))
      .unwrap();
    store.insert_raw(None).unwrap();

    let snapshot = store.load_snapshot::<Item>().unwrap().unwrap();
    assert_eq!(snapshot.data, first);
  }

  #[test]
  fn test_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("restaurant-db.sqlite");
    let data = items(&["a", "b", "c"]);

    {
      let store = SqliteSnapshotStore::open(&path).unwrap();
      store.save_snapshot_if_absent(&data).unwrap();
    }

    let store = SqliteSnapshotStore::open(&path).unwrap();
    assert_eq!(store.load_snapshot::<Item>().unwrap().unwrap().data, data);
  }

  #[test]
  fn test_noop_store() {
    let store = NoopStore;
    assert!(!store.is_supported());
    assert!(!store.save_snapshot_if_absent(&items(&["a"])).unwrap());
    assert!(store.load_snapshot::<Item>().unwrap().is_none());
  }

  #[test]
  fn test_digest_tracks_content() {
    let a = snapshot_digest(&items(&["a", "b"])).unwrap();
    let b = snapshot_digest(&items(&["a", "b"])).unwrap();
    let c = snapshot_digest(&items(&["a", "c"])).unwrap();
    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_eq!(a.len(), 64);
  }
}
