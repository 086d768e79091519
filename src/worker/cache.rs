//! Named asset caches for one origin, and their SQLite implementation.

use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::Mutex;

use super::fetch::Response;
use crate::db::{schema, Database};

/// Trait for asset cache backends.
///
/// Entries are keyed by absolute URL within a cache name. Every cache name
/// in one backend belongs to the same origin.
pub trait CacheStorage: Send + Sync {
  /// Create the cache if it does not exist yet.
  fn open(&self, name: &str) -> Result<()>;

  /// All cache names, oldest first.
  fn keys(&self) -> Result<Vec<String>>;

  /// Delete a cache and its entries. Returns whether it existed.
  fn delete(&self, name: &str) -> Result<bool>;

  /// Exact URL match within one cache.
  fn match_request(&self, name: &str, url: &str) -> Result<Option<Response>>;

  /// Insert or replace one entry, creating the cache if needed.
  fn put(&self, name: &str, url: &str, response: &Response) -> Result<()>;

  /// Insert or replace many entries atomically.
  fn put_all(&self, name: &str, entries: &[(String, Response)]) -> Result<()>;

  /// Number of entries in a cache.
  fn len(&self, name: &str) -> Result<usize>;
}

/// SQLite-based asset cache storage.
pub struct SqliteCacheStorage {
  conn: Mutex<Connection>,
}

impl SqliteCacheStorage {
  /// Open or create the cache database at `path`.
  pub fn open(path: &Path) -> Result<Self> {
    let db = Database::open(path, &schema::ASSET_CACHES)?;
    Ok(Self {
      conn: Mutex::new(db.into_connection()),
    })
  }

  /// Open a private in-memory cache database.
  #[cfg(test)]
  pub fn open_in_memory() -> Result<Self> {
    let db = Database::open_in_memory(&schema::ASSET_CACHES)?;
    Ok(Self {
      conn: Mutex::new(db.into_connection()),
    })
  }
}

fn insert_entry(conn: &Connection, name: &str, url: &str, response: &Response) -> Result<()> {
  let headers = serde_json::to_string(&response.headers)
    .map_err(|e| eyre!("Failed to serialize headers: {}", e))?;

  conn
    .execute(
      "INSERT OR REPLACE INTO cache_entries (cache_name, url, status, headers, body, cached_at)
       VALUES (?, ?, ?, ?, ?, datetime('now'))",
      params![name, url, response.status, headers, response.body],
    )
    .map_err(|e| eyre!("Failed to store {} in cache {}: {}", url, name, e))?;

  Ok(())
}

fn ensure_cache(conn: &Connection, name: &str) -> Result<()> {
  conn
    .execute(
      "INSERT OR IGNORE INTO cache_names (name) VALUES (?)",
      params![name],
    )
    .map_err(|e| eyre!("Failed to open cache {}: {}", name, e))?;
  Ok(())
}

/// Columns: url, status, headers, body
fn row_to_response(row: &Row<'_>) -> rusqlite::Result<(String, u16, String, Vec<u8>)> {
  Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn decode_response(raw: (String, u16, String, Vec<u8>)) -> Result<Response> {
  let (url, status, headers, body) = raw;
  let headers: Vec<(String, String)> = serde_json::from_str(&headers)
    .map_err(|e| eyre!("Failed to parse cached headers for {}: {}", url, e))?;

  Ok(Response {
    status,
    url,
    headers,
    body,
  })
}

impl CacheStorage for SqliteCacheStorage {
  fn open(&self, name: &str) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    ensure_cache(&conn, name)
  }

  fn keys(&self) -> Result<Vec<String>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut stmt = conn
      .prepare("SELECT name FROM cache_names ORDER BY rowid")
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let names = stmt
      .query_map([], |row| row.get(0))
      .map_err(|e| eyre!("Failed to list caches: {}", e))?
      .collect::<rusqlite::Result<Vec<String>>>()
      .map_err(|e| eyre!("Failed to read cache name: {}", e))?;

    Ok(names)
  }

  fn delete(&self, name: &str) -> Result<bool> {
    let mut conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    tx.execute(
      "DELETE FROM cache_entries WHERE cache_name = ?",
      params![name],
    )
    .map_err(|e| eyre!("Failed to delete entries of cache {}: {}", name, e))?;

    let deleted = tx
      .execute("DELETE FROM cache_names WHERE name = ?", params![name])
      .map_err(|e| eyre!("Failed to delete cache {}: {}", name, e))?;

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;

    Ok(deleted > 0)
  }

  fn match_request(&self, name: &str, url: &str) -> Result<Option<Response>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let raw = conn
      .query_row(
        "SELECT url, status, headers, body FROM cache_entries
         WHERE cache_name = ? AND url = ?",
        params![name, url],
        row_to_response,
      )
      .optional()
      .map_err(|e| eyre!("Failed to look up {} in cache {}: {}", url, name, e))?;

    raw.map(decode_response).transpose()
  }

  fn put(&self, name: &str, url: &str, response: &Response) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    ensure_cache(&conn, name)?;
    insert_entry(&conn, name, url, response)
  }

  fn put_all(&self, name: &str, entries: &[(String, Response)]) -> Result<()> {
    let mut conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    ensure_cache(&tx, name)?;
    for (url, response) in entries {
      insert_entry(&tx, name, url, response)?;
    }

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;

    Ok(())
  }

  fn len(&self, name: &str) -> Result<usize> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let count: i64 = conn
      .query_row(
        "SELECT COUNT(*) FROM cache_entries WHERE cache_name = ?",
        params![name],
        |row| row.get(0),
      )
      .map_err(|e| eyre!("Failed to count entries of cache {}: {}", name, e))?;

    Ok(count as usize)
  }
}
