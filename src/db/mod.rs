pub mod schema;

use color_eyre::{eyre::eyre, Result};
use rusqlite::Connection;
use std::path::Path;
use tracing::debug;

use schema::Schema;

/// Database connection wrapper that applies a versioned schema on open
pub struct Database {
  conn: Connection,
}

impl Database {
  /// Open or create the database at `path`
  pub fn open(path: &Path, schema: &Schema) -> Result<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create database directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open database at {}: {}", path.display(), e))?;

    let db = Self { conn };
    db.run_migrations(schema)?;

    Ok(db)
  }

  /// Open a private in-memory database
  #[cfg(test)]
  pub fn open_in_memory(schema: &Schema) -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| eyre!("Failed to open in-memory database: {}", e))?;

    let db = Self { conn };
    db.run_migrations(schema)?;

    Ok(db)
  }

  /// Bring the schema up to `schema.version`.
  ///
  /// A database written by a newer schema version is refused.
  fn run_migrations(&self, schema: &Schema) -> Result<()> {
    self
      .conn
      .execute_batch("PRAGMA foreign_keys = ON;")
      .map_err(|e| eyre!("Failed to enable foreign keys: {}", e))?;

    let current: u32 = self
      .conn
      .query_row("PRAGMA user_version", [], |row| row.get(0))
      .map_err(|e| eyre!("Failed to read schema version of {}: {}", schema.name, e))?;

    if current > schema.version {
      return Err(eyre!(
        "Database {} has version {}, newer than supported version {}",
        schema.name,
        current,
        schema.version
      ));
    }

    if current < schema.version {
      debug!(db = schema.name, from = current, to = schema.version, "upgrading schema");
      self
        .conn
        .execute_batch(schema.sql)
        .map_err(|e| eyre!("Failed to run migrations for {}: {}", schema.name, e))?;
      self
        .conn
        .execute_batch(&format!("PRAGMA user_version = {};", schema.version))
        .map_err(|e| eyre!("Failed to record schema version of {}: {}", schema.name, e))?;
    }

    Ok(())
  }

  /// Get a reference to the connection
  #[cfg(test)]
  pub fn conn(&self) -> &Connection {
    &self.conn
  }

  /// Hand the connection over to a storage implementation
  pub fn into_connection(self) -> Connection {
    self.conn
  }
}
