/// A versioned database schema.
///
/// `version` is stored in `PRAGMA user_version`; opening a database with a
/// lower version runs `sql`, which must be idempotent.
#[derive(Debug, Clone, Copy)]
pub struct Schema {
  pub name: &'static str,
  pub version: u32,
  pub sql: &'static str,
}

/// Offline restaurant store: one auto-keyed slot per snapshot.
pub const RESTAURANT_DB: Schema = Schema {
  name: "restaurant-db",
  version: 1,
  sql: r#"
CREATE TABLE IF NOT EXISTS details_db (
    key INTEGER PRIMARY KEY AUTOINCREMENT,
    value BLOB,
    stored_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#,
};

/// Named asset caches for one origin.
pub const ASSET_CACHES: Schema = Schema {
  name: "asset-caches",
  version: 1,
  sql: r#"
CREATE TABLE IF NOT EXISTS cache_names (
    name TEXT PRIMARY KEY,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS cache_entries (
    cache_name TEXT NOT NULL,
    url TEXT NOT NULL,
    status INTEGER NOT NULL,
    headers TEXT NOT NULL,
    body BLOB NOT NULL,
    cached_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (cache_name, url),
    FOREIGN KEY (cache_name) REFERENCES cache_names(name) ON DELETE CASCADE
);
"#,
};
