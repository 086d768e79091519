use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable that overrides `api.url`.
pub const API_URL_ENV: &str = "RESTAURANT_PWA_API_URL";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub api: ApiConfig,
  #[serde(default)]
  pub offline_store: OfflineStoreConfig,
  #[serde(default)]
  pub worker: WorkerConfig,
  #[serde(default)]
  pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  /// Endpoint returning the full restaurant collection as a JSON array
  #[serde(default = "default_api_url")]
  pub url: String,
  /// Request timeout. Unset means requests may hang indefinitely.
  pub request_timeout_secs: Option<u64>,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      url: default_api_url(),
      request_timeout_secs: None,
    }
  }
}

fn default_api_url() -> String {
  "http://localhost:1337/restaurants".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct OfflineStoreConfig {
  /// Disable to run network-only, as on a host without persistent storage
  #[serde(default = "default_true")]
  pub enabled: bool,
  /// Database file (default: $XDG_DATA_HOME/restaurant-pwa/restaurant-db.sqlite)
  pub path: Option<PathBuf>,
}

impl Default for OfflineStoreConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      path: None,
    }
  }
}

fn default_true() -> bool {
  true
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkerConfig {
  /// Name of the current asset cache. Bumping it evicts every other cache on activate.
  #[serde(default = "default_cache_version")]
  pub cache_version: String,
  /// Origin that relative asset paths are resolved against
  #[serde(default = "default_origin")]
  pub origin: String,
  /// Assets cached at install time
  #[serde(default = "default_assets")]
  pub assets: Vec<String>,
  /// Cache database file (default: $XDG_DATA_HOME/restaurant-pwa/caches.sqlite)
  pub cache_path: Option<PathBuf>,
}

impl Default for WorkerConfig {
  fn default() -> Self {
    Self {
      cache_version: default_cache_version(),
      origin: default_origin(),
      assets: default_assets(),
      cache_path: None,
    }
  }
}

fn default_cache_version() -> String {
  "restaurant-reviews-v1".to_string()
}

fn default_origin() -> String {
  "http://localhost:8000/".to_string()
}

fn default_assets() -> Vec<String> {
  [
    "./",
    "./index.html",
    "./restaurant.html",
    "./css/styles.css",
    "./js/dbhelper.js",
    "./js/main.js",
    "./js/restaurant_info.js",
    "./img/",
    "./manifest.json",
  ]
  .iter()
  .map(|s| s.to_string())
  .collect()
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
  /// Default filter directive, overridden by RUST_LOG
  #[serde(default = "default_log_filter")]
  pub filter: String,
  /// Write daily rolling log files here instead of stderr
  pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
  fn default() -> Self {
    Self {
      filter: default_log_filter(),
      directory: None,
    }
  }
}

fn default_log_filter() -> String {
  "restaurant_pwa=info".to_string()
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./restaurant-pwa.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/restaurant-pwa/config.yaml
  ///
  /// Falls back to defaults when no file exists. `RESTAURANT_PWA_API_URL`
  /// overrides the API endpoint in every case.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    let mut config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => Config::default(),
    };

    if let Ok(url) = std::env::var(API_URL_ENV) {
      config.api.url = url;
    }

    Ok(config)
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("restaurant-pwa.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("restaurant-pwa").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let config: Config = serde_yaml::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;

    Ok(config)
  }

  /// Resolved path of the offline restaurant database.
  pub fn offline_store_path(&self) -> Result<PathBuf> {
    match &self.offline_store.path {
      Some(p) => Ok(p.clone()),
      None => Ok(data_dir()?.join("restaurant-db.sqlite")),
    }
  }

  /// Resolved path of the asset cache database.
  pub fn cache_path(&self) -> Result<PathBuf> {
    match &self.worker.cache_path {
      Some(p) => Ok(p.clone()),
      None => Ok(data_dir()?.join("caches.sqlite")),
    }
  }
}

fn data_dir() -> Result<PathBuf> {
  let data_dir = dirs::data_dir()
    .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
    .ok_or_else(|| eyre!("Could not determine data directory"))?;

  Ok(data_dir.join("restaurant-pwa"))
}
