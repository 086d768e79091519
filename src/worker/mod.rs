//! Asset cache worker.
//!
//! Models the page's offline worker: it pre-caches a fixed asset list on
//! install, drops every other cache version on activate, and answers
//! intercepted requests cache-first with a network fallback.

mod cache;
mod fetch;
mod message;

pub use cache::{CacheStorage, SqliteCacheStorage};
pub use fetch::{resolve, HttpNetwork, Network, Request, Response};
pub use message::WorkerMessage;

use futures::future::try_join_all;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::background::PendingWrites;
use crate::config::WorkerConfig;

/// Lifecycle state of the worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
  Parsed,
  Installing,
  /// Installed and waiting for activation
  Installed,
  Activating,
  Activated,
  /// Install failed; this version will never activate
  Redundant,
}

impl fmt::Display for WorkerState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      Self::Parsed => "parsed",
      Self::Installing => "installing",
      Self::Installed => "installed",
      Self::Activating => "activating",
      Self::Activated => "activated",
      Self::Redundant => "redundant",
    };
    f.write_str(s)
  }
}

#[derive(Debug, Error)]
pub enum WorkerError {
  #[error("cannot {operation} while {state}")]
  InvalidState {
    operation: &'static str,
    state: WorkerState,
  },
  #[error("invalid url: {0}")]
  InvalidUrl(String),
  #[error("asset {url} responded with status {status}")]
  AssetUnavailable { url: String, status: u16 },
  /// Network failed on a cache miss. No offline page is served in its place.
  #[error("network request for {url} failed: {reason}")]
  Network { url: String, reason: String },
  #[error("cache {0} has not been installed")]
  NotInstalled(String),
  #[error("cache storage failure: {0}")]
  Storage(String),
  #[error("invalid worker message: {0}")]
  InvalidMessage(String),
}

fn storage_error(e: color_eyre::Report) -> WorkerError {
  WorkerError::Storage(format!("{:#}", e))
}

/// Where a fetch was answered from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchSource {
  Cache,
  Network,
}

#[derive(Debug, Clone)]
pub struct FetchOutcome {
  pub response: Response,
  pub source: FetchSource,
}

/// Cache version and asset list, fixed for the lifetime of one worker version
#[derive(Debug, Clone)]
pub struct WorkerSettings {
  /// Name of the current cache
  pub cache_version: String,
  pub origin: Url,
  pub assets: Vec<String>,
}

impl WorkerSettings {
  pub fn from_config(config: &WorkerConfig) -> Result<Self, WorkerError> {
    let origin = Url::parse(&config.origin)
      .map_err(|e| WorkerError::InvalidUrl(format!("{}: {}", config.origin, e)))?;

    Ok(Self {
      cache_version: config.cache_version.clone(),
      origin,
      assets: config.assets.clone(),
    })
  }

  /// Resolve a request path relative to the origin.
  pub fn resolve(&self, path: &str) -> Result<Url, WorkerError> {
    resolve(&self.origin, path).map_err(|e| WorkerError::InvalidUrl(format!("{:#}", e)))
  }
}

/// One version of the asset cache worker.
pub struct AssetWorker<N: Network, C: CacheStorage> {
  settings: WorkerSettings,
  network: N,
  caches: Arc<C>,
  state: WorkerState,
  skip_waiting: bool,
  pending: PendingWrites,
}

impl<N: Network, C: CacheStorage + 'static> AssetWorker<N, C> {
  pub fn new(settings: WorkerSettings, network: N, caches: C) -> Self {
    Self {
      settings,
      network,
      caches: Arc::new(caches),
      state: WorkerState::Parsed,
      skip_waiting: false,
      pending: PendingWrites::new(),
    }
  }

  /// Pick up a version installed by an earlier run, waiting for activation.
  ///
  /// Fails unless the current cache exists and holds at least one entry.
  pub fn resume_installed(
    settings: WorkerSettings,
    network: N,
    caches: C,
  ) -> Result<Self, WorkerError> {
    let name = settings.cache_version.clone();
    let installed = caches.keys().map_err(storage_error)?.contains(&name)
      && caches.len(&name).map_err(storage_error)? > 0;
    if !installed {
      return Err(WorkerError::NotInstalled(name));
    }

    let mut worker = Self::new(settings, network, caches);
    worker.state = WorkerState::Installed;
    Ok(worker)
  }

  pub fn state(&self) -> WorkerState {
    self.state
  }

  pub fn settings(&self) -> &WorkerSettings {
    &self.settings
  }

  #[cfg(test)]
  pub fn caches(&self) -> &C {
    &self.caches
  }

  /// Pre-cache every asset under the current cache version.
  ///
  /// All assets are fetched before anything is written, so one failed asset
  /// leaves the cache untouched and the worker redundant. Returns the number
  /// of cached assets.
  pub async fn install(&mut self) -> Result<usize, WorkerError> {
    if self.state != WorkerState::Parsed {
      return Err(WorkerError::InvalidState {
        operation: "install",
        state: self.state,
      });
    }

    self.state = WorkerState::Installing;
    info!(cache = %self.settings.cache_version, assets = self.settings.assets.len(), "installing");

    match self.precache().await {
      Ok(count) => {
        self.state = WorkerState::Installed;
        info!(cache = %self.settings.cache_version, count, "installed");

        if self.skip_waiting {
          self.activate()?;
        }
        Ok(count)
      }
      Err(e) => {
        self.state = WorkerState::Redundant;
        warn!(cache = %self.settings.cache_version, error = %e, "install failed");
        Err(e)
      }
    }
  }

  async fn precache(&self) -> Result<usize, WorkerError> {
    let urls = self
      .settings
      .assets
      .iter()
      .map(|path| self.settings.resolve(path))
      .collect::<Result<Vec<_>, _>>()?;

    self
      .caches
      .open(&self.settings.cache_version)
      .map_err(storage_error)?;

    let entries = try_join_all(urls.into_iter().map(|url| self.fetch_asset(url))).await?;

    self
      .caches
      .put_all(&self.settings.cache_version, &entries)
      .map_err(storage_error)?;

    Ok(entries.len())
  }

  async fn fetch_asset(&self, url: Url) -> Result<(String, Response), WorkerError> {
    let request = Request::get(url);
    let response = self
      .network
      .fetch(&request)
      .await
      .map_err(|e| WorkerError::Network {
        url: request.url.to_string(),
        reason: format!("{:#}", e),
      })?;

    if !response.is_ok() {
      return Err(WorkerError::AssetUnavailable {
        url: request.url.to_string(),
        status: response.status,
      });
    }

    Ok((request.url.to_string(), response))
  }

  /// Delete every cache whose name is not the current version.
  ///
  /// Returns the deleted cache names.
  pub fn activate(&mut self) -> Result<Vec<String>, WorkerError> {
    if !matches!(self.state, WorkerState::Installed | WorkerState::Activated) {
      return Err(WorkerError::InvalidState {
        operation: "activate",
        state: self.state,
      });
    }

    self.state = WorkerState::Activating;

    let result = self.prune_stale_caches();
    // A failed prune leaves stale caches behind but the worker still controls the page
    self.state = WorkerState::Activated;

    let deleted = result?;
    info!(cache = %self.settings.cache_version, deleted = ?deleted, "activated");
    Ok(deleted)
  }

  fn prune_stale_caches(&self) -> Result<Vec<String>, WorkerError> {
    let mut deleted = Vec::new();
    for name in self.caches.keys().map_err(storage_error)? {
      if name != self.settings.cache_version && self.caches.delete(&name).map_err(storage_error)? {
        debug!(cache = %name, "deleted stale cache");
        deleted.push(name);
      }
    }
    Ok(deleted)
  }

  /// Answer an intercepted request from the current cache.
  ///
  /// A cached response is returned verbatim without touching the network.
  /// On a miss the network response is returned immediately while a copy is
  /// written to the current cache in the background. Other cache versions are
  /// never read. The lifecycle state is not checked: the host decides which
  /// worker receives requests.
  pub async fn handle_fetch(&self, request: &Request) -> Result<FetchOutcome, WorkerError> {
    let cached = self
      .caches
      .match_request(&self.settings.cache_version, request.url.as_str())
      .map_err(storage_error)?;

    if let Some(response) = cached {
      debug!(url = %request.url, "cache hit");
      return Ok(FetchOutcome {
        response,
        source: FetchSource::Cache,
      });
    }

    debug!(url = %request.url, "cache miss");

    // TODO: serve an offline fallback page here once one is added to the asset list
    let response = self
      .network
      .fetch(request)
      .await
      .map_err(|e| WorkerError::Network {
        url: request.url.to_string(),
        reason: format!("{:#}", e),
      })?;

    if request.is_cacheable() && response.is_ok() {
      self.store_in_background(response.clone());
    }

    Ok(FetchOutcome {
      response,
      source: FetchSource::Network,
    })
  }

  fn store_in_background(&self, response: Response) {
    let caches = Arc::clone(&self.caches);
    let name = self.settings.cache_version.clone();

    self.pending.spawn(async move {
      let url = response.url.clone();
      match caches.put(&name, &url, &response) {
        Ok(()) => debug!(cache = %name, url = %url, "cached network response"),
        Err(e) => debug!(cache = %name, url = %url, error = %e, "failed to cache network response"),
      }
    });
  }

  /// Handle a control message from the page.
  pub fn handle_message(&mut self, message: WorkerMessage) -> Result<(), WorkerError> {
    match message {
      WorkerMessage::SkipWaiting => {
        self.skip_waiting = true;
        if self.state == WorkerState::Installed {
          self.activate()?;
        }
        Ok(())
      }
      WorkerMessage::Unknown => {
        debug!("ignoring unknown worker message");
        Ok(())
      }
    }
  }

  /// Wait for background cache writes to finish.
  pub async fn flush(&self) {
    self.pending.flush().await;
  }
}
