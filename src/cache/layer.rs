//! Cache layer that orchestrates network fetching with the offline snapshot.

use color_eyre::Result;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::storage::{snapshot_digest, SnapshotStore};
use super::traits::{CacheResult, Cacheable};
use crate::background::PendingWrites;
use crate::error::DataError;

/// Cache layer that manages the offline snapshot and network fetching.
///
/// Concurrent background writes and offline reads are serialized by the
/// store's own transactions; this layer adds no locking of its own.
pub struct CacheLayer<S: SnapshotStore> {
  storage: Arc<S>,
  pending: PendingWrites,
}

impl<S: SnapshotStore + 'static> CacheLayer<S> {
  /// Create a new cache layer with the given storage backend.
  pub fn new(storage: S) -> Self {
    Self {
      storage: Arc::new(storage),
      pending: PendingWrites::new(),
    }
  }

  /// The underlying snapshot store.
  #[cfg(test)]
  pub fn storage(&self) -> &S {
    &self.storage
  }

  /// Fetch the collection with a network-first strategy.
  ///
  /// 1. Fetch from network
  /// 2. On success, persist the snapshot in the background (only into an
  ///    empty store) and return the network data without waiting
  /// 3. On failure, return the stored snapshot (offline mode)
  ///
  /// Without persistent storage a network failure is returned as is.
  pub async fn fetch_snapshot<T, F, Fut>(&self, fetcher: F) -> Result<CacheResult<Vec<T>>, DataError>
  where
    T: Cacheable,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Vec<T>>>,
  {
    let err = match fetcher().await {
      Ok(data) => {
        self.store_in_background(data.clone());
        return Ok(CacheResult::from_network(data));
      }
      Err(err) => err,
    };

    if !self.storage.is_supported() {
      warn!(error = %err, "network fetch failed and persistent storage is unavailable");
      return Err(DataError::Network(format!("{:#}", err)));
    }

    warn!(error = %err, "network fetch failed, falling back to offline store");

    match self.storage.load_snapshot::<T>() {
      Ok(Some(snapshot)) => {
        info!(
          entity = T::entity_type(),
          key = snapshot.key,
          count = snapshot.data.len(),
          stored_at = %snapshot.stored_at,
          "serving offline snapshot"
        );
        Ok(CacheResult::offline(snapshot.data, snapshot.stored_at))
      }
      Ok(None) => {
        warn!(entity = T::entity_type(), "offline store is empty");
        Err(DataError::Processing)
      }
      Err(e) => {
        warn!(entity = T::entity_type(), error = %e, "offline snapshot unusable");
        Err(DataError::Processing)
      }
    }
  }

  /// Wait for background snapshot writes to finish.
  pub async fn flush(&self) {
    self.pending.flush().await;
  }

  fn store_in_background<T: Cacheable>(&self, data: Vec<T>) {
    if !self.storage.is_supported() {
      return;
    }

    let storage = Arc::clone(&self.storage);
    self.pending.spawn(async move {
      match storage.save_snapshot_if_absent(&data) {
        Ok(true) => debug!(
          entity = T::entity_type(),
          count = data.len(),
          "stored offline snapshot"
        ),
        Ok(false) => warn_if_stale(storage.as_ref(), &data),
        // Best effort: the caller already has its data
        Err(e) => debug!(error = %e, "failed to store offline snapshot"),
      }
    });
  }
}

/// The first stored snapshot is never replaced; say so when it has drifted.
fn warn_if_stale<S: SnapshotStore, T: Cacheable>(storage: &S, fresh: &[T]) {
  let stored = match storage.load_snapshot::<T>() {
    Ok(Some(snapshot)) => snapshot,
    _ => return,
  };

  match (snapshot_digest(&stored.data), snapshot_digest(fresh)) {
    (Ok(old), Ok(new)) if old != new => warn!(
      entity = T::entity_type(),
      stored_at = %stored.stored_at,
      "offline snapshot differs from network data and will not be refreshed"
    ),
    _ => {}
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{CacheSource, NoopStore, SqliteSnapshotStore};
  use color_eyre::eyre::eyre;
  use serde::{Deserialize, Serialize};

  #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
  struct Item {
    id: u32,
  }

  impl Cacheable for Item {
    fn entity_type() -> &'static str {
      "item"
    }
  }

  fn items(ids: &[u32]) -> Vec<Item> {
    ids.iter().map(|&id| Item { id }).collect()
  }

  fn layer() -> CacheLayer<SqliteSnapshotStore> {
    CacheLayer::new(SqliteSnapshotStore::open_in_memory().unwrap())
  }

  #[tokio::test]
  async fn test_network_success_returns_network_data() {
    let cache = layer();
    let result = cache
      .fetch_snapshot(|| async { Ok(items(&[1, 2])) })
      .await
      .unwrap();

    assert_eq!(result.source, CacheSource::Network);
    assert_eq!(result.data, items(&[1, 2]));

    cache.flush().await;
    assert_eq!(cache.storage().count().unwrap(), 1);
  }

  #[tokio::test]
  async fn test_later_network_data_does_not_overwrite_snapshot() {
    let cache = layer();
    cache
      .fetch_snapshot(|| async { Ok(items(&[1, 2])) })
      .await
      .unwrap();
    cache.flush().await;

    let result = cache
      .fetch_snapshot(|| async { Ok(items(&[7])) })
      .await
      .unwrap();
    assert_eq!(result.data, items(&[7]));
    cache.flush().await;

    assert_eq!(cache.storage().count().unwrap(), 1);
    let stored = cache.storage().load_snapshot::<Item>().unwrap().unwrap();
    assert_eq!(stored.data, items(&[1, 2]));
  }

  #[tokio::test]
  async fn test_network_failure_serves_snapshot() {
    let cache = layer();
    cache
      .fetch_snapshot(|| async { Ok(items(&[4, 5, 6])) })
      .await
      .unwrap();
    cache.flush().await;

    let result = cache
      .fetch_snapshot(|| async { Err::<Vec<Item>, _>(eyre!("connection refused")) })
      .await
      .unwrap();

    assert_eq!(result.source, CacheSource::Offline);
    assert!(result.cached_at.is_some());
    assert_eq!(result.data, items(&[4, 5, 6]));
  }

  #[tokio::test]
  async fn test_network_failure_with_empty_store() {
    let cache = layer();
    let result = cache
      .fetch_snapshot(|| async { Err::<Vec<Item>, _>(eyre!("connection refused")) })
      .await;

    assert_eq!(result.unwrap_err(), DataError::Processing);
  }

  #[tokio::test]
  async fn test_network_failure_without_storage_is_fatal() {
    let cache = CacheLayer::new(NoopStore);
    let result = cache
      .fetch_snapshot(|| async { Err::<Vec<Item>, _>(eyre!("connection refused")) })
      .await;

    match result {
      Err(DataError::Network(msg)) => assert!(msg.contains("connection refused")),
      other => panic!("expected network error, got {:?}", other),
    }
  }

  #[tokio::test]
  async fn test_fetcher_called_once_per_fetch() {
    let cache = layer();
    let calls = std::sync::atomic::AtomicU32::new(0);

    let _ = cache
      .fetch_snapshot(|| {
        calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        async { Err::<Vec<Item>, _>(eyre!("timeout")) }
      })
      .await;

    assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
  }
}
