//! Restaurant queries for page scripts, backed by the offline snapshot cache.

use tracing::info;

use crate::cache::{CacheLayer, CacheSource, SnapshotStore};
use crate::error::DataError;

use super::client::RestaurantSource;
use super::filters;
use super::types::{Restaurant, RestaurantId};

/// Data access for restaurant pages.
///
/// Every query starts from `fetch_all`, so every query benefits from the
/// offline fallback and every successful one seeds the offline store.
pub struct RestaurantRepository<N: RestaurantSource, S: SnapshotStore> {
  source: N,
  cache: CacheLayer<S>,
}

impl<N: RestaurantSource, S: SnapshotStore + 'static> RestaurantRepository<N, S> {
  pub fn new(source: N, storage: S) -> Self {
    Self {
      source,
      cache: CacheLayer::new(storage),
    }
  }

  /// The full collection from the network, or the offline snapshot when the
  /// network is unavailable.
  pub async fn fetch_all(&self) -> Result<Vec<Restaurant>, DataError> {
    let result = self
      .cache
      .fetch_snapshot(|| self.source.fetch_restaurants())
      .await?;

    if result.source == CacheSource::Offline {
      info!(
        count = result.data.len(),
        cached_at = ?result.cached_at,
        "using offline restaurants"
      );
    }

    Ok(result.data)
  }

  pub async fn fetch_by_id(&self, id: &RestaurantId) -> Result<Restaurant, DataError> {
    let restaurants = self.fetch_all().await?;
    filters::find_by_id(&restaurants, id)
      .cloned()
      .ok_or(DataError::NotFound)
  }

  pub async fn fetch_by_cuisine(&self, cuisine: &str) -> Result<Vec<Restaurant>, DataError> {
    let restaurants = self.fetch_all().await?;
    Ok(filters::by_cuisine(&restaurants, cuisine))
  }

  pub async fn fetch_by_neighborhood(
    &self,
    neighborhood: &str,
  ) -> Result<Vec<Restaurant>, DataError> {
    let restaurants = self.fetch_all().await?;
    Ok(filters::by_neighborhood(&restaurants, neighborhood))
  }

  /// Pass `"all"` for either argument to skip that filter.
  pub async fn fetch_by_cuisine_and_neighborhood(
    &self,
    cuisine: &str,
    neighborhood: &str,
  ) -> Result<Vec<Restaurant>, DataError> {
    let restaurants = self.fetch_all().await?;
    Ok(filters::by_cuisine_and_neighborhood(
      &restaurants,
      cuisine,
      neighborhood,
    ))
  }

  pub async fn list_neighborhoods(&self) -> Result<Vec<String>, DataError> {
    let restaurants = self.fetch_all().await?;
    Ok(filters::neighborhoods(&restaurants))
  }

  pub async fn list_cuisines(&self) -> Result<Vec<String>, DataError> {
    let restaurants = self.fetch_all().await?;
    Ok(filters::cuisines(&restaurants))
  }

  /// Wait for background offline-store writes to finish.
  pub async fn flush(&self) {
    self.cache.flush().await;
  }

  #[cfg(test)]
  pub fn storage(&self) -> &S {
    self.cache.storage()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{NoopStore, SqliteSnapshotStore};
  use crate::restaurants::filters::tests::{restaurant, sample};
  use color_eyre::{eyre::eyre, Result};
  use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
  use std::sync::Mutex;

  /// Network stand-in: serves `data` until taken offline.
  struct StubSource {
    data: Mutex<Vec<Restaurant>>,
    offline: AtomicBool,
    calls: AtomicU32,
  }

  impl StubSource {
    fn new(data: Vec<Restaurant>) -> Self {
      Self {
        data: Mutex::new(data),
        offline: AtomicBool::new(false),
        calls: AtomicU32::new(0),
      }
    }

    fn offline() -> Self {
      let source = Self::new(Vec::new());
      source.go_offline();
      source
    }

    fn go_offline(&self) {
      self.offline.store(true, Ordering::SeqCst);
    }

    fn replace(&self, data: Vec<Restaurant>) {
      *self.data.lock().unwrap() = data;
    }
  }

  impl RestaurantSource for StubSource {
    async fn fetch_restaurants(&self) -> Result<Vec<Restaurant>> {
      self.calls.fetch_add(1, Ordering::SeqCst);
      if self.offline.load(Ordering::SeqCst) {
        return Err(eyre!("Failed to reach http://localhost:1337/restaurants"));
      }
      Ok(self.data.lock().unwrap().clone())
    }
  }

  fn repository(source: StubSource) -> RestaurantRepository<StubSource, SqliteSnapshotStore> {
    RestaurantRepository::new(source, SqliteSnapshotStore::open_in_memory().unwrap())
  }

  #[tokio::test]
  async fn test_fetch_all_returns_network_collection() {
    let repo = repository(StubSource::new(sample()));
    assert_eq!(repo.fetch_all().await.unwrap(), sample());
  }

  #[tokio::test]
  async fn test_store_keeps_first_snapshot() {
    let repo = repository(StubSource::new(sample()));
    repo.fetch_all().await.unwrap();
    repo.flush().await;

    let changed = vec![restaurant(9, "French", "Uptown")];
    repo.source.replace(changed.clone());
    assert_eq!(repo.fetch_all().await.unwrap(), changed);
    repo.flush().await;

    assert_eq!(repo.storage().count().unwrap(), 1);

    // Offline reads still see the first snapshot
    repo.source.go_offline();
    assert_eq!(repo.fetch_all().await.unwrap(), sample());
  }

  #[tokio::test]
  async fn test_offline_with_empty_store() {
    let repo = repository(StubSource::offline());
    assert_eq!(repo.fetch_all().await.unwrap_err(), DataError::Processing);
    assert_eq!(
      repo.fetch_all().await.unwrap_err().to_string(),
      "Error in processing"
    );
  }

  #[tokio::test]
  async fn test_offline_without_storage() {
    let repo = RestaurantRepository::new(StubSource::offline(), NoopStore);
    assert!(matches!(
      repo.fetch_all().await,
      Err(DataError::Network(_))
    ));
  }

  #[tokio::test]
  async fn test_fetch_by_id() {
    let repo = repository(StubSource::new(sample()));
    let found = repo.fetch_by_id(&RestaurantId::from(2)).await.unwrap();
    assert_eq!(found.id, RestaurantId::from(2));

    let found = repo.fetch_by_id(&RestaurantId::from("2")).await.unwrap();
    assert_eq!(found.cuisine_type, "Italian");

    let missing = repo.fetch_by_id(&RestaurantId::from(99)).await.unwrap_err();
    assert_eq!(missing, DataError::NotFound);
    assert_eq!(missing.to_string(), "Restaurant does not exist");
  }

  #[tokio::test]
  async fn test_fetch_by_id_propagates_fetch_error() {
    let repo = repository(StubSource::offline());
    assert_eq!(
      repo.fetch_by_id(&RestaurantId::from(1)).await.unwrap_err(),
      DataError::Processing
    );
  }

  #[tokio::test]
  async fn test_filters_and_lists() {
    let repo = repository(StubSource::new(sample()));

    assert_eq!(repo.fetch_by_cuisine("Mexican").await.unwrap().len(), 2);
    assert_eq!(repo.fetch_by_neighborhood("Brooklyn").await.unwrap().len(), 2);
    assert!(repo.fetch_by_cuisine("French").await.unwrap().is_empty());

    let downtown = repo
      .fetch_by_cuisine_and_neighborhood("all", "Downtown")
      .await
      .unwrap();
    assert!(downtown.iter().all(|r| r.neighborhood == "Downtown"));
    assert_eq!(downtown.len(), 2);

    assert_eq!(
      repo.list_cuisines().await.unwrap(),
      vec!["Mexican", "Italian", "Asian"]
    );
    assert_eq!(
      repo.list_neighborhoods().await.unwrap(),
      vec!["Downtown", "Brooklyn"]
    );
  }

  #[tokio::test]
  async fn test_queries_work_offline() {
    let repo = repository(StubSource::new(sample()));
    repo.fetch_all().await.unwrap();
    repo.flush().await;
    repo.source.go_offline();

    assert_eq!(repo.list_cuisines().await.unwrap().len(), 3);
    assert_eq!(repo.fetch_by_cuisine("Asian").await.unwrap().len(), 1);
    assert_eq!(repo.source.calls.load(Ordering::SeqCst), 3);
  }
}
