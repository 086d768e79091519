use color_eyre::{eyre::eyre, Result};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::config::ApiConfig;

use super::types::Restaurant;

/// Where the full restaurant collection comes from.
pub trait RestaurantSource: Send + Sync {
  fn fetch_restaurants(&self) -> impl Future<Output = Result<Vec<Restaurant>>> + Send;
}

/// Restaurant API client
#[derive(Clone)]
pub struct RestaurantClient {
  client: reqwest::Client,
  url: Url,
}

impl RestaurantClient {
  pub fn new(config: &ApiConfig) -> Result<Self> {
    let url = Url::parse(&config.url)
      .map_err(|e| eyre!("Invalid restaurant API url '{}': {}", config.url, e))?;

    let mut builder = reqwest::Client::builder();
    if let Some(secs) = config.request_timeout_secs {
      builder = builder.timeout(Duration::from_secs(secs));
    }

    let client = builder
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self { client, url })
  }

  pub fn url(&self) -> &Url {
    &self.url
  }
}

/// Decode the collection body.
///
/// The transport already succeeded here, so a failure means the API sent
/// records this client cannot read.
fn parse_restaurants(body: &[u8]) -> Result<Vec<Restaurant>> {
  serde_json::from_slice(body).map_err(|e| {
    warn!(error = %e, bytes = body.len(), "restaurant API returned malformed data");
    eyre!("Malformed restaurant data: {}", e)
  })
}

impl RestaurantSource for RestaurantClient {
  /// GET the whole collection. No query parameters, auth or paging.
  async fn fetch_restaurants(&self) -> Result<Vec<Restaurant>> {
    debug!(url = %self.url, "fetching restaurants");

    let body = self
      .client
      .get(self.url.clone())
      .send()
      .await
      .map_err(|e| eyre!("Failed to reach {}: {}", self.url, e))?
      .error_for_status()
      .map_err(|e| eyre!("Restaurant API error: {}", e))?
      .bytes()
      .await
      .map_err(|e| eyre!("Failed to read restaurant response: {}", e))?;

    let restaurants = parse_restaurants(&body)?;
    debug!(count = restaurants.len(), "fetched restaurants");
    Ok(restaurants)
  }
}
