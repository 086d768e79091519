//! Command-line entry points for both components.

use clap::Subcommand;
use color_eyre::Result;
use serde::Serialize;
use std::io::Write;
use tracing::{debug, info, warn};

use crate::cache::{NoopStore, SnapshotStore, SqliteSnapshotStore};
use crate::config::Config;
use crate::restaurants::{
  image_urls_for, map_marker_for, url_for, ImageUrls, MapMarker, RestaurantClient,
  RestaurantId, RestaurantRepository, ALL,
};
use crate::worker::{
  AssetWorker, CacheStorage, HttpNetwork, Request, SqliteCacheStorage, WorkerMessage,
  WorkerSettings,
};

#[derive(Subcommand, Debug)]
pub enum Command {
  /// Query restaurants (network first, offline store as fallback)
  #[command(subcommand)]
  Restaurants(RestaurantCommand),
  /// Drive the asset cache worker
  #[command(subcommand)]
  Worker(WorkerCommand),
}

#[derive(Subcommand, Debug)]
pub enum RestaurantCommand {
  /// Print every restaurant
  All,
  /// Print one restaurant by id
  Get { id: String },
  /// Restaurants serving a cuisine
  Cuisine { cuisine: String },
  /// Restaurants in a neighborhood
  Neighborhood { neighborhood: String },
  /// Filter by cuisine and neighborhood ("all" matches everything)
  Search {
    #[arg(long, default_value = ALL)]
    cuisine: String,
    #[arg(long, default_value = ALL)]
    neighborhood: String,
  },
  /// Distinct cuisines
  Cuisines,
  /// Distinct neighborhoods
  Neighborhoods,
  /// Page, image and map-marker urls for one restaurant
  Urls { id: String },
}

#[derive(Subcommand, Debug)]
pub enum WorkerCommand {
  /// Pre-cache every asset under the configured cache version
  Install,
  /// Activate the installed version and delete every other cache
  Activate,
  /// Deliver a control message, e.g. '{"action":"skipWaiting"}'
  Message { json: String },
  /// Answer a request the way the worker would
  Fetch { url: String },
  /// List asset caches
  Caches,
}

#[derive(Serialize)]
struct Urls {
  url: String,
  images: Option<ImageUrls>,
  marker: MapMarker,
}

#[derive(Serialize)]
struct CacheInfo {
  name: String,
  entries: usize,
  current: bool,
}

pub async fn run(config: &Config, command: Command) -> Result<()> {
  match command {
    Command::Restaurants(cmd) => run_restaurants(config, cmd).await,
    Command::Worker(cmd) => run_worker(config, cmd).await,
  }
}

async fn run_restaurants(config: &Config, command: RestaurantCommand) -> Result<()> {
  let client = RestaurantClient::new(&config.api)?;
  debug!(url = %client.url(), "restaurant API");

  if !config.offline_store.enabled {
    info!("offline store disabled, running network-only");
    return query(RestaurantRepository::new(client, NoopStore), command).await;
  }

  match SqliteSnapshotStore::open(&config.offline_store_path()?) {
    Ok(store) => query(RestaurantRepository::new(client, store), command).await,
    Err(e) => {
      warn!(error = %e, "persistent storage unavailable, running network-only");
      query(RestaurantRepository::new(client, NoopStore), command).await
    }
  }
}

async fn query<S: SnapshotStore + 'static>(
  repo: RestaurantRepository<RestaurantClient, S>,
  command: RestaurantCommand,
) -> Result<()> {
  let result = execute_query(&repo, command).await;
  repo.flush().await;
  result
}

async fn execute_query<S: SnapshotStore + 'static>(
  repo: &RestaurantRepository<RestaurantClient, S>,
  command: RestaurantCommand,
) -> Result<()> {
  match command {
    RestaurantCommand::All => print_json(&repo.fetch_all().await?),
    RestaurantCommand::Get { id } => {
      print_json(&repo.fetch_by_id(&RestaurantId::from(id.as_str())).await?)
    }
    RestaurantCommand::Cuisine { cuisine } => print_json(&repo.fetch_by_cuisine(&cuisine).await?),
    RestaurantCommand::Neighborhood { neighborhood } => {
      print_json(&repo.fetch_by_neighborhood(&neighborhood).await?)
    }
    RestaurantCommand::Search {
      cuisine,
      neighborhood,
    } => print_json(
      &repo
        .fetch_by_cuisine_and_neighborhood(&cuisine, &neighborhood)
        .await?,
    ),
    RestaurantCommand::Cuisines => print_json(&repo.list_cuisines().await?),
    RestaurantCommand::Neighborhoods => print_json(&repo.list_neighborhoods().await?),
    RestaurantCommand::Urls { id } => {
      let restaurant = repo.fetch_by_id(&RestaurantId::from(id.as_str())).await?;
      print_json(&Urls {
        url: url_for(&restaurant),
        images: image_urls_for(&restaurant),
        marker: map_marker_for(&restaurant),
      })
    }
  }
}

async fn run_worker(config: &Config, command: WorkerCommand) -> Result<()> {
  let settings = WorkerSettings::from_config(&config.worker)?;
  let caches = SqliteCacheStorage::open(&config.cache_path()?)?;

  match command {
    WorkerCommand::Install => {
      let mut worker = AssetWorker::new(settings, HttpNetwork::new(), caches);
      let count = worker.install().await?;
      info!(count, state = %worker.state(), "worker installed");
      println!("{}", worker.state());
    }
    WorkerCommand::Activate => {
      let mut worker = AssetWorker::resume_installed(settings, HttpNetwork::new(), caches)?;
      let deleted = worker.activate()?;
      print_json(&deleted)?;
    }
    WorkerCommand::Message { json } => {
      let message = WorkerMessage::parse(&json)?;
      let mut worker = if caches.len(&settings.cache_version)? > 0 {
        AssetWorker::resume_installed(settings, HttpNetwork::new(), caches)?
      } else {
        AssetWorker::new(settings, HttpNetwork::new(), caches)
      };
      worker.handle_message(message)?;
      println!("{}", worker.state());
    }
    WorkerCommand::Fetch { url } => {
      let worker = AssetWorker::new(settings, HttpNetwork::new(), caches);
      let url = worker.settings().resolve(&url)?;
      let outcome = worker.handle_fetch(&Request::get(url)).await?;
      worker.flush().await;

      info!(
        status = outcome.response.status,
        source = ?outcome.source,
        content_type = outcome.response.header("content-type").unwrap_or("-"),
        "fetched"
      );
      std::io::stdout().write_all(&outcome.response.body)?;
    }
    WorkerCommand::Caches => {
      let current = &settings.cache_version;
      let mut entries = Vec::new();
      for name in caches.keys()? {
        entries.push(CacheInfo {
          entries: caches.len(&name)?,
          current: &name == current,
          name,
        });
      }
      print_json(&entries)?;
    }
  }

  Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}
