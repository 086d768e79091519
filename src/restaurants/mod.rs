//! Restaurant data access: network client, record types and queries.

mod client;
mod filters;
mod repository;
mod types;
mod urls;

pub use client::RestaurantClient;
pub use filters::ALL;
pub use repository::RestaurantRepository;
pub use types::RestaurantId;
pub use urls::{image_urls_for, map_marker_for, url_for, ImageUrls, MapMarker};
