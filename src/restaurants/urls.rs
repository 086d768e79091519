//! Page, image and map-marker data derived from a record. No I/O.

use serde::Serialize;

use super::types::{LatLng, Restaurant};

/// Responsive image variants for a restaurant photo
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageUrls {
  pub small: String,
  pub medium: String,
  pub large: String,
}

/// Data a map collaborator needs to place a marker
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapMarker {
  pub position: LatLng,
  pub title: String,
  pub alt: String,
  pub url: String,
}

/// Relative URL of the restaurant's detail page.
pub fn url_for(restaurant: &Restaurant) -> String {
  format!("./restaurant.html?id={}", restaurant.id)
}

/// Image URLs keyed by the first character of the photograph name.
///
/// Returns `None` when the record has no photograph.
pub fn image_urls_for(restaurant: &Restaurant) -> Option<ImageUrls> {
  let first = restaurant.photograph.as_deref()?.chars().next()?;
  let image_path = format!("./img/{}", first);

  Some(ImageUrls {
    small: format!("{}-small.jpg", image_path),
    medium: format!("{}-medium.jpg", image_path),
    large: format!("{}-large.jpg", image_path),
  })
}

pub fn map_marker_for(restaurant: &Restaurant) -> MapMarker {
  MapMarker {
    position: restaurant.latlng,
    title: restaurant.name.clone(),
    alt: restaurant.name.clone(),
    url: url_for(restaurant),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::restaurants::filters::tests::restaurant;
  use crate::restaurants::types::RestaurantId;

  #[test]
  fn test_url_for() {
    assert_eq!(url_for(&restaurant(7, "Pizza", "Brooklyn")), "./restaurant.html?id=7");

    let mut named = restaurant(1, "Pizza", "Brooklyn");
    named.id = RestaurantId::from("abc");
    assert_eq!(url_for(&named), "./restaurant.html?id=abc");
  }

  #[test]
  fn test_image_urls_use_first_character() {
    let mut r = restaurant(1, "Pizza", "Brooklyn");
    r.photograph = Some("10.jpg".to_string());

    let urls = image_urls_for(&r).unwrap();
    assert_eq!(urls.small, "./img/1-small.jpg");
    assert_eq!(urls.medium, "./img/1-medium.jpg");
    assert_eq!(urls.large, "./img/1-large.jpg");
  }

  #[test]
  fn test_image_urls_without_photograph() {
    let mut r = restaurant(1, "Pizza", "Brooklyn");
    r.photograph = None;
    assert!(image_urls_for(&r).is_none());

    r.photograph = Some(String::new());
    assert!(image_urls_for(&r).is_none());
  }

  #[test]
  fn test_map_marker() {
    let r = restaurant(3, "Asian", "Manhattan");
    let marker = map_marker_for(&r);
    assert_eq!(marker.title, "Restaurant 3");
    assert_eq!(marker.alt, marker.title);
    assert_eq!(marker.url, "./restaurant.html?id=3");
    assert_eq!(marker.position, r.latlng);
  }
}
