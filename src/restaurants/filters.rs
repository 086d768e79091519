//! Pure queries over a restaurant collection.

use super::types::{Restaurant, RestaurantId};

/// Filter value that matches every restaurant.
pub const ALL: &str = "all";

/// Linear scan for the first restaurant whose id loosely equals `id`.
pub fn find_by_id<'a>(restaurants: &'a [Restaurant], id: &RestaurantId) -> Option<&'a Restaurant> {
  restaurants.iter().find(|r| r.id.loosely_equals(id))
}

pub fn by_cuisine(restaurants: &[Restaurant], cuisine: &str) -> Vec<Restaurant> {
  restaurants
    .iter()
    .filter(|r| r.cuisine_type == cuisine)
    .cloned()
    .collect()
}

pub fn by_neighborhood(restaurants: &[Restaurant], neighborhood: &str) -> Vec<Restaurant> {
  restaurants
    .iter()
    .filter(|r| r.neighborhood == neighborhood)
    .cloned()
    .collect()
}

/// Both filters applied together; `"all"` disables either one.
pub fn by_cuisine_and_neighborhood(
  restaurants: &[Restaurant],
  cuisine: &str,
  neighborhood: &str,
) -> Vec<Restaurant> {
  restaurants
    .iter()
    .filter(|r| cuisine == ALL || r.cuisine_type == cuisine)
    .filter(|r| neighborhood == ALL || r.neighborhood == neighborhood)
    .cloned()
    .collect()
}

pub fn neighborhoods(restaurants: &[Restaurant]) -> Vec<String> {
  distinct(restaurants.iter().map(|r| r.neighborhood.as_str()))
}

pub fn cuisines(restaurants: &[Restaurant]) -> Vec<String> {
  distinct(restaurants.iter().map(|r| r.cuisine_type.as_str()))
}

/// Distinct values in first-occurrence order.
fn distinct<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
  let mut seen = std::collections::HashSet::new();
  values
    .filter(|v| seen.insert(*v))
    .map(String::from)
    .collect()
}

#[cfg(test)]
pub(crate) mod tests {
  use super::*;
  use crate::restaurants::types::LatLng;
  use serde_json::Map;

  pub(crate) fn restaurant(id: u64, cuisine: &str, neighborhood: &str) -> Restaurant {
    Restaurant {
      id: RestaurantId::from(id),
      name: format!("Restaurant {}", id),
      neighborhood: neighborhood.to_string(),
      cuisine_type: cuisine.to_string(),
      photograph: Some(id.to_string()),
      latlng: LatLng {
        lat: 40.7,
        lng: -73.9,
      },
      extra: Map::new(),
    }
  }

  pub(crate) fn sample() -> Vec<Restaurant> {
    vec![
      restaurant(1, "Mexican", "Downtown"),
      restaurant(2, "Italian", "Brooklyn"),
      restaurant(3, "Mexican", "Brooklyn"),
      restaurant(4, "Asian", "Downtown"),
    ]
  }

  fn ids(restaurants: &[Restaurant]) -> Vec<String> {
    restaurants.iter().map(|r| r.id.to_string()).collect()
  }

  #[test]
  fn test_find_by_id() {
    let restaurants = sample();
    let found = find_by_id(&restaurants, &RestaurantId::from(2)).unwrap();
    assert_eq!(found.cuisine_type, "Italian");

    let found = find_by_id(&restaurants, &RestaurantId::from("3")).unwrap();
    assert_eq!(found.id, RestaurantId::from(3));

    assert!(find_by_id(&restaurants, &RestaurantId::from(99)).is_none());
  }

  #[test]
  fn test_single_filters() {
    let restaurants = sample();
    assert_eq!(ids(&by_cuisine(&restaurants, "Mexican")), vec!["1", "3"]);
    assert_eq!(ids(&by_neighborhood(&restaurants, "Brooklyn")), vec!["2", "3"]);
    assert!(by_cuisine(&restaurants, "French").is_empty());
  }

  #[test]
  fn test_filters_are_case_sensitive() {
    assert!(by_cuisine(&sample(), "mexican").is_empty());
  }

  #[test]
  fn test_combined_filter_sentinel() {
    let restaurants = sample();
    assert_eq!(
      ids(&by_cuisine_and_neighborhood(&restaurants, ALL, "Downtown")),
      vec!["1", "4"]
    );
    assert_eq!(
      ids(&by_cuisine_and_neighborhood(&restaurants, "Mexican", ALL)),
      vec!["1", "3"]
    );
    assert_eq!(ids(&by_cuisine_and_neighborhood(&restaurants, ALL, ALL)).len(), 4);
    assert_eq!(
      ids(&by_cuisine_and_neighborhood(&restaurants, "Mexican", "Brooklyn")),
      vec!["3"]
    );
  }

  #[test]
  fn test_distinct_in_first_occurrence_order() {
    let restaurants = vec![
      restaurant(1, "Mexican", "Queens"),
      restaurant(2, "Italian", "Manhattan"),
      restaurant(3, "Mexican", "Queens"),
    ];
    assert_eq!(cuisines(&restaurants), vec!["Mexican", "Italian"]);
    assert_eq!(neighborhoods(&restaurants), vec!["Queens", "Manhattan"]);
    assert!(cuisines(&[]).is_empty());
  }
}
