use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::fmt;

use crate::cache::Cacheable;

/// Restaurant identifier as sent by the API: a JSON number or a string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RestaurantId {
  Number(Number),
  Text(String),
}

impl RestaurantId {
  /// Type-coercing comparison: `2`, `2.0` and `"2"` all match each other.
  ///
  /// Strings compare exactly. A string compared with a number is read as a
  /// number first (surrounding whitespace ignored, empty string is zero).
  pub fn loosely_equals(&self, other: &RestaurantId) -> bool {
    match (self, other) {
      (Self::Text(a), Self::Text(b)) => a == b,
      (Self::Number(a), Self::Number(b)) => match (a.as_f64(), b.as_f64()) {
        (Some(a), Some(b)) => a == b,
        _ => false,
      },
      (Self::Number(n), Self::Text(s)) | (Self::Text(s), Self::Number(n)) => {
        match (n.as_f64(), coerce_to_number(s)) {
          (Some(a), Some(b)) => a == b,
          _ => false,
        }
      }
    }
  }
}

fn coerce_to_number(s: &str) -> Option<f64> {
  let trimmed = s.trim();
  if trimmed.is_empty() {
    return Some(0.0);
  }
  trimmed.parse::<f64>().ok().filter(|n| !n.is_nan())
}

impl fmt::Display for RestaurantId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Number(n) => write!(f, "{}", n),
      Self::Text(s) => write!(f, "{}", s),
    }
  }
}

impl From<u64> for RestaurantId {
  fn from(id: u64) -> Self {
    Self::Number(id.into())
  }
}

impl From<&str> for RestaurantId {
  fn from(id: &str) -> Self {
    Self::Text(id.to_string())
  }
}

/// Geographic position of a restaurant
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
  pub lat: f64,
  pub lng: f64,
}

/// One restaurant record.
///
/// Fields not needed for querying (address, operating hours, reviews, ...)
/// are kept verbatim in `extra` so records survive the offline store intact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Restaurant {
  pub id: RestaurantId,
  pub name: String,
  pub neighborhood: String,
  pub cuisine_type: String,
  /// Base filename of the photo; missing for some records
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub photograph: Option<String>,
  pub latlng: LatLng,
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

impl Cacheable for Restaurant {
  fn entity_type() -> &'static str {
    "restaurant"
  }
}
