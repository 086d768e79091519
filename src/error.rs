use thiserror::Error;

/// Failure of a restaurant query.
///
/// The `Display` strings of `Processing` and `NotFound` are the exact
/// messages page scripts match on, so they must not change.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataError {
  /// Network failed and no offline store is available to fall back to
  #[error("Network request failed: {0}")]
  Network(String),
  /// Network failed and the offline store had nothing usable
  #[error("Error in processing")]
  Processing,
  /// No restaurant matched the requested id
  #[error("Restaurant does not exist")]
  NotFound,
}
