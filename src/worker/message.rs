use serde::{Deserialize, Serialize};

use super::WorkerError;

/// Control messages posted to the worker by the page it controls
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum WorkerMessage {
  /// Activate the waiting worker without waiting for old clients to close
  #[serde(rename = "skipWaiting")]
  SkipWaiting,
  /// Any action this worker does not know about
  #[serde(other)]
  Unknown,
}

impl WorkerMessage {
  pub fn parse(raw: &str) -> Result<Self, WorkerError> {
    serde_json::from_str(raw).map_err(|e| WorkerError::InvalidMessage(e.to_string()))
  }
}
