//! Tracking for fire-and-forget writes.
//!
//! Callers never wait on these writes, but the process can drain them
//! before exit (and tests can observe their effects deterministically).
//! Writes are never aborted: dropping the owner or a `flush` future leaves
//! them running on the runtime.

use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::task::JoinSet;
use tracing::warn;

/// Join set that detaches its tasks on drop instead of aborting them.
#[derive(Default)]
struct Tasks(JoinSet<()>);

impl Drop for Tasks {
  fn drop(&mut self) {
    self.0.detach_all();
  }
}

#[derive(Clone, Default)]
pub struct PendingWrites {
  tasks: Arc<Mutex<Tasks>>,
}

impl PendingWrites {
  pub fn new() -> Self {
    Self::default()
  }

  /// Start a write in the background. Must be called within a tokio runtime.
  pub fn spawn<F>(&self, write: F)
  where
    F: Future<Output = ()> + Send + 'static,
  {
    let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
    // Reap finished writes so the set does not grow without bound
    while tasks.0.try_join_next().is_some() {}
    tasks.0.spawn(write);
  }

  /// Wait for every write started so far, including writes spawned while flushing.
  ///
  /// Cancelling the flush detaches the writes it was waiting on; they still
  /// complete but a later flush does not wait for them.
  pub async fn flush(&self) {
    loop {
      let mut tasks = {
        let mut guard = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::take(&mut *guard)
      };

      if tasks.0.is_empty() {
        return;
      }

      while let Some(result) = tasks.0.join_next().await {
        if let Err(e) = result {
          warn!(error = %e, "background write task failed");
        }
      }
    }
  }
}
