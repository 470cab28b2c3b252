//! Background Tasks Module
//!
//! Tasks that mutate the cache independently of request handling.
//!
//! # Tasks
//! - Reaper: removes TTL-expired entries at a fixed interval
//! - Invalidator: clears the cache when the content tree changes
//!
//! Both stop when their `CancellationToken` is cancelled.

mod invalidator;
mod reaper;

use std::future::Future;
use std::time::Duration;

use tokio::task::{JoinError, JoinHandle};
use tracing::error;

pub use invalidator::{
    spawn_invalidator, ChangeKind, Invalidator, WatchError, WatchRegistry, WatchSet,
    DEBOUNCE_WINDOW,
};
pub use reaper::spawn_reaper;

/// Runs one unit of background work on its own task so a panic inside it
/// is logged instead of tearing down the calling loop.
///
/// Returns `false` if the work panicked.
pub async fn run_guarded<F>(task: &'static str, work: F) -> bool
where
    F: Future<Output = ()> + Send + 'static,
{
    match tokio::spawn(work).await {
        Ok(()) => true,
        Err(err) if err.is_panic() => {
            error!(task, err = %err, "Panic recovered in background task");
            false
        }
        Err(err) => {
            error!(task, err = %err, "Background work cancelled");
            false
        }
    }
}

/// Waits at most `grace` for a spawned task to finish.
///
/// Returns `None` on timeout; the task is aborted so nothing it holds
/// outlives the call.
pub async fn join_within<T>(
    grace: Duration,
    mut handle: JoinHandle<T>,
) -> Option<Result<T, JoinError>> {
    match tokio::time::timeout(grace, &mut handle).await {
        Ok(result) => Some(result),
        Err(_) => {
            handle.abort();
            None
        }
    }
}
