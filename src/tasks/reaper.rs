//! TTL Reaper Task
//!
//! Background task that periodically sweeps expired cache entries.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::run_guarded;
use crate::cache::CacheStore;

/// Spawns a task that calls [`CacheStore::sweep`] every `interval`.
///
/// The first sweep happens one interval after start. A panic during a sweep
/// is logged and the next tick proceeds normally. The task exits when
/// `cancel` fires.
///
/// Only spawn this for stores with a finite TTL.
///
/// # Example
/// ```ignore
/// let cancel = CancellationToken::new();
/// let handle = spawn_reaper(store.clone(), Duration::from_secs(60), cancel.clone());
/// // Later, during shutdown:
/// cancel.cancel();
/// handle.await?;
/// ```
pub fn spawn_reaper(
    store: Arc<CacheStore>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(interval_secs = interval.as_secs(), "Cache reaper started");

        let mut ticker = interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("Cache reaper stopping");
                    break;
                }
                _ = ticker.tick() => {
                    let store = store.clone();
                    run_guarded("reaper", async move {
                        let removed = store.sweep(Utc::now()).await;
                        if removed > 0 {
                            debug!(removed, "Cache sweep finished");
                        }
                    })
                    .await;
                }
            }
        }
    })
}
