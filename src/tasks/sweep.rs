//! Cache Sweep Task
//!
//! Background task that periodically evicts expired cache entries.

use std::sync::{Arc, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::{current_timestamp_ms, SharedCache};
use crate::logger::{Logger, DEFAULT_CHANNEL};

/// Runs a single sweep at `now_ms` and logs one line per evicted key.
///
/// Returns the number of entries removed.
pub fn sweep_once(cache: &SharedCache, logger: &dyn Logger, now_ms: i64) -> usize {
    let removed = {
        let mut guard = cache.write().unwrap_or_else(PoisonError::into_inner);
        guard.sweep_expired(now_ms)
    };

    for key in &removed {
        logger.log(&format!("Expired cache item with key: {}", key), DEFAULT_CHANNEL);
    }

    removed.len()
}

/// Spawns a background task that periodically sweeps expired cache entries.
///
/// The lock is only held for the sweep itself, never across the sleep.
///
/// # Arguments
/// * `cache` - shared reference to the cache
/// * `interval_secs` - Interval in seconds between sweeps
/// * `logger` - sink for one diagnostic line per evicted key
///
/// # Returns
/// A JoinHandle for the spawned task, aborted when the owning database shuts down.
///
/// # Example
/// ```ignore
/// let cache = Arc::new(RwLock::new(CacheStore::new(60)));
/// let handle = spawn_sweep_task(cache.clone(), 1, Arc::new(TracingLogger));
/// // Later, during shutdown:
/// handle.abort();
/// ```
pub fn spawn_sweep_task(
    cache: SharedCache,
    interval_secs: u64,
    logger: Arc<dyn Logger>,
) -> JoinHandle<()> {
    let interval = Duration::from_secs(interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            "Starting cache sweep task with interval of {} seconds",
            interval.as_secs()
        );

        loop {
            tokio::time::sleep(interval).await;

            let removed = sweep_once(&cache, logger.as_ref(), current_timestamp_ms());
            if removed > 0 {
                debug!("Cache sweep: removed {} expired entries", removed);
            }
        }
    })
}
