//! Expiration Sweep Task
//!
//! Background task that periodically removes expired cache entries, so idle
//! catalog copies do not sit in memory until the next read.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::CacheStore;

/// Spawns a task that sweeps expired entries every `cleanup_interval_secs`.
///
/// The returned handle is aborted during graceful shutdown.
pub fn spawn_cleanup_task(
    cache: Arc<RwLock<CacheStore>>,
    cleanup_interval_secs: u64,
) -> JoinHandle<()> {
    let interval = Duration::from_secs(cleanup_interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            "Starting cache sweep task with interval of {} seconds",
            interval.as_secs()
        );

        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let removed = cache.write().await.cleanup_expired();

            if removed > 0 {
                info!("Cache sweep: removed {} expired entries", removed);
            } else {
                debug!("Cache sweep: no expired entries found");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{EntryOptions, ManualClock};

    fn store_with_clock() -> (Arc<RwLock<CacheStore>>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(0));
        let store = CacheStore::with_clock(100, clock.clone());
        (Arc::new(RwLock::new(store)), clock)
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_task_removes_expired_entries() {
        let (cache, clock) = store_with_clock();
        let options = EntryOptions::new().with_sliding_expiration(Duration::from_secs(60));
        cache
            .write()
            .await
            .set("catalog".to_string(), b"[]".to_vec(), options)
            .unwrap();

        let handle = spawn_cleanup_task(cache.clone(), 1);

        clock.advance(Duration::from_secs(61));
        tokio::time::sleep(Duration::from_millis(1_500)).await;

        {
            let store = cache.read().await;
            assert_eq!(store.len(), 0, "expired entry should have been swept");
            assert_eq!(store.stats().expirations, 1);
            // Swept without a read, so no miss was recorded
            assert_eq!(store.stats().misses, 0);
        }

        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_task_preserves_live_entries() {
        let (cache, clock) = store_with_clock();
        let options = EntryOptions::new().with_absolute_expiration(Duration::from_secs(120));
        cache
            .write()
            .await
            .set("catalog".to_string(), b"[]".to_vec(), options)
            .unwrap();

        let handle = spawn_cleanup_task(cache.clone(), 1);

        clock.advance(Duration::from_secs(119));
        tokio::time::sleep(Duration::from_millis(2_500)).await;

        assert_eq!(cache.read().await.len(), 1);

        handle.abort();
    }

    #[tokio::test]
    async fn test_cleanup_task_can_be_aborted() {
        let (cache, _) = store_with_clock();

        let handle = spawn_cleanup_task(cache, 1);
        handle.abort();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.is_finished(), "Task should be finished after abort");
    }
}
