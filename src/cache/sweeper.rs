//! Periodic purge of expired cache entries.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time;

use super::ResponseStore;

/// Spawn a task that purges expired entries every `interval` until shutdown.
pub fn spawn_sweeper(
    store: Arc<dyn ResponseStore>,
    interval: Duration,
    mut shutdown: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!(interval_secs = interval.as_secs(), "Cache sweeper starting");
        let mut ticker = time::interval(interval);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match store.purge_expired().await {
                        Ok(0) => {}
                        Ok(removed) => tracing::debug!(removed, "Purged expired cache entries"),
                        Err(e) => tracing::warn!(error = %e, "Cache sweep failed"),
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Cache sweeper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheEntry, CacheKey, MemoryStore};
    use bytes::Bytes;
    use std::time::SystemTime;

    #[tokio::test]
    async fn test_sweeper_purges_and_stops() {
        let store = Arc::new(MemoryStore::new(Duration::from_secs(60)));
        let mut stale = CacheEntry::new(Bytes::from_static(b"x"), "text/plain");
        stale.cached_at = SystemTime::now() - Duration::from_secs(120);
        store.put(CacheKey::new("a1", "/x"), stale).await.unwrap();

        let (tx, rx) = broadcast::channel(1);
        let handle = spawn_sweeper(store.clone(), Duration::from_millis(20), rx);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(store.is_empty());

        tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
