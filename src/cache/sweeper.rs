//! Background removal of expired cache entries.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info};

use super::store::CacheStore;

const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Starts periodic sweeps over a shared store.
pub struct Sweeper;

impl Sweeper {
    /// Spawn a task calling [`CacheStore::sweep_expired`] every `interval`.
    ///
    /// Must be called from within a tokio runtime. The first sweep happens one
    /// full interval after start. A zero interval is raised to one millisecond.
    pub fn start<V>(store: Arc<CacheStore<V>>, interval: Duration) -> SweepHandle
    where
        V: Clone + Send + Sync + 'static,
    {
        let interval = interval.max(MIN_INTERVAL);
        let task = tokio::spawn(async move {
            let mut ticker = time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let removed = store.sweep_expired();
                debug!(removed, remaining = store.len(), "Cache sweep finished");
            }
        });

        info!(interval_ms = interval.as_millis() as u64, "Cache sweeper started");
        SweepHandle { task: Some(task) }
    }
}

/// Owner of a running sweeper; dropping it stops the sweeps.
pub struct SweepHandle {
    task: Option<JoinHandle<()>>,
}

impl SweepHandle {
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Stop sweeping and wait for the task to wind down.
    pub async fn stop(mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
            info!("Cache sweeper stopped");
        }
    }
}

impl Drop for SweepHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;

    use super::*;
    use crate::cache::keys::{EntityKind, KeyParams, make_key};

    fn store() -> Arc<CacheStore<u32>> {
        Arc::new(CacheStore::new(NonZeroUsize::new(8).expect("capacity")))
    }

    #[tokio::test(start_paused = true)]
    async fn sweeps_on_interval() {
        let store = store();
        let short = make_key(EntityKind::User, "short", &KeyParams::new());
        let long = make_key(EntityKind::User, "long", &KeyParams::new());
        store.put(short.clone(), 1, Duration::from_secs(5));
        store.put(long.clone(), 2, Duration::from_secs(600));

        let handle = Sweeper::start(store.clone(), Duration::from_secs(60));
        assert!(handle.is_running());

        time::sleep(Duration::from_secs(61)).await;
        assert_eq!(store.len(), 1);
        assert_eq!(store.stats().keys, vec![long]);

        handle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn zero_interval_still_sweeps() {
        let store = store();
        let key = make_key(EntityKind::User, "k", &KeyParams::new());
        store.put(key, 1, Duration::from_millis(5));

        let handle = Sweeper::start(store.clone(), Duration::ZERO);
        time::sleep(Duration::from_millis(10)).await;

        assert!(handle.is_running());
        assert!(store.is_empty());
        handle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn stopped_sweeper_leaves_store_alone() {
        let store = store();
        let key = make_key(EntityKind::User, "k", &KeyParams::new());
        store.put(key, 1, Duration::from_secs(1));

        let handle = Sweeper::start(store.clone(), Duration::from_secs(10));
        handle.stop().await;

        time::sleep(Duration::from_secs(30)).await;
        assert_eq!(store.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_handle_stops_sweeps() {
        let store = store();
        let key = make_key(EntityKind::User, "k", &KeyParams::new());
        store.put(key, 1, Duration::from_secs(1));

        drop(Sweeper::start(store.clone(), Duration::from_secs(10)));

        time::sleep(Duration::from_secs(30)).await;
        assert_eq!(store.len(), 1);
    }
}
