//! Request shaping: debounce, throttle and adaptive cache use.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::application::repos::NetworkQuality;
use crate::cache::mutex_lock;
use crate::domain::types::ConnectionQuality;

const SOURCE: &str = "application::shaping";

type Callback<A> = Arc<dyn Fn(A) + Send + Sync>;

/// Trailing-edge debouncer: only the last call within `delay` runs.
pub struct Debounced<A> {
    callback: Callback<A>,
    delay: Duration,
    pending: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl<A> Clone for Debounced<A> {
    fn clone(&self) -> Self {
        Self {
            callback: Arc::clone(&self.callback),
            delay: self.delay,
            pending: Arc::clone(&self.pending),
        }
    }
}

/// Wrap `f` so that each call postpones it by `delay` and replaces the
/// arguments of any call still waiting.
pub fn debounce<A, F>(f: F, delay: Duration) -> Debounced<A>
where
    A: Send + 'static,
    F: Fn(A) + Send + Sync + 'static,
{
    Debounced {
        callback: Arc::new(f),
        delay,
        pending: Arc::new(Mutex::new(None)),
    }
}

impl<A: Send + 'static> Debounced<A> {
    /// Schedule `f(args)` after the delay, cancelling any pending call.
    ///
    /// Must be called from within a tokio runtime.
    pub fn call(&self, args: A) {
        let callback = Arc::clone(&self.callback);
        let delay = self.delay;
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            callback(args);
        });

        let mut pending = mutex_lock(&self.pending, SOURCE, "debounce.call");
        if let Some(previous) = pending.replace(task) {
            previous.abort();
            trace!("Debounced call superseded");
        }
    }

    /// Drop the pending call, if any. Returns whether one was waiting.
    pub fn cancel(&self) -> bool {
        let mut pending = mutex_lock(&self.pending, SOURCE, "debounce.cancel");
        match pending.take() {
            Some(task) if !task.is_finished() => {
                task.abort();
                true
            }
            _ => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        let pending = mutex_lock(&self.pending, SOURCE, "debounce.is_pending");
        pending.as_ref().is_some_and(|task| !task.is_finished())
    }
}

/// Leading-edge throttle: runs at most once per `interval`.
pub struct Throttled<A> {
    callback: Callback<A>,
    interval: Duration,
    last_run: Mutex<Option<Instant>>,
}

pub fn throttle<A, F>(f: F, interval: Duration) -> Throttled<A>
where
    F: Fn(A) + Send + Sync + 'static,
{
    Throttled {
        callback: Arc::new(f),
        interval,
        last_run: Mutex::new(None),
    }
}

impl<A> Throttled<A> {
    /// Run `f(args)` now unless it already ran within the interval.
    ///
    /// Returns whether it ran; dropped calls are not replayed.
    pub fn call(&self, args: A) -> bool {
        let now = Instant::now();
        {
            let mut last_run = mutex_lock(&self.last_run, SOURCE, "throttle.call");
            if let Some(previous) = *last_run {
                if now.duration_since(previous) < self.interval {
                    trace!("Throttled call dropped");
                    return false;
                }
            }
            *last_run = Some(now);
        }
        (self.callback)(args);
        true
    }
}

pub fn connection_quality(network: &dyn NetworkQuality) -> ConnectionQuality {
    ConnectionQuality::from(network.effective_type())
}

/// Whether reads should prefer the cache on the current connection.
///
/// Slow and medium links use the cache; fast or unknown links go to the
/// store for freshness.
pub fn should_use_cache(network: &dyn NetworkQuality) -> bool {
    let quality = connection_quality(network);
    let use_cache = matches!(quality, ConnectionQuality::Slow | ConnectionQuality::Medium);
    debug!(?quality, use_cache, "Evaluated cache policy");
    use_cache
}
