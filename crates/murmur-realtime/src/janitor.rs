//! Periodic history clearing.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::heartbeat::MIN_TIMER_INTERVAL;
use crate::store::MessageStore;

/// Default clear period.
pub const DEFAULT_HISTORY_CLEAR_INTERVAL: Duration = Duration::from_millis(1_800_000);

/// Empties the message store on a fixed period.
#[derive(Debug)]
pub struct HistoryJanitor {
    store: Arc<MessageStore>,
    interval: Duration,
    total_clears: AtomicU64,
}

impl HistoryJanitor {
    /// Create a janitor with the default period.
    pub fn new(store: Arc<MessageStore>) -> Self {
        Self::with_interval(store, DEFAULT_HISTORY_CLEAR_INTERVAL)
    }

    /// Create a janitor with a custom period.
    pub fn with_interval(store: Arc<MessageStore>, interval: Duration) -> Self {
        Self {
            store,
            interval: interval.max(MIN_TIMER_INTERVAL),
            total_clears: AtomicU64::new(0),
        }
    }

    /// Clear period.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Clears performed since start.
    pub fn total_clears(&self) -> u64 {
        self.total_clears.load(Ordering::Relaxed)
    }

    /// Clear the store once.
    pub fn run_once(&self) {
        let dropped = self.store.clear();
        self.total_clears.fetch_add(1, Ordering::Relaxed);
        info!(dropped, "History cleared");
    }

    /// Run the janitor until `shutdown` is cancelled.
    ///
    /// The first clear happens one period after start.
    pub fn spawn(self: Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => self.run_once(),
                }
            }
            debug!("History janitor stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageDraft;

    #[test]
    fn test_run_once_clears() {
        let store = Arc::new(MessageStore::new());
        store.append(MessageDraft::new("u1", "hi"));

        let janitor = HistoryJanitor::new(store.clone());
        janitor.run_once();
        janitor.run_once();

        assert!(store.is_empty());
        assert_eq!(janitor.total_clears(), 2);

        store.append(MessageDraft::new("u1", "after"));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_janitor_clears_each_period() {
        let store = Arc::new(MessageStore::new());
        let period = Duration::from_secs(60);
        let janitor = Arc::new(HistoryJanitor::with_interval(store.clone(), period));
        let shutdown = CancellationToken::new();
        let handle = janitor.clone().spawn(shutdown.clone());

        store.append(MessageDraft::new("u1", "m1"));
        time::sleep(period / 2).await;
        assert_eq!(store.len(), 1);

        time::sleep(period).await;
        assert!(store.is_empty());
        assert_eq!(janitor.total_clears(), 1);

        shutdown.cancel();
        handle.await.unwrap();

        store.append(MessageDraft::new("u1", "kept"));
        time::sleep(period * 3).await;
        assert_eq!(store.len(), 1);
        assert_eq!(janitor.total_clears(), 1);
    }
}
