//! Liveness supervision.
//!
//! Every period each connection is probed. A connection that has not
//! answered the previous probe by the next tick is closed and evicted, so an
//! unresponsive peer is gone after one to two periods.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::connection::{ConnectionId, Outbound};
use crate::error::RealtimeError;
use crate::registry::ConnectionRegistry;

/// Default probe period.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(30_000);

/// Shortest period accepted by the relay timers. Shorter periods are raised to it.
pub const MIN_TIMER_INTERVAL: Duration = Duration::from_millis(1);

/// Outcome of one supervision cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Connections sent a fresh probe.
    pub probed: usize,
    /// Connections evicted this cycle.
    pub evicted: Vec<ConnectionId>,
}

/// Periodically probes every registered connection.
#[derive(Debug)]
pub struct HeartbeatSupervisor {
    registry: Arc<ConnectionRegistry>,
    interval: Duration,
    total_evictions: AtomicU64,
}

impl HeartbeatSupervisor {
    /// Create a supervisor with the default period.
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self::with_interval(registry, DEFAULT_HEARTBEAT_INTERVAL)
    }

    /// Create a supervisor with a custom period.
    pub fn with_interval(registry: Arc<ConnectionRegistry>, interval: Duration) -> Self {
        Self {
            registry,
            interval: interval.max(MIN_TIMER_INTERVAL),
            total_evictions: AtomicU64::new(0),
        }
    }

    /// Probe period.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Connections evicted since start.
    pub fn total_evictions(&self) -> u64 {
        self.total_evictions.load(Ordering::Relaxed)
    }

    /// Run one supervision cycle.
    pub fn sweep(&self) -> SweepReport {
        let mut report = SweepReport::default();

        self.registry.for_each(|connection| {
            let failure = if !connection.take_alive() {
                Some(RealtimeError::ProbeTimeout(connection.id.clone()))
            } else {
                match connection.deliver(Outbound::Ping) {
                    Ok(()) => {
                        report.probed += 1;
                        None
                    }
                    Err(e) => Some(e),
                }
            };

            if let Some(reason) = failure {
                connection.close();
                if self.registry.remove(&connection.id).is_some() {
                    info!(client_id = %connection.id, reason = %reason, "Connection evicted");
                    self.total_evictions.fetch_add(1, Ordering::Relaxed);
                    report.evicted.push(connection.id.clone());
                }
            }
        });

        if !report.evicted.is_empty() {
            warn!(evicted = report.evicted.len(), "Heartbeat evicted unresponsive connections");
        }
        debug!(probed = report.probed, "Heartbeat sweep complete");
        report
    }

    /// Run the supervisor until `shutdown` is cancelled.
    ///
    /// The first sweep happens one period after start.
    pub fn spawn(self: Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        self.sweep();
                    }
                }
            }
            debug!("Heartbeat supervisor stopped");
        })
    }
}
