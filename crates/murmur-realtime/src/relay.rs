//! The relay: one broadcast domain with its timers.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::broadcast::BroadcastEngine;
use crate::heartbeat::{HeartbeatSupervisor, DEFAULT_HEARTBEAT_INTERVAL, MIN_TIMER_INTERVAL};
use crate::janitor::{HistoryJanitor, DEFAULT_HISTORY_CLEAR_INTERVAL};
use crate::registry::{ConnectionRegistry, DEFAULT_MAX_CONNECTIONS};
use crate::session::SessionController;
use crate::store::MessageStore;

/// Settings consumed by the relay core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    /// Liveness probe period.
    pub heartbeat_interval: Duration,
    /// History clear period.
    pub history_clear_interval: Duration,
    /// Maximum messages replayed to a newcomer.
    pub history_replay_cap: Option<usize>,
    /// Maximum concurrent connections.
    pub max_connections: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            history_clear_interval: DEFAULT_HISTORY_CLEAR_INTERVAL,
            history_replay_cap: None,
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}

/// Relay statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RelayStats {
    /// Current number of connections.
    pub current_connections: usize,
    /// Sessions opened since start.
    pub total_connections: u64,
    /// Messages published since start.
    pub total_messages: u64,
    /// Messages currently buffered for replay.
    pub buffered_messages: usize,
    /// Connections evicted by the heartbeat since start.
    pub total_evictions: u64,
    /// Connections dropped after a failed delivery since start.
    pub dropped_deliveries: u64,
    /// Inbound payloads dropped as malformed since start.
    pub malformed_messages: u64,
    /// History clears since start.
    pub history_clears: u64,
}

/// Owns the store, registry and every component acting on them.
#[derive(Debug)]
pub struct Relay {
    store: Arc<MessageStore>,
    registry: Arc<ConnectionRegistry>,
    engine: Arc<BroadcastEngine>,
    sessions: SessionController,
    heartbeat: Arc<HeartbeatSupervisor>,
    janitor: Arc<HistoryJanitor>,
}

impl Relay {
    /// Build a relay from its settings.
    pub fn new(config: RelayConfig) -> Self {
        let store = Arc::new(MessageStore::with_replay_cap(config.history_replay_cap));
        let registry = Arc::new(ConnectionRegistry::with_capacity(config.max_connections));
        let engine = Arc::new(BroadcastEngine::new(registry.clone(), store.clone()));
        let sessions = SessionController::new(registry.clone(), engine.clone());
        let heartbeat = Arc::new(HeartbeatSupervisor::with_interval(
            registry.clone(),
            config.heartbeat_interval,
        ));
        let janitor = Arc::new(HistoryJanitor::with_interval(
            store.clone(),
            config.history_clear_interval,
        ));

        Self {
            store,
            registry,
            engine,
            sessions,
            heartbeat,
            janitor,
        }
    }

    /// Spawn the heartbeat and janitor tasks.
    ///
    /// Cancelling `cancel` stops both timers, as does [`RelayTasks::shutdown`].
    pub fn start(&self, cancel: &CancellationToken) -> RelayTasks {
        let shutdown = cancel.child_token();
        let heartbeat = self.heartbeat.clone().spawn(shutdown.child_token());
        let janitor = self.janitor.clone().spawn(shutdown.child_token());

        info!(
            heartbeat_ms = self.heartbeat.interval().as_millis() as u64,
            history_clear_ms = self.janitor.interval().as_millis() as u64,
            "Relay timers started"
        );

        RelayTasks {
            shutdown,
            handles: vec![heartbeat, janitor],
        }
    }

    /// Session lifecycle entry points.
    pub fn sessions(&self) -> &SessionController {
        &self.sessions
    }

    /// The message store.
    pub fn store(&self) -> &Arc<MessageStore> {
        &self.store
    }

    /// The connection registry.
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// The heartbeat supervisor.
    pub fn heartbeat(&self) -> &Arc<HeartbeatSupervisor> {
        &self.heartbeat
    }

    /// The history janitor.
    pub fn janitor(&self) -> &Arc<HistoryJanitor> {
        &self.janitor
    }

    /// Current statistics.
    pub fn stats(&self) -> RelayStats {
        RelayStats {
            current_connections: self.registry.len(),
            total_connections: self.sessions.total_connections(),
            total_messages: self.engine.total_messages(),
            buffered_messages: self.store.len(),
            total_evictions: self.heartbeat.total_evictions(),
            dropped_deliveries: self.engine.dropped_deliveries(),
            malformed_messages: self.sessions.malformed_messages(),
            history_clears: self.janitor.total_clears(),
        }
    }
}

impl Default for Relay {
    fn default() -> Self {
        Self::new(RelayConfig::default())
    }
}

/// Running relay timers.
#[derive(Debug)]
pub struct RelayTasks {
    shutdown: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl RelayTasks {
    /// Stop the timers and wait for them to exit.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        for handle in self.handles {
            let _ = handle.await;
        }
        info!("Relay timers stopped");
    }
}
