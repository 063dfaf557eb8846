//! Fan-out of messages to every registered connection.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::connection::{Connection, ConnectionId, Outbound};
use crate::error::RealtimeError;
use crate::message::{Message, MessageDraft};
use crate::registry::ConnectionRegistry;
use crate::store::MessageStore;

/// Outcome of one fan-out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FanOutReport {
    /// Connections the message was queued for.
    pub delivered: usize,
    /// Connections dropped because delivery failed.
    pub dropped: Vec<ConnectionId>,
}

/// Delivers messages to every registered connection and replays history to
/// newcomers.
///
/// Append and fan-out happen under one publish lock, so for any two messages
/// every receiver sees them in append order. Admission takes the same lock,
/// so a newcomer's replay never overlaps or skips a live broadcast.
#[derive(Debug)]
pub struct BroadcastEngine {
    registry: Arc<ConnectionRegistry>,
    store: Arc<MessageStore>,
    publish_lock: Mutex<()>,
    total_messages: AtomicU64,
    dropped_deliveries: AtomicU64,
}

impl BroadcastEngine {
    /// Create an engine over a registry and a store.
    pub fn new(registry: Arc<ConnectionRegistry>, store: Arc<MessageStore>) -> Self {
        Self {
            registry,
            store,
            publish_lock: Mutex::new(()),
            total_messages: AtomicU64::new(0),
            dropped_deliveries: AtomicU64::new(0),
        }
    }

    /// Append a draft to the store and fan it out, as one step.
    pub fn publish(&self, draft: MessageDraft) -> (Arc<Message>, FanOutReport) {
        let _guard = self.publish_lock.lock();
        let message = self.store.append(draft);
        let report = self.fan_out(&message);
        self.total_messages.fetch_add(1, Ordering::Relaxed);
        (message, report)
    }

    /// Deliver a message to every registered, open connection.
    ///
    /// A connection whose delivery fails is removed; the others still
    /// receive the message.
    pub fn fan_out(&self, message: &Arc<Message>) -> FanOutReport {
        let mut report = FanOutReport::default();

        self.registry.for_each(|connection| {
            if !connection.is_open() {
                self.drop_connection(connection, &mut report);
                return;
            }
            match connection.deliver(Outbound::Message(message.clone())) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    warn!(client_id = %connection.id, error = %e, "Delivery failed");
                    self.drop_connection(connection, &mut report);
                }
            }
        });

        debug!(
            sender = %message.sender,
            recipients = report.delivered,
            dropped = report.dropped.len(),
            "Message broadcast"
        );
        report
    }

    /// Register a connection and replay the current history to it alone.
    pub fn admit(&self, connection: &Arc<Connection>) -> Result<usize, RealtimeError> {
        let _guard = self.publish_lock.lock();
        self.registry.add(connection.clone())?;
        match self.replay_history(connection) {
            Ok(replayed) => Ok(replayed),
            Err(e) => {
                self.registry.remove(&connection.id);
                Err(e)
            }
        }
    }

    /// Deliver the store snapshot to one connection, oldest first.
    pub fn replay_history(&self, connection: &Connection) -> Result<usize, RealtimeError> {
        let snapshot = self.store.snapshot();
        let count = snapshot.len();
        for message in snapshot {
            connection.deliver(Outbound::Message(message))?;
        }

        if count > 0 {
            debug!(client_id = %connection.id, messages = count, "History replayed");
        }
        Ok(count)
    }

    /// Messages published since start.
    pub fn total_messages(&self) -> u64 {
        self.total_messages.load(Ordering::Relaxed)
    }

    /// Connections dropped after a failed delivery since start.
    pub fn dropped_deliveries(&self) -> u64 {
        self.dropped_deliveries.load(Ordering::Relaxed)
    }

    fn drop_connection(&self, connection: &Arc<Connection>, report: &mut FanOutReport) {
        connection.close();
        if self.registry.remove(&connection.id).is_some() {
            self.dropped_deliveries.fetch_add(1, Ordering::Relaxed);
            report.dropped.push(connection.id.clone());
        }
    }
}
