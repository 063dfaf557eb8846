//! Live client connections.

use murmur_auth::Identity;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::error::RealtimeError;
use crate::message::{now_millis, Message};

/// Unique identifier for a connection.
pub type ConnectionId = String;

/// What the transport task is asked to do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Deliver a broadcast or replayed message.
    Message(Arc<Message>),
    /// Send a liveness probe.
    Ping,
    /// Close the transport.
    Close,
}

/// Liveness state, as seen by the heartbeat supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    /// Answered the last probe, or none was sent yet.
    Alive,
    /// A probe is outstanding.
    AwaitingPong,
    /// Closed; no further delivery.
    Closed,
}

/// One client session.
#[derive(Debug)]
pub struct Connection {
    /// Unique connection identifier.
    pub id: ConnectionId,
    /// Verified identity, if the session authenticated.
    pub identity: Option<Identity>,
    /// When the connection was created (ms since epoch).
    pub connected_at: i64,
    sender: mpsc::UnboundedSender<Outbound>,
    alive: AtomicBool,
    closed: AtomicBool,
}

impl Connection {
    /// Create a connection around an outbound sender.
    pub fn new(
        id: ConnectionId,
        identity: Option<Identity>,
        sender: mpsc::UnboundedSender<Outbound>,
    ) -> Self {
        Self {
            id,
            identity,
            connected_at: now_millis(),
            sender,
            alive: AtomicBool::new(true),
            closed: AtomicBool::new(false),
        }
    }

    /// Queue a frame for the transport.
    pub fn deliver(&self, frame: Outbound) -> Result<(), RealtimeError> {
        if !self.is_open() {
            return Err(RealtimeError::DeliveryFailure(self.id.clone()));
        }
        self.sender
            .send(frame)
            .map_err(|_| RealtimeError::DeliveryFailure(self.id.clone()))
    }

    /// Whether the transport still accepts frames.
    pub fn is_open(&self) -> bool {
        !self.closed.load(Ordering::Acquire) && !self.sender.is_closed()
    }

    /// Ask the transport to close. Safe to call more than once.
    ///
    /// Returns `true` only for the call that actually closed the connection.
    pub fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        let _ = self.sender.send(Outbound::Close);
        true
    }

    /// Mark the connection as having answered a probe.
    pub fn mark_alive(&self) {
        self.alive.store(true, Ordering::Release);
    }

    /// Mark a probe as outstanding.
    pub fn mark_dead(&self) {
        self.alive.store(false, Ordering::Release);
    }

    /// Clear the alive flag, returning its previous value.
    pub(crate) fn take_alive(&self) -> bool {
        self.alive.swap(false, Ordering::AcqRel)
    }

    /// Whether the last probe was answered.
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Current liveness state.
    pub fn liveness(&self) -> Liveness {
        if !self.is_open() {
            Liveness::Closed
        } else if self.is_alive() {
            Liveness::Alive
        } else {
            Liveness::AwaitingPong
        }
    }

    /// Sender identity id, if authenticated.
    pub fn identity_id(&self) -> Option<&str> {
        self.identity.as_ref().map(|i| i.id.as_str())
    }
}

/// Handle the transport task drains.
pub type ConnectionReceiver = mpsc::UnboundedReceiver<Outbound>;

/// Create a connection with a fresh id and its receiver.
pub fn create_connection(identity: Option<Identity>) -> (Arc<Connection>, ConnectionReceiver) {
    create_connection_with_id(uuid::Uuid::new_v4().to_string(), identity)
}

/// Create a connection with the given id and its receiver.
pub fn create_connection_with_id(
    id: ConnectionId,
    identity: Option<Identity>,
) -> (Arc<Connection>, ConnectionReceiver) {
    let (sender, receiver) = mpsc::unbounded_channel();
    let connection = Arc::new(Connection::new(id, identity, sender));
    (connection, receiver)
}
