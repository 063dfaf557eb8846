//! Session lifecycle: connect, inbound message, pong, close, error.

use murmur_auth::Identity;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::broadcast::{BroadcastEngine, FanOutReport};
use crate::connection::{create_connection, Connection, ConnectionReceiver};
use crate::error::RealtimeError;
use crate::message::{InboundMessage, Message, MessageDraft};
use crate::registry::ConnectionRegistry;

/// Events a transport task feeds into the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// One inbound text payload.
    Frame(String),
    /// Answer to a liveness probe.
    Pong,
    /// The peer closed the transport.
    Closed,
    /// The transport failed.
    Failed(String),
}

/// Whether the transport should keep running after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Keep reading.
    Open,
    /// Stop; the connection has been unregistered.
    Closed,
}

/// Orchestrates registry, store and broadcast for each session.
#[derive(Debug)]
pub struct SessionController {
    registry: Arc<ConnectionRegistry>,
    engine: Arc<BroadcastEngine>,
    total_connections: AtomicU64,
    malformed_messages: AtomicU64,
}

impl SessionController {
    /// Create a controller.
    pub fn new(registry: Arc<ConnectionRegistry>, engine: Arc<BroadcastEngine>) -> Self {
        Self {
            registry,
            engine,
            total_connections: AtomicU64::new(0),
            malformed_messages: AtomicU64::new(0),
        }
    }

    /// Open a session: register, replay history, mark alive.
    pub fn on_connect(
        &self,
        identity: Option<Identity>,
    ) -> Result<(Arc<Connection>, ConnectionReceiver), RealtimeError> {
        let (connection, receiver) = create_connection(identity);
        let replayed = self.engine.admit(&connection)?;
        connection.mark_alive();
        self.total_connections.fetch_add(1, Ordering::Relaxed);

        info!(
            client_id = %connection.id,
            identity = connection.identity_id().unwrap_or("anonymous"),
            replayed,
            "Session opened"
        );
        Ok((connection, receiver))
    }

    /// Decode, stamp, append and fan out one inbound payload.
    ///
    /// Malformed payloads are dropped without closing the session; the
    /// sender gets no broadcast and no error frame.
    pub fn on_message(
        &self,
        connection: &Connection,
        payload: &str,
    ) -> Result<Arc<Message>, RealtimeError> {
        if !self.registry.contains(&connection.id) {
            return Err(RealtimeError::ConnectionNotFound(connection.id.clone()));
        }

        let draft = InboundMessage::decode(payload)
            .and_then(|inbound| inbound.into_draft(connection.identity.as_ref()))
            .inspect_err(|e| {
                self.malformed_messages.fetch_add(1, Ordering::Relaxed);
                debug!(client_id = %connection.id, error = %e, "Inbound message dropped");
            })?;

        let (message, _) = self.engine.publish(draft);
        Ok(message)
    }

    /// Publish a message that did not come from a live session.
    pub fn submit(&self, draft: MessageDraft) -> (Arc<Message>, FanOutReport) {
        debug!(sender = %draft.sender, "Administrative submit");
        self.engine.publish(draft)
    }

    /// Record a probe answer.
    pub fn on_pong(&self, connection_id: &str) -> bool {
        self.registry.mark_alive(connection_id)
    }

    /// Close a session. Safe to call more than once.
    pub fn on_close(&self, connection_id: &str) -> bool {
        match self.registry.remove(connection_id) {
            Some(connection) => {
                connection.close();
                info!(client_id = %connection_id, "Session closed");
                true
            }
            None => false,
        }
    }

    /// Close a session after a transport error.
    pub fn on_error(&self, connection_id: &str, error: &str) -> bool {
        warn!(client_id = %connection_id, error = %error, "Session transport error");
        self.on_close(connection_id)
    }

    /// Dispatch one transport event.
    pub fn handle(&self, connection: &Connection, event: SessionEvent) -> SessionState {
        match event {
            SessionEvent::Frame(payload) => match self.on_message(connection, &payload) {
                Err(RealtimeError::ConnectionNotFound(_)) => SessionState::Closed,
                Err(e) if e.is_fatal() => {
                    tracing::error!(error = %e, "Fatal relay error");
                    SessionState::Closed
                }
                _ => SessionState::Open,
            },
            SessionEvent::Pong => {
                if self.on_pong(&connection.id) {
                    SessionState::Open
                } else {
                    SessionState::Closed
                }
            }
            SessionEvent::Closed => {
                self.on_close(&connection.id);
                SessionState::Closed
            }
            SessionEvent::Failed(error) => {
                self.on_error(&connection.id, &error);
                SessionState::Closed
            }
        }
    }

    /// Sessions opened since start.
    pub fn total_connections(&self) -> u64 {
        self.total_connections.load(Ordering::Relaxed)
    }

    /// Inbound payloads dropped as malformed since start.
    pub fn malformed_messages(&self) -> u64 {
        self.malformed_messages.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Outbound;
    use crate::store::MessageStore;

    fn controller() -> (SessionController, Arc<ConnectionRegistry>, Arc<MessageStore>) {
        let registry = Arc::new(ConnectionRegistry::new());
        let store = Arc::new(MessageStore::new());
        let engine = Arc::new(BroadcastEngine::new(registry.clone(), store.clone()));
        (
            SessionController::new(registry.clone(), engine),
            registry,
            store,
        )
    }

    fn messages(rx: &mut ConnectionReceiver) -> Vec<Arc<Message>> {
        let mut out = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            if let Outbound::Message(m) = frame {
                out.push(m);
            }
        }
        out
    }

    #[test]
    fn test_connect_registers_alive() {
        let (controller, registry, _store) = controller();
        let (conn, _rx) = controller.on_connect(None).unwrap();

        assert!(registry.contains(&conn.id));
        assert!(conn.is_alive());
        assert_eq!(controller.total_connections(), 1);
    }

    #[test]
    fn test_message_is_broadcast_with_server_timestamp() {
        let (controller, _registry, store) = controller();
        let (a, mut ra) = controller.on_connect(None).unwrap();
        let (_b, mut rb) = controller.on_connect(None).unwrap();

        let message = controller
            .on_message(&a, r#"{"sender":"u1","content":"hi","timestamp":1}"#)
            .unwrap();
        assert_ne!(message.timestamp, 1);
        assert_eq!(store.len(), 1);

        let got_a = messages(&mut ra);
        let got_b = messages(&mut rb);
        assert_eq!(got_a, vec![message.clone()]);
        assert_eq!(got_b, vec![message]);
    }

    #[test]
    fn test_malformed_message_keeps_session_open() {
        let (controller, registry, store) = controller();
        let (a, mut ra) = controller.on_connect(None).unwrap();

        let state = controller.handle(&a, SessionEvent::Frame("{nope".into()));
        assert_eq!(state, SessionState::Open);
        assert!(registry.contains(&a.id));
        assert!(store.is_empty());
        assert!(ra.try_recv().is_err());
        assert_eq!(controller.malformed_messages(), 1);
    }

    #[test]
    fn test_authenticated_sender_is_scoped() {
        let (controller, _registry, _store) = controller();
        let alice = Identity::new("alice", "Alice").with_avatar("https://img/alice.png");
        let (a, _ra) = controller.on_connect(Some(alice)).unwrap();

        let message = controller
            .on_message(&a, r#"{"sender":"bob","content":"hi"}"#)
            .unwrap();
        assert_eq!(message.sender, "alice");
        assert_eq!(message.attachment.as_deref(), Some("https://img/alice.png"));
    }

    #[test]
    fn test_pong_marks_alive() {
        let (controller, _registry, _store) = controller();
        let (a, _ra) = controller.on_connect(None).unwrap();
        a.mark_dead();

        assert_eq!(controller.handle(&a, SessionEvent::Pong), SessionState::Open);
        assert!(a.is_alive());
    }

    #[test]
    fn test_close_is_idempotent() {
        let (controller, registry, _store) = controller();
        let (a, mut ra) = controller.on_connect(None).unwrap();

        assert!(controller.on_close(&a.id));
        assert!(!controller.on_close(&a.id));
        assert_eq!(
            controller.handle(&a, SessionEvent::Closed),
            SessionState::Closed
        );
        assert!(!registry.contains(&a.id));
        assert!(matches!(ra.try_recv(), Ok(Outbound::Close)));
    }

    #[test]
    fn test_error_closes_only_that_session() {
        let (controller, registry, _store) = controller();
        let (a, _ra) = controller.on_connect(None).unwrap();
        let (b, mut rb) = controller.on_connect(None).unwrap();

        let state = controller.handle(&a, SessionEvent::Failed("reset by peer".into()));
        assert_eq!(state, SessionState::Closed);
        assert!(registry.contains(&b.id));

        controller.submit(MessageDraft::new("admin", "still here"));
        assert_eq!(messages(&mut rb).len(), 1);
    }

    #[test]
    fn test_message_from_evicted_session_is_refused() {
        let (controller, registry, store) = controller();
        let (a, _ra) = controller.on_connect(None).unwrap();
        registry.remove(&a.id);

        let state = controller.handle(
            &a,
            SessionEvent::Frame(r#"{"sender":"u1","content":"late"}"#.into()),
        );
        assert_eq!(state, SessionState::Closed);
        assert!(store.is_empty());
    }

    #[test]
    fn test_submit_shares_publish_path() {
        let (controller, _registry, store) = controller();
        let (_a, mut ra) = controller.on_connect(None).unwrap();

        let (message, report) = controller.submit(MessageDraft::new("admin", "notice"));
        assert_eq!(report.delivered, 1);
        assert_eq!(store.snapshot(), vec![message.clone()]);
        assert_eq!(messages(&mut ra), vec![message]);
    }
}
