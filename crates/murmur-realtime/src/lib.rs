//! # Murmur Real-time
//!
//! The relay core: every connected client receives every message, plus a
//! replay of recent history when it joins.
//!
//! ## Components
//!
//! - **Message Store**: append-only history, cleared wholesale on a timer
//! - **Connection Registry**: live connections with intrinsic liveness state
//! - **Heartbeat Supervisor**: probes connections, evicts unresponsive ones
//! - **Broadcast Engine**: serialized append + fan-out, history replay on join
//! - **History Janitor**: periodic store clear
//! - **Session Controller**: connect / message / pong / close / error handling
//!
//! ## Example
//!
//! ```rust
//! use murmur_realtime::{Outbound, Relay};
//!
//! let relay = Relay::default();
//! let (alice, _alice_rx) = relay.sessions().on_connect(None).unwrap();
//! let (_bob, mut bob_rx) = relay.sessions().on_connect(None).unwrap();
//!
//! relay
//!     .sessions()
//!     .on_message(&alice, r#"{"sender":"u1","content":"hi"}"#)
//!     .unwrap();
//!
//! match bob_rx.try_recv().unwrap() {
//!     Outbound::Message(message) => assert_eq!(message.content, "hi"),
//!     other => panic!("unexpected frame: {other:?}"),
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                    Relay                     │
//! │                                              │
//! │  SessionController ──► BroadcastEngine       │
//! │         │               │ publish lock       │
//! │         │               ├─► MessageStore     │
//! │         ▼               └─► ConnectionRegistry
//! │  ConnectionRegistry ◄── HeartbeatSupervisor  │
//! │  MessageStore       ◄── HistoryJanitor       │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! Each connection owns an unbounded channel of [`Outbound`] frames that its
//! transport task drains.

pub mod broadcast;
pub mod connection;
pub mod error;
pub mod heartbeat;
pub mod janitor;
pub mod message;
pub mod registry;
pub mod relay;
pub mod session;
pub mod store;

pub use broadcast::{BroadcastEngine, FanOutReport};
pub use connection::{
    create_connection, create_connection_with_id, Connection, ConnectionId, ConnectionReceiver,
    Liveness, Outbound,
};
pub use error::RealtimeError;
pub use heartbeat::{
    HeartbeatSupervisor, SweepReport, DEFAULT_HEARTBEAT_INTERVAL, MIN_TIMER_INTERVAL,
};
pub use janitor::{HistoryJanitor, DEFAULT_HISTORY_CLEAR_INTERVAL};
pub use message::{now_millis, InboundMessage, Message, MessageDraft, MAX_CONTENT_LENGTH};
pub use registry::{ConnectionRegistry, DEFAULT_MAX_CONNECTIONS};
pub use relay::{Relay, RelayConfig, RelayStats, RelayTasks};
pub use session::{SessionController, SessionEvent, SessionState};
pub use store::MessageStore;
