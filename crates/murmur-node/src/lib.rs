//! # Murmur Node
//!
//! HTTP and WebSocket server for the Murmur fan-out relay.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │                   Murmur Node                    │
//! ├──────────────────────────────────────────────────┤
//! │  HTTP API                                        │
//! │  • GET  /ws                  WebSocket sessions  │
//! │  • POST /api/messages        administrative send │
//! │  • GET  /api/messages        buffered history    │
//! │  • GET  /api/realtime/stats  relay statistics    │
//! │  • GET  /health                                  │
//! ├──────────────────────────────────────────────────┤
//! │  murmur-auth      credential -> identity         │
//! │  murmur-realtime  registry, fan-out, heartbeat,  │
//! │                   history, janitor               │
//! └──────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! cargo run --bin murmur-node -- --api-addr 127.0.0.1:3000
//! ```
//!
//! ## Example: Creating an AppState
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use murmur_auth::IdentityStore;
//! use murmur_realtime::{Relay, RelayConfig};
//! use murmur_node::api::{create_router, AppState};
//!
//! let state = AppState {
//!     relay: Arc::new(Relay::new(RelayConfig::default())),
//!     identities: Arc::new(IdentityStore::new()),
//!     require_auth: false,
//! };
//! let app = create_router(state);
//! ```

pub mod api;
pub mod config;
pub mod observability;
pub mod realtime_api;
pub mod validation;
