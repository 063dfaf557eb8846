//! # Observability Module
//!
//! Structured logging for the Murmur node. Connection lifecycle, fan-out and
//! heartbeat events are emitted by `murmur-realtime` as `tracing` events
//! carrying a `client_id` field; this module decides where they go.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use murmur_node::observability::{init_logging, LogFormat};
//!
//! init_logging("info", LogFormat::parse("json"));
//! ```

mod logging;

pub use logging::{init_logging, LogFormat};
