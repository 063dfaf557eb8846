//! Error types for the relay core.

use thiserror::Error;

use crate::connection::ConnectionId;

/// Errors that can occur in relay operations.
#[derive(Debug, Error)]
pub enum RealtimeError {
    /// Inbound payload could not be decoded or is missing required fields.
    #[error("malformed message: {0}")]
    MalformedMessage(String),

    /// Delivery to one connection failed.
    #[error("delivery to connection {0} failed")]
    DeliveryFailure(ConnectionId),

    /// A connection did not answer a liveness probe in time.
    #[error("connection {0} did not answer the liveness probe")]
    ProbeTimeout(ConnectionId),

    /// The message store cannot be used.
    #[error("message store unavailable")]
    StoreUnavailable,

    /// Connection limit reached.
    #[error("connection limit reached: max {0} connections")]
    ConnectionLimit(usize),

    /// Connection not registered.
    #[error("connection not found: {0}")]
    ConnectionNotFound(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RealtimeError {
    /// Whether the error must terminate the process rather than a single session.
    pub fn is_fatal(&self) -> bool {
        matches!(self, RealtimeError::StoreUnavailable)
    }
}
