// ABOUTME: Error types for transport connections.
// ABOUTME: Distinguishes bad endpoints, unreachable relays, and rejected handshakes.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("Invalid endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("Endpoint unreachable: {0}")]
    Unreachable(String),

    #[error("Handshake rejected: {0}")]
    HandshakeRejected(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Transport worker closed")]
    WorkerClosed,
}
