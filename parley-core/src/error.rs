// ABOUTME: Error type returned by session intents.
// ABOUTME: Wraps transport failures and local validation rejections.

use parley_bus::TransportError;

/// Why an intent was rejected.
///
/// A send issued while disconnected is not an error; see
/// [`Delivery::Dropped`](crate::dispatcher::Delivery::Dropped).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ClientError {
    /// Rejected locally before any network call
    #[error("{0}")]
    Validation(String),

    #[error("connection failed: {0}")]
    Connection(#[from] TransportError),

    #[error("already connected or connecting")]
    AlreadyConnected,

    /// A disconnect was requested while the connect was still in flight
    #[error("connect cancelled by disconnect")]
    Cancelled,

    #[error("session closed")]
    SessionClosed,
}
