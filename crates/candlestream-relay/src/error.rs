//! Relay error types.

use candlestream_aggregate::IngestError;
use thiserror::Error;

/// Errors raised while delivering bars to one subscriber.
///
/// Only the failing subscriber is dropped; the engine and other subscribers
/// carry on.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The underlying connection failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The bar could not be encoded.
    #[error("Encode error: {0}")]
    Encode(#[from] serde_json::Error),

    /// The receiving side has gone away.
    #[error("Subscriber closed")]
    Closed,
}

/// Errors raised by the ingest pipeline and the streaming server.
#[derive(Error, Debug)]
pub enum RelayError {
    /// Every completion receiver has been dropped; nothing can be published.
    #[error("Completion channel closed")]
    ChannelClosed,

    /// The engine refused a trade.
    #[error("Trade rejected: {0}")]
    Rejected(#[from] IngestError),

    /// The server could not bind its listening socket.
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        /// Requested listen address.
        addr: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RelayError {
    /// Returns true if the pipeline cannot continue.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !matches!(self, Self::Rejected(_))
    }
}
