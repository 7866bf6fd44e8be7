//! Source error types.

use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Errors raised by trade sources.
#[derive(Error, Debug)]
pub enum SourceError {
    /// The websocket handshake failed.
    #[error("Failed to connect to {url}: {source}")]
    Connect {
        /// Endpoint that was dialed.
        url: String,
        /// Underlying websocket error.
        #[source]
        source: Box<tungstenite::Error>,
    },

    /// The websocket failed after the connection was established.
    #[error("WebSocket error: {0}")]
    Websocket(#[source] Box<tungstenite::Error>),

    /// A frame or replay line could not be decoded.
    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// I/O error while reading a replay file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<tungstenite::Error> for SourceError {
    fn from(err: tungstenite::Error) -> Self {
        Self::Websocket(Box::new(err))
    }
}
