//! Streams bars to TCP clients as newline-delimited JSON.

use std::net::SocketAddr;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::{DeliveryHub, NdjsonSink, RelayError};

/// NDJSON-over-TCP delivery endpoint.
///
/// Every accepted connection receives each bar published after it connected,
/// one JSON object per line. The stream ends when the hub closes or the client
/// hangs up.
#[derive(Debug)]
pub struct StreamServer {
    listener: TcpListener,
    hub: DeliveryHub,
}

impl StreamServer {
    /// Binds the listening socket.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Bind`] if the address is unavailable.
    pub async fn bind(addr: SocketAddr, hub: DeliveryHub) -> Result<Self, RelayError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| RelayError::Bind {
                addr: addr.to_string(),
                source,
            })?;
        Ok(Self { listener, hub })
    }

    /// Returns the bound address.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Io`] if the socket has no local address.
    pub fn local_addr(&self) -> Result<SocketAddr, RelayError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts connections until `shutdown` fires, then waits for open
    /// connections to finish. Connections end when the hub closes, so close
    /// the hub first for a prompt shutdown. Returns the number of connections
    /// served.
    ///
    /// # Errors
    ///
    /// Never fails once bound; accept errors are logged and retried.
    pub async fn serve(self, shutdown: CancellationToken) -> Result<u64, RelayError> {
        let tracker = TaskTracker::new();
        let mut served = 0u64;
        tracing::info!(addr = ?self.listener.local_addr().ok(), "Stream server listening");

        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((socket, peer)) => {
                        served += 1;
                        tracker.spawn(serve_connection(socket, peer, self.hub.clone()));
                    }
                    Err(e) => tracing::warn!(error = %e, "Accept failed"),
                },
            }
        }

        tracker.close();
        tracker.wait().await;
        tracing::info!(served, "Stream server stopped");
        Ok(served)
    }
}

async fn serve_connection(socket: TcpStream, peer: SocketAddr, hub: DeliveryHub) {
    if let Err(e) = socket.set_nodelay(true) {
        tracing::debug!(peer = %peer, error = %e, "Failed to set TCP_NODELAY");
    }
    let (reader, writer) = socket.into_split();
    let handle = hub.attach(NdjsonSink::new(writer));
    let id = handle.id();
    let abort = handle.abort_handle();
    tracing::info!(peer = %peer, consumer_id = %id, "Client connected");

    tokio::select! {
        result = handle.wait() => match result {
            Ok(sent) => tracing::info!(peer = %peer, consumer_id = %id, sent, "Stream complete"),
            Err(e) => tracing::warn!(peer = %peer, consumer_id = %id, error = %e, "Stream failed"),
        },
        () = until_eof(reader) => {
            abort.abort();
            tracing::info!(peer = %peer, consumer_id = %id, "Client disconnected");
        }
    }
}

/// Resolves once the peer closes its side of the connection. Anything the
/// client sends is ignored.
async fn until_eof<R: AsyncRead + Unpin>(mut reader: R) {
    let mut buf = [0u8; 256];
    while matches!(reader.read(&mut buf).await, Ok(n) if n > 0) {}
}
