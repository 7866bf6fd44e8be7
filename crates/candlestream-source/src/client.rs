//! Websocket client for the Binance aggregated-trade stream.

use candlestream_types::RawTrade;
use futures::{SinkExt, Stream, StreamExt, stream};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;

use crate::{SourceError, decode_frame, url};

/// Configuration for the trade stream client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Websocket endpoint, without the `/stream` path.
    pub base_url: String,
    /// Instruments to subscribe to.
    pub symbols: Vec<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: url::DEFAULT_BASE_URL.to_string(),
            symbols: vec!["btcusdt".to_string()],
        }
    }
}

/// Streaming client that forwards decoded trades into a channel.
///
/// One client runs one connection; when the exchange closes it the client
/// returns and the trade channel closes with it. Frames that fail to decode
/// are logged and skipped.
#[derive(Debug, Clone)]
pub struct TradeClient {
    config: ClientConfig,
}

impl TradeClient {
    /// Creates a new client.
    #[must_use]
    pub const fn new(config: ClientConfig) -> Self {
        Self { config }
    }

    /// Returns the client configuration.
    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns the combined stream URL this client dials.
    #[must_use]
    pub fn url(&self) -> String {
        url::stream_url(&self.config.base_url, &self.config.symbols)
    }

    /// Streams trades into `tx` until the server closes the connection,
    /// `shutdown` fires, or the receiver is dropped. Returns the number of
    /// trades forwarded.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Connect`] if the connection cannot be opened
    /// and [`SourceError::Websocket`] if it fails mid-stream.
    pub async fn run(
        &self,
        tx: mpsc::Sender<RawTrade>,
        shutdown: CancellationToken,
    ) -> Result<u64, SourceError> {
        let url = self.url();
        let (ws_stream, _) = connect_async(url.as_str())
            .await
            .map_err(|e| SourceError::Connect {
                url: url.clone(),
                source: Box::new(e),
            })?;
        tracing::info!(url = %url, symbols = ?self.config.symbols, "Connected to trade stream");

        let (mut write, mut read) = ws_stream.split();
        let mut forwarded = 0u64;

        loop {
            let message = tokio::select! {
                () = shutdown.cancelled() => {
                    let _ = write.send(Message::Close(None)).await;
                    break;
                }
                message = read.next() => message,
            };

            let Some(message) = message else {
                tracing::warn!(url = %url, "Trade stream ended");
                break;
            };

            let text = match message? {
                Message::Text(text) => text.as_str().to_owned(),
                Message::Binary(data) => match String::from_utf8(data.to_vec()) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!(error = %e, "Skipping non UTF-8 binary frame");
                        continue;
                    }
                },
                Message::Ping(payload) => {
                    write.send(Message::Pong(payload)).await?;
                    continue;
                }
                Message::Close(frame) => {
                    tracing::warn!(url = %url, ?frame, "Trade stream closed by server");
                    break;
                }
                _ => continue,
            };

            match decode_frame(&text) {
                Ok(Some(trade)) => {
                    if tx.send(trade).await.is_err() {
                        break;
                    }
                    forwarded += 1;
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(error = %e, frame = %text, "Skipping undecodable frame"),
            }
        }

        tracing::info!(forwarded, "Trade stream finished");
        Ok(forwarded)
    }
}

/// Adapts the receiving end of a trade channel into a [`Stream`].
pub fn receiver_stream(rx: mpsc::Receiver<RawTrade>) -> impl Stream<Item = RawTrade> {
    stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|trade| (trade, rx)) })
}
