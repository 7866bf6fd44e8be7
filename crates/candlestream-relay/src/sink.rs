//! Subscriber sinks.

use async_trait::async_trait;
use candlestream_format::WireBar;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use crate::TransportError;

/// Destination of one subscriber's bars.
#[async_trait]
pub trait BarSink: Send {
    /// Delivers one bar.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if the subscriber can no longer receive;
    /// the subscriber is then detached.
    async fn send(&mut self, bar: &WireBar) -> Result<(), TransportError>;

    /// Called once after the last bar.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if the sink cannot be closed cleanly.
    async fn finish(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Writes one JSON object per line.
#[derive(Debug)]
pub struct NdjsonSink<W> {
    writer: W,
    line: Vec<u8>,
}

impl<W> NdjsonSink<W> {
    /// Wraps a writer.
    pub const fn new(writer: W) -> Self {
        Self {
            writer,
            line: Vec::new(),
        }
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[async_trait]
impl<W> BarSink for NdjsonSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn send(&mut self, bar: &WireBar) -> Result<(), TransportError> {
        self.line.clear();
        serde_json::to_writer(&mut self.line, bar)?;
        self.line.push(b'\n');
        self.writer.write_all(&self.line).await?;
        self.writer.flush().await?;
        Ok(())
    }

    async fn finish(&mut self) -> Result<(), TransportError> {
        self.writer.shutdown().await?;
        Ok(())
    }
}

/// Forwards bars into an in-process channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<WireBar>,
}

impl ChannelSink {
    /// Creates a sink and the receiver that observes it.
    #[must_use]
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<WireBar>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl From<mpsc::Sender<WireBar>> for ChannelSink {
    fn from(tx: mpsc::Sender<WireBar>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl BarSink for ChannelSink {
    async fn send(&mut self, bar: &WireBar) -> Result<(), TransportError> {
        self.tx
            .send(bar.clone())
            .await
            .map_err(|_| TransportError::Closed)
    }
}
