//! Bounded, order-preserving hand-off from the engine to delivery.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use candlestream_aggregate::BarUpdate;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::RelayError;

/// Default completion channel capacity.
pub const DEFAULT_CAPACITY: usize = 1024;

/// What `publish` does when the channel is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OverflowPolicy {
    /// Wait for capacity, slowing the producer down.
    #[default]
    Block,
    /// Never wait; discard the update and count it.
    DropNewest,
}

/// Creates a completion channel holding at most `capacity` updates.
///
/// A capacity of zero is raised to one.
#[must_use]
pub fn channel(capacity: usize, policy: OverflowPolicy) -> (CompletionSender, CompletionReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let sender = CompletionSender {
        tx,
        policy,
        dropped: Arc::new(AtomicU64::new(0)),
    };
    (sender, CompletionReceiver { rx })
}

/// Producer half of the completion channel.
///
/// Dropping every sender closes the channel.
#[derive(Debug, Clone)]
pub struct CompletionSender {
    tx: mpsc::Sender<BarUpdate>,
    policy: OverflowPolicy,
    dropped: Arc<AtomicU64>,
}

impl CompletionSender {
    /// Publishes an update.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::ChannelClosed`] when the receiver is gone.
    pub async fn publish(&self, update: BarUpdate) -> Result<(), RelayError> {
        match self.policy {
            OverflowPolicy::Block => self
                .tx
                .send(update)
                .await
                .map_err(|_| RelayError::ChannelClosed),
            OverflowPolicy::DropNewest => match self.tx.try_send(update) {
                Ok(()) => Ok(()),
                Err(TrySendError::Full(update)) => {
                    let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                    tracing::warn!(
                        symbol = %update.bar.instrument,
                        bucket = %update.bar.bucket_start,
                        dropped,
                        "Completion channel full, dropping update"
                    );
                    Ok(())
                }
                Err(TrySendError::Closed(_)) => Err(RelayError::ChannelClosed),
            },
        }
    }

    /// Returns the overflow policy.
    #[must_use]
    pub const fn policy(&self) -> OverflowPolicy {
        self.policy
    }

    /// Returns how many updates were discarded because the channel was full.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Returns true if the receiver is gone.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer half of the completion channel.
#[derive(Debug)]
pub struct CompletionReceiver {
    rx: mpsc::Receiver<BarUpdate>,
}

impl CompletionReceiver {
    /// Receives the next update, in publish order.
    ///
    /// Returns `None` once every sender is dropped and the buffer is empty.
    pub async fn recv(&mut self) -> Option<BarUpdate> {
        self.rx.recv().await
    }

    /// Returns the number of buffered updates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Returns true if no update is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
