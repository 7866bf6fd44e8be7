//! Fan-out of bar updates to every subscriber.

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use candlestream_aggregate::BarUpdate;
use candlestream_format::WireBar;
use parking_lot::RwLock;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::{AbortHandle, JoinHandle};
use uuid::Uuid;

use crate::{BarSink, CompletionReceiver, TransportError};

/// Which updates reach subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DeliveryMode {
    /// Only complete bars.
    #[default]
    Completed,
    /// Complete bars plus an open snapshot after every accepted trade.
    Live,
}

/// Configuration for the delivery hub.
#[derive(Debug, Clone, Copy)]
pub struct HubConfig {
    /// Per-subscriber buffer. A subscriber that falls further behind loses
    /// the oldest updates.
    pub capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self { capacity: 1024 }
    }
}

#[derive(Debug)]
struct Shared {
    tx: RwLock<Option<broadcast::Sender<BarUpdate>>>,
    attached: AtomicUsize,
}

/// Broadcast hub between the completion channel and subscribers.
///
/// Subscribers only see updates published after they subscribe. Each has its
/// own bounded buffer, so a slow subscriber never holds the others back.
///
/// # Example
///
/// ```rust
/// use candlestream_relay::{DeliveryHub, HubConfig};
///
/// let hub = DeliveryHub::new(HubConfig::default());
/// let subscription = hub.subscribe();
/// assert_eq!(hub.receiver_count(), 1);
/// # drop(subscription);
/// ```
#[derive(Debug, Clone)]
pub struct DeliveryHub {
    shared: Arc<Shared>,
}

impl DeliveryHub {
    /// Creates a hub.
    #[must_use]
    pub fn new(config: HubConfig) -> Self {
        let (tx, _) = broadcast::channel(config.capacity.max(1));
        Self {
            shared: Arc::new(Shared {
                tx: RwLock::new(Some(tx)),
                attached: AtomicUsize::new(0),
            }),
        }
    }

    /// Creates a hub with default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(HubConfig::default())
    }

    /// Forwards every update from the completion channel to subscribers.
    ///
    /// Returns the number of forwarded updates once the channel closes. The
    /// hub is then closed and every subscription ends after draining its
    /// buffer.
    pub async fn run(&self, mut receiver: CompletionReceiver) -> u64 {
        let Some(tx) = self.shared.tx.read().clone() else {
            return 0;
        };

        let mut forwarded = 0u64;
        while let Some(update) = receiver.recv().await {
            // No subscribers is not an error.
            let _ = tx.send(update);
            forwarded += 1;
        }

        drop(tx);
        self.close();
        tracing::info!(forwarded, "Completion channel closed, delivery hub finished");
        forwarded
    }

    /// Closes the hub; subscriptions end once their buffers are drained.
    pub fn close(&self) {
        self.shared.tx.write().take();
    }

    /// Returns true once the hub has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.tx.read().is_none()
    }

    /// Subscribes to updates published from now on.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        let rx = match self.shared.tx.read().as_ref() {
            Some(tx) => tx.subscribe(),
            None => broadcast::channel(1).1,
        };
        Subscription::new(rx)
    }

    /// Attaches a sink, forwarding every update on its own task.
    ///
    /// A failing sink only ends its own task.
    pub fn attach<S>(&self, sink: S) -> SubscriberHandle
    where
        S: BarSink + 'static,
    {
        let subscription = self.subscribe();
        let id = subscription.id();
        self.shared.attached.fetch_add(1, Ordering::Relaxed);
        let guard = AttachGuard(Arc::clone(&self.shared));

        tracing::info!(consumer_id = %id, "Subscriber attached");
        let task = tokio::spawn(async move {
            let _guard = guard;
            forward(subscription, sink).await
        });
        SubscriberHandle { id, task }
    }

    /// Returns the number of attached sinks still running.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.shared.attached.load(Ordering::Relaxed)
    }

    /// Returns the number of live subscriptions, attached sinks included.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.shared
            .tx
            .read()
            .as_ref()
            .map_or(0, broadcast::Sender::receiver_count)
    }
}

/// Decrements the attached count when a subscriber task ends or is aborted.
struct AttachGuard(Arc<Shared>);

impl Drop for AttachGuard {
    fn drop(&mut self) {
        self.0.attached.fetch_sub(1, Ordering::Relaxed);
    }
}

async fn forward<S>(mut subscription: Subscription, mut sink: S) -> Result<u64, TransportError>
where
    S: BarSink,
{
    let id = subscription.id();
    let mut sent = 0u64;

    while let Some(update) = subscription.recv().await {
        if let Err(e) = sink.send(&WireBar::from(&update)).await {
            tracing::warn!(consumer_id = %id, error = %e, sent, "Subscriber dropped");
            return Err(e);
        }
        sent += 1;
    }

    sink.finish().await?;
    tracing::info!(consumer_id = %id, sent, "Subscriber finished");
    Ok(sent)
}

/// Receiving end of one subscription.
#[derive(Debug)]
pub struct Subscription {
    id: Uuid,
    rx: broadcast::Receiver<BarUpdate>,
    lagged: u64,
}

impl Subscription {
    fn new(rx: broadcast::Receiver<BarUpdate>) -> Self {
        Self {
            id: Uuid::new_v4(),
            rx,
            lagged: 0,
        }
    }

    /// Returns the subscriber identifier used in logs.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Returns how many updates this subscriber missed by falling behind.
    #[must_use]
    pub const fn lagged(&self) -> u64 {
        self.lagged
    }

    /// Receives the next update.
    ///
    /// Lag is logged and skipped over. Returns `None` once the hub is closed
    /// and the buffer is drained.
    pub async fn recv(&mut self) -> Option<BarUpdate> {
        loop {
            match self.rx.recv().await {
                Ok(update) => return Some(update),
                Err(RecvError::Lagged(n)) => {
                    self.lagged += n;
                    tracing::warn!(consumer_id = %self.id, lagged = n, "Subscriber lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

/// Handle to an attached sink's task.
#[derive(Debug)]
pub struct SubscriberHandle {
    id: Uuid,
    task: JoinHandle<Result<u64, TransportError>>,
}

impl SubscriberHandle {
    /// Returns the subscriber identifier.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Detaches the subscriber.
    pub fn abort(&self) {
        self.task.abort();
    }

    /// Returns a handle that can detach the subscriber after
    /// [`wait`](Self::wait) has taken ownership.
    #[must_use]
    pub fn abort_handle(&self) -> AbortHandle {
        self.task.abort_handle()
    }

    /// Returns true once the subscriber task has ended.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits for the subscriber to end, returning the number of bars sent.
    ///
    /// # Errors
    ///
    /// Returns the sink's [`TransportError`], or [`TransportError::Closed`]
    /// if the task was aborted.
    pub async fn wait(self) -> Result<u64, TransportError> {
        self.task.await.unwrap_or(Err(TransportError::Closed))
    }
}
