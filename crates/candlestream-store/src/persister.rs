//! Subscriber that writes bars to a store.

use candlestream_relay::Subscription;

use crate::BarStore;

/// Counters reported when a persister stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersistStats {
    /// Updates received from the hub.
    pub received: u64,
    /// Bars upserted.
    pub written: u64,
    /// Open snapshots ignored because only complete bars are kept.
    pub skipped: u64,
    /// Upserts that failed.
    pub failed: u64,
    /// Updates lost because the subscription fell behind the hub.
    pub lagged: u64,
}

/// Upserts every bar a subscription delivers.
///
/// Open snapshots are persisted too unless
/// [`with_complete_only`](Self::with_complete_only) is set; because writes are
/// upserts, the final values of a bucket overwrite its earlier snapshots.
#[derive(Debug)]
pub struct Persister<S> {
    store: S,
    complete_only: bool,
}

impl<S: BarStore> Persister<S> {
    /// Creates a persister writing to `store`.
    #[must_use]
    pub const fn new(store: S) -> Self {
        Self {
            store,
            complete_only: false,
        }
    }

    /// Only write complete bars.
    #[must_use]
    pub const fn with_complete_only(mut self, complete_only: bool) -> Self {
        self.complete_only = complete_only;
        self
    }

    /// Returns the underlying store.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Persists updates until the subscription ends.
    ///
    /// A failed write is logged and the persister moves on to the next bar.
    pub async fn run(&self, mut subscription: Subscription) -> PersistStats {
        let consumer_id = subscription.id();
        let mut stats = PersistStats::default();

        while let Some(update) = subscription.recv().await {
            stats.received += 1;
            if self.complete_only && !update.is_complete() {
                stats.skipped += 1;
                continue;
            }

            match self.store.upsert(&update.bar).await {
                Ok(()) => {
                    stats.written += 1;
                    tracing::debug!(
                        symbol = %update.bar.instrument,
                        bucket = %update.bar.bucket_start,
                        complete = update.is_complete(),
                        "Bar persisted"
                    );
                }
                Err(e) => {
                    stats.failed += 1;
                    tracing::error!(
                        %consumer_id,
                        symbol = %update.bar.instrument,
                        bucket = %update.bar.bucket_start,
                        error = %e,
                        "Failed to persist bar"
                    );
                }
            }
        }

        stats.lagged = subscription.lagged();
        if stats.lagged > 0 {
            tracing::warn!(%consumer_id, lagged = stats.lagged, "Persister missed bars");
        }
        tracing::info!(
            %consumer_id,
            written = stats.written,
            failed = stats.failed,
            lagged = stats.lagged,
            "Persister finished"
        );
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemoryStore, PersistenceError, Result};
    use async_trait::async_trait;
    use candlestream_aggregate::{Bar, BarUpdate};
    use candlestream_relay::{DeliveryHub, HubConfig, OverflowPolicy, completion};
    use chrono::{DateTime, TimeZone, Utc};
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn create_test_bar(instrument: &str, minute: u32) -> Bar {
        Bar {
            instrument: instrument.to_string(),
            bucket_start: Utc.with_ymd_and_hms(2024, 1, 1, 12, minute, 0).unwrap(),
            open: dec!(100.0),
            high: dec!(102.5),
            low: dec!(100.0),
            close: dec!(102.5),
            volume: dec!(1.5),
            trade_count: 2,
        }
    }

    /// Feeds `updates` through a hub into a persister.
    async fn run_through_hub<S>(persister: &Persister<S>, updates: Vec<BarUpdate>) -> PersistStats
    where
        S: BarStore,
    {
        let hub = DeliveryHub::with_defaults();
        let subscription = hub.subscribe();
        let (tx, rx) = completion::channel(16, OverflowPolicy::Block);

        let hub_task = {
            let hub = hub.clone();
            tokio::spawn(async move { hub.run(rx).await })
        };
        for update in updates {
            tx.publish(update).await.unwrap();
        }
        drop(tx);

        let stats = persister.run(subscription).await;
        hub_task.await.unwrap();
        stats
    }

    #[tokio::test]
    async fn test_persists_every_update_by_default() {
        let store = Arc::new(MemoryStore::new());
        let persister = Persister::new(Arc::clone(&store));

        let open = create_test_bar("BTCUSDT", 0);
        let complete = Bar {
            close: dec!(101),
            ..open.clone()
        };
        let updates = vec![
            BarUpdate::open(open.clone()),
            BarUpdate::complete(complete.clone()),
            BarUpdate::complete(create_test_bar("ETHUSDT", 0)),
        ];

        let stats = run_through_hub(&persister, updates).await;
        assert_eq!(stats.received, 3);
        assert_eq!(stats.written, 3);
        assert_eq!(store.len(), 2);
        assert_eq!(
            store.get("BTCUSDT", open.bucket_start).await.unwrap(),
            Some(complete)
        );
    }

    #[tokio::test]
    async fn test_complete_only_skips_snapshots() {
        let store = Arc::new(MemoryStore::new());
        let persister = Persister::new(Arc::clone(&store)).with_complete_only(true);

        let updates = vec![
            BarUpdate::open(create_test_bar("BTCUSDT", 0)),
            BarUpdate::open(create_test_bar("BTCUSDT", 0)),
            BarUpdate::complete(create_test_bar("BTCUSDT", 0)),
        ];

        let stats = run_through_hub(&persister, updates).await;
        assert_eq!(stats.skipped, 2);
        assert_eq!(stats.written, 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_lagging_subscription_is_counted() {
        let hub = DeliveryHub::new(HubConfig { capacity: 2 });
        let subscription = hub.subscribe();
        let (tx, rx) = completion::channel(16, OverflowPolicy::Block);
        for minute in 0..5 {
            tx.publish(BarUpdate::complete(create_test_bar("BTCUSDT", minute)))
                .await
                .unwrap();
        }
        drop(tx);
        // Everything reaches the hub before the persister reads anything.
        assert_eq!(hub.run(rx).await, 5);

        let store = Arc::new(MemoryStore::new());
        let stats = Persister::new(Arc::clone(&store)).run(subscription).await;
        assert_eq!(stats.lagged, 3);
        assert_eq!(stats.received, 2);
        assert_eq!(stats.written, 2);

        let minutes: Vec<_> = store
            .list("BTCUSDT")
            .await
            .unwrap()
            .iter()
            .map(|bar| bar.bucket_start)
            .collect();
        assert_eq!(
            minutes,
            vec![
                create_test_bar("BTCUSDT", 3).bucket_start,
                create_test_bar("BTCUSDT", 4).bucket_start
            ]
        );
    }

    #[derive(Debug, Default)]
    struct RejectEth {
        inner: MemoryStore,
    }

    #[async_trait]
    impl BarStore for RejectEth {
        async fn upsert(&self, bar: &Bar) -> Result<()> {
            if bar.instrument == "ETHUSDT" {
                return Err(PersistenceError::InvalidInstrument(bar.instrument.clone()));
            }
            self.inner.upsert(bar).await
        }

        async fn get(&self, instrument: &str, bucket_start: DateTime<Utc>) -> Result<Option<Bar>> {
            self.inner.get(instrument, bucket_start).await
        }

        async fn list(&self, instrument: &str) -> Result<Vec<Bar>> {
            self.inner.list(instrument).await
        }
    }

    #[tokio::test]
    async fn test_failed_write_does_not_stop_persister() {
        let persister = Persister::new(RejectEth::default());
        let updates = vec![
            BarUpdate::complete(create_test_bar("BTCUSDT", 0)),
            BarUpdate::complete(create_test_bar("ETHUSDT", 0)),
            BarUpdate::complete(create_test_bar("BTCUSDT", 1)),
        ];

        let stats = run_through_hub(&persister, updates).await;
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.written, 2);
        assert_eq!(persister.store().list("BTCUSDT").await.unwrap().len(), 2);
    }
}
