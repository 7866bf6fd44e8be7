//! The ingest loop: trades in, bar updates out.

use std::pin::pin;
use std::time::Duration;

use candlestream_aggregate::{Bar, BarAggregator, BarUpdate};
use candlestream_types::RawTrade;
use chrono::{DateTime, TimeDelta, Utc};
use futures::{Stream, StreamExt};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::{CompletionSender, DeliveryMode, RelayError};

/// Periodic sweep that completes bars whose bucket ended a while ago.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdleFlush {
    /// How often to sweep.
    pub every: Duration,
    /// How long after its bucket ends a bar may still receive trades.
    pub grace: Duration,
}

impl IdleFlush {
    /// Returns the grace period as a [`TimeDelta`].
    fn grace_delta(&self) -> TimeDelta {
        TimeDelta::from_std(self.grace).unwrap_or(TimeDelta::MAX)
    }
}

/// Ingest pipeline options.
#[derive(Debug, Clone, Copy, Default)]
pub struct IngestConfig {
    /// Whether open snapshots are published too.
    pub mode: DeliveryMode,
    /// Idle sweep; `None` disables it and bars only complete on rollover.
    pub idle: Option<IdleFlush>,
}

/// Counters reported when the ingest loop ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Trades seen.
    pub received: u64,
    /// Trades folded into a bar.
    pub accepted: u64,
    /// Trades dropped by the engine.
    pub rejected: u64,
    /// Complete bars published.
    pub completed: u64,
    /// Open snapshots published.
    pub snapshots: u64,
    /// Updates discarded because the completion channel was full.
    pub dropped: u64,
}

/// Owns the engine and publishes what it produces.
#[derive(Debug)]
pub struct Ingestor {
    aggregator: BarAggregator,
    sender: CompletionSender,
    config: IngestConfig,
    report: IngestReport,
}

impl Ingestor {
    /// Creates an ingestor.
    #[must_use]
    pub fn new(aggregator: BarAggregator, sender: CompletionSender, config: IngestConfig) -> Self {
        Self {
            aggregator,
            sender,
            config,
            report: IngestReport::default(),
        }
    }

    /// Returns the engine.
    #[must_use]
    pub const fn aggregator(&self) -> &BarAggregator {
        &self.aggregator
    }

    /// Returns the counters so far.
    #[must_use]
    pub fn report(&self) -> IngestReport {
        IngestReport {
            dropped: self.sender.dropped(),
            ..self.report
        }
    }

    /// Ingests one trade.
    ///
    /// A bar completed by this trade is published before anything else; in
    /// [`DeliveryMode::Live`] the updated snapshot follows. Returns the
    /// snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Rejected`] if the engine refused the trade and
    /// [`RelayError::ChannelClosed`] if nothing can be published anymore.
    pub async fn ingest(&mut self, raw: &RawTrade) -> Result<Bar, RelayError> {
        self.report.received += 1;
        let ingested = match self.aggregator.process(raw) {
            Ok(ingested) => ingested,
            Err(e) => {
                self.report.rejected += 1;
                return Err(e.into());
            }
        };
        self.report.accepted += 1;

        if let Some(bar) = ingested.completed {
            self.publish_complete(bar).await?;
        }
        if self.config.mode == DeliveryMode::Live {
            self.sender
                .publish(BarUpdate::open(ingested.snapshot.clone()))
                .await?;
            self.report.snapshots += 1;
        }
        Ok(ingested.snapshot)
    }

    /// Publishes every bar the idle sweep considers expired at `now`.
    ///
    /// Returns the number of bars published. Does nothing when no idle sweep
    /// is configured.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::ChannelClosed`] if nothing can be published.
    pub async fn flush_idle(&mut self, now: DateTime<Utc>) -> Result<usize, RelayError> {
        let Some(idle) = self.config.idle else {
            return Ok(0);
        };
        let bars = self.aggregator.flush_idle(now, idle.grace_delta());
        let count = bars.len();
        for bar in bars {
            self.publish_complete(bar).await?;
        }
        if count > 0 {
            tracing::debug!(count, "Idle sweep completed bars");
        }
        Ok(count)
    }

    /// Publishes every open bar, then closes the completion channel.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::ChannelClosed`] if nothing can be published.
    pub async fn finish(mut self) -> Result<IngestReport, RelayError> {
        let bars = self.aggregator.drain();
        let count = bars.len();
        for bar in bars {
            self.publish_complete(bar).await?;
        }
        let report = self.report();
        tracing::info!(
            flushed = count,
            received = report.received,
            accepted = report.accepted,
            rejected = report.rejected,
            completed = report.completed,
            "Ingest finished"
        );
        Ok(report)
    }

    async fn publish_complete(&mut self, bar: Bar) -> Result<(), RelayError> {
        tracing::debug!(
            symbol = %bar.instrument,
            bucket = %bar.bucket_start,
            close = %bar.close,
            volume = %bar.volume,
            "Bar complete"
        );
        self.sender.publish(BarUpdate::complete(bar)).await?;
        self.report.completed += 1;
        Ok(())
    }

    /// Runs until `trades` ends or `shutdown` fires, then flushes open bars.
    ///
    /// Rejected trades are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::ChannelClosed`] if the completion channel closes
    /// underneath the pipeline.
    pub async fn run<S>(
        mut self,
        trades: S,
        shutdown: CancellationToken,
    ) -> Result<IngestReport, RelayError>
    where
        S: Stream<Item = RawTrade>,
    {
        let mut trades = pin!(trades);
        let mut sweep = self.config.idle.map(|idle| {
            let mut ticker = tokio::time::interval(idle.every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticker
        });

        tracing::info!(
            interval = %self.aggregator.interval(),
            mode = ?self.config.mode,
            "Ingest started"
        );

        loop {
            tokio::select! {
                biased;
                () = shutdown.cancelled() => {
                    tracing::info!("Shutdown requested, flushing open bars");
                    break;
                }
                () = next_sweep(&mut sweep) => {
                    self.flush_idle(Utc::now()).await?;
                }
                trade = trades.next() => {
                    let Some(trade) = trade else {
                        tracing::info!("Trade stream ended, flushing open bars");
                        break;
                    };
                    match self.ingest(&trade).await {
                        Ok(_) => {}
                        Err(RelayError::Rejected(e)) if e.is_parse() => {
                            tracing::debug!(symbol = %trade.symbol, error = %e, "Dropping malformed trade");
                        }
                        Err(RelayError::Rejected(e)) => {
                            tracing::warn!(symbol = %trade.symbol, error = %e, "Dropping trade");
                        }
                        Err(e) => return Err(e),
                    }
                }
            }
        }

        self.finish().await
    }
}

async fn next_sweep(sweep: &mut Option<tokio::time::Interval>) {
    match sweep {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::{self, CompletionReceiver, OverflowPolicy};
    use candlestream_aggregate::BarStatus;
    use candlestream_types::Interval;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    const T0: i64 = 1_704_110_400_000;
    const MINUTE: i64 = 60_000;

    fn ingestor(config: IngestConfig) -> (Ingestor, CompletionReceiver) {
        let (tx, rx) = completion::channel(64, OverflowPolicy::Block);
        let ingestor = Ingestor::new(BarAggregator::new(Interval::Minute1), tx, config);
        (ingestor, rx)
    }

    async fn collect(mut rx: CompletionReceiver) -> Vec<BarUpdate> {
        let mut updates = Vec::new();
        while let Some(update) = rx.recv().await {
            updates.push(update);
        }
        updates
    }

    #[tokio::test]
    async fn test_completed_bar_published_before_next_snapshot() {
        let (mut ingestor, rx) = ingestor(IngestConfig::default());

        ingestor
            .ingest(&RawTrade::new("BTCUSDT", "100.0", "1.0", T0))
            .await
            .unwrap();
        assert!(rx.is_empty());

        let snapshot = ingestor
            .ingest(&RawTrade::new("BTCUSDT", "101.0", "2.0", T0 + MINUTE))
            .await
            .unwrap();
        assert_eq!(snapshot.open, dec!(101.0));
        assert_eq!(rx.len(), 1);

        ingestor.finish().await.unwrap();
        let updates = collect(rx).await;
        assert_eq!(updates.len(), 2);
        assert!(updates.iter().all(BarUpdate::is_complete));
        assert_eq!(updates[0].bar.close, dec!(100.0));
        assert_eq!(updates[1].bar.close, dec!(101.0));
    }

    #[tokio::test]
    async fn test_live_mode_publishes_snapshots() {
        let (mut ingestor, rx) = ingestor(IngestConfig {
            mode: DeliveryMode::Live,
            idle: None,
        });

        ingestor
            .ingest(&RawTrade::new("BTCUSDT", "100", "1", T0))
            .await
            .unwrap();
        ingestor
            .ingest(&RawTrade::new("BTCUSDT", "105", "1", T0 + MINUTE))
            .await
            .unwrap();
        let report = ingestor.finish().await.unwrap();

        let statuses: Vec<_> = collect(rx).await.iter().map(|u| u.status).collect();
        assert_eq!(
            statuses,
            vec![
                BarStatus::Open,
                BarStatus::Complete,
                BarStatus::Open,
                BarStatus::Complete
            ]
        );
        assert_eq!(report.snapshots, 2);
        assert_eq!(report.completed, 2);
    }

    #[tokio::test]
    async fn test_rejected_trade_publishes_nothing() {
        let (mut ingestor, rx) = ingestor(IngestConfig::default());

        let err = ingestor
            .ingest(&RawTrade::new("BTCUSDT", "oops", "1", T0))
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::Rejected(_)));
        assert!(!err.is_fatal());
        assert!(rx.is_empty());
        assert_eq!(ingestor.report().rejected, 1);
    }

    #[tokio::test]
    async fn test_run_drains_on_stream_end() {
        let (ingestor, rx) = ingestor(IngestConfig::default());
        let trades = futures::stream::iter(vec![
            RawTrade::new("BTCUSDT", "100", "1", T0),
            RawTrade::new("ETHUSDT", "10", "1", T0),
            RawTrade::new("BTCUSDT", "bad", "1", T0),
            RawTrade::new("BTCUSDT", "101", "1", T0 + MINUTE),
        ]);

        let report = ingestor.run(trades, CancellationToken::new()).await.unwrap();
        assert_eq!(report.received, 4);
        assert_eq!(report.rejected, 1);
        assert_eq!(report.completed, 3);

        let updates = collect(rx).await;
        let keys: Vec<_> = updates
            .iter()
            .map(|u| (u.bar.instrument.as_str(), u.bar.bucket_start.timestamp_millis()))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("BTCUSDT", T0),
                ("ETHUSDT", T0),
                ("BTCUSDT", T0 + MINUTE)
            ]
        );
    }

    #[tokio::test]
    async fn test_run_survives_overflow_and_stragglers() {
        let max = "79228162514264337593543950335";
        let (ingestor, rx) = ingestor(IngestConfig::default());
        let trades = futures::stream::iter(vec![
            RawTrade::new("BTCUSDT", "100", "5", T0),
            RawTrade::new("BTCUSDT", "101", "5", T0 + 1),
            RawTrade::new("ETHUSDT", "10", max, T0),
            RawTrade::new("ETHUSDT", "11", max, T0 + 1),
            RawTrade::new("BTCUSDT", "102", "1", T0 + MINUTE),
            RawTrade::new("BTCUSDT", "90", "0.1", T0 + 2),
            RawTrade::new("BTCUSDT", "103", "1", T0 + MINUTE + 1),
        ]);

        let report = ingestor.run(trades, CancellationToken::new()).await.unwrap();
        assert_eq!(report.received, 7);
        assert_eq!(report.rejected, 2);

        let updates = collect(rx).await;
        let rows: Vec<_> = updates
            .iter()
            .map(|u| {
                (
                    u.bar.instrument.as_str(),
                    u.bar.bucket_start.timestamp_millis(),
                    u.bar.volume,
                )
            })
            .collect();
        assert_eq!(
            rows,
            vec![
                ("BTCUSDT", T0, dec!(10)),
                ("ETHUSDT", T0, Decimal::MAX),
                ("BTCUSDT", T0 + MINUTE, dec!(2)),
            ]
        );
    }

    #[tokio::test]
    async fn test_run_flushes_on_shutdown() {
        let (ingestor, mut rx) = ingestor(IngestConfig::default());
        let shutdown = CancellationToken::new();
        let trades = futures::stream::iter(vec![RawTrade::new("BTCUSDT", "100", "1", T0)])
            .chain(futures::stream::pending());

        let task = tokio::spawn(ingestor.run(trades, shutdown.clone()));
        // Nothing is complete while the stream stays open.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(rx.is_empty());

        shutdown.cancel();
        let report = task.await.unwrap().unwrap();
        assert_eq!(report.completed, 1);
        assert_eq!(rx.recv().await.unwrap().bar.instrument, "BTCUSDT");
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_idle_flush_uses_grace() {
        let (mut ingestor, rx) = ingestor(IngestConfig {
            mode: DeliveryMode::Completed,
            idle: Some(IdleFlush {
                every: Duration::from_secs(1),
                grace: Duration::from_secs(5),
            }),
        });
        ingestor
            .ingest(&RawTrade::new("BTCUSDT", "100", "1", T0))
            .await
            .unwrap();

        let bucket_end = DateTime::from_timestamp_millis(T0 + MINUTE).unwrap();
        assert_eq!(ingestor.flush_idle(bucket_end).await.unwrap(), 0);
        assert_eq!(
            ingestor
                .flush_idle(bucket_end + TimeDelta::seconds(5))
                .await
                .unwrap(),
            1
        );
        assert_eq!(rx.len(), 1);

        // The swept bucket is closed to stragglers.
        let err = ingestor
            .ingest(&RawTrade::new("BTCUSDT", "99", "1", T0 + 1))
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::Rejected(_)));
    }

    #[tokio::test]
    async fn test_closed_channel_is_fatal() {
        let (ingestor, rx) = ingestor(IngestConfig::default());
        drop(rx);
        let trades = futures::stream::iter(vec![
            RawTrade::new("BTCUSDT", "100", "1", T0),
            RawTrade::new("BTCUSDT", "101", "1", T0 + MINUTE),
        ]);

        let result = ingestor.run(trades, CancellationToken::new()).await;
        assert!(matches!(result, Err(RelayError::ChannelClosed)));
    }
}
