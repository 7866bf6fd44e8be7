//! Streaming trade-to-bar aggregation.

use std::collections::HashMap;

use candlestream_types::{Interval, RawTrade, Trade};
use chrono::{DateTime, TimeDelta, Utc};
use rust_decimal::Decimal;

use crate::{Bar, IngestError};

/// How the engine treats a trade whose bucket precedes the instrument's
/// last-seen bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LatePolicy {
    /// Treat any bucket change as a rollover: the open bar completes and a
    /// new bar opens at the late trade's bucket. Buckets at or before the
    /// latest completed bar are still refused.
    #[default]
    Rollover,
    /// Refuse the trade with [`IngestError::LateTrade`].
    Reject,
}

/// Outcome of a successfully ingested trade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ingested {
    /// The bar the trade was folded into, after the update.
    pub snapshot: Bar,
    /// The previous bar of the same instrument, if this trade closed it.
    pub completed: Option<Bar>,
}

/// Per-engine counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Trades folded into a bar.
    pub accepted: u64,
    /// Trades dropped (parse failures, late or closed-bucket trades).
    pub rejected: u64,
    /// Bars handed out as complete (rollover, idle sweep, drain).
    pub completed: u64,
}

/// Streaming multi-instrument bar aggregator.
///
/// Holds at most one open bar per instrument. A bar completes when a later
/// trade for the same instrument maps to a different bucket, when the idle
/// sweep finds it expired, or when the engine is drained.
#[derive(Debug)]
pub struct BarAggregator {
    interval: Interval,
    late_policy: LatePolicy,
    instruments: HashMap<String, InstrumentState>,
    stats: EngineStats,
}

impl BarAggregator {
    /// Creates an empty aggregator for the given interval.
    #[must_use]
    pub fn new(interval: Interval) -> Self {
        Self {
            interval,
            late_policy: LatePolicy::default(),
            instruments: HashMap::new(),
            stats: EngineStats::default(),
        }
    }

    /// Sets the late-trade policy.
    #[must_use]
    pub fn with_late_policy(mut self, policy: LatePolicy) -> Self {
        self.late_policy = policy;
        self
    }

    /// Returns the bucket width.
    #[must_use]
    pub const fn interval(&self) -> Interval {
        self.interval
    }

    /// Returns the late-trade policy.
    #[must_use]
    pub const fn late_policy(&self) -> LatePolicy {
        self.late_policy
    }

    /// Returns the engine counters.
    #[must_use]
    pub const fn stats(&self) -> EngineStats {
        self.stats
    }

    /// Parses and processes a wire record.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Parse`] for malformed input, or the errors of
    /// [`Self::process_trade`]. Engine state is untouched on error.
    pub fn process(&mut self, raw: &RawTrade) -> Result<Ingested, IngestError> {
        match Trade::parse(raw) {
            Ok(trade) => self.process_trade(trade),
            Err(e) => {
                self.stats.rejected += 1;
                Err(e.into())
            }
        }
    }

    /// Processes a parsed trade.
    ///
    /// Returns the updated bar and, when this trade moved the instrument to a
    /// new bucket, the bar that just completed.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::LateTrade`] under [`LatePolicy::Reject`],
    /// [`IngestError::BucketClosed`] when the bucket is at or before the
    /// instrument's latest completed bar, and [`IngestError::Overflow`] when
    /// the bar's volume cannot absorb the trade.
    pub fn process_trade(&mut self, trade: Trade) -> Result<Ingested, IngestError> {
        let result = self.apply(trade);
        match &result {
            Ok(ingested) => {
                self.stats.accepted += 1;
                if ingested.completed.is_some() {
                    self.stats.completed += 1;
                }
            }
            Err(_) => self.stats.rejected += 1,
        }
        result
    }

    fn apply(&mut self, trade: Trade) -> Result<Ingested, IngestError> {
        trade.validate()?;
        let bucket = self.interval.bucket_start(trade.event_time);
        let late_policy = self.late_policy;

        if let Some(state) = self.instruments.get_mut(&trade.instrument) {
            return state.advance(&trade, bucket, late_policy);
        }

        let builder = BarBuilder::new(bucket, &trade);
        let snapshot = builder.snapshot();
        self.instruments.insert(
            trade.instrument,
            InstrumentState {
                last_bucket: bucket,
                closed_through: None,
                open: Some(builder),
            },
        );
        Ok(Ingested {
            snapshot,
            completed: None,
        })
    }

    /// Completes every open bar whose bucket ended at least `grace` before
    /// `now`.
    ///
    /// A straggler for a swept bucket is refused with
    /// [`IngestError::BucketClosed`]. A bucket whose deadline is past the
    /// representable range never expires.
    pub fn flush_idle(&mut self, now: DateTime<Utc>, grace: TimeDelta) -> Vec<Bar> {
        let interval = self.interval;
        let flushed = self.take_open(|builder| {
            interval
                .bucket_end(builder.bucket_start)
                .and_then(|end| end.checked_add_signed(grace))
                .is_some_and(|deadline| deadline <= now)
        });
        self.stats.completed += flushed.len() as u64;
        flushed
    }

    /// Completes every open bar.
    pub fn drain(&mut self) -> Vec<Bar> {
        let drained = self.take_open(|_| true);
        self.stats.completed += drained.len() as u64;
        drained
    }

    /// Removes matching open bars, ordered by `(bucket_start, instrument)`.
    fn take_open(&mut self, mut expired: impl FnMut(&BarBuilder) -> bool) -> Vec<Bar> {
        let mut bars: Vec<Bar> = self
            .instruments
            .values_mut()
            .filter_map(|state| {
                if state.open.as_ref().is_some_and(&mut expired) {
                    state.close()
                } else {
                    None
                }
            })
            .collect();
        bars.sort_by(|a, b| {
            a.bucket_start
                .cmp(&b.bucket_start)
                .then_with(|| a.instrument.cmp(&b.instrument))
        });
        bars
    }

    /// Returns a snapshot of the instrument's open bar.
    #[must_use]
    pub fn open_bar(&self, instrument: &str) -> Option<Bar> {
        self.instruments
            .get(instrument)
            .and_then(|state| state.open.as_ref())
            .map(BarBuilder::snapshot)
    }

    /// Returns the number of open bars.
    #[must_use]
    pub fn open_bars(&self) -> usize {
        self.instruments
            .values()
            .filter(|state| state.open.is_some())
            .count()
    }

    /// Returns every instrument the engine has seen.
    pub fn instruments(&self) -> impl Iterator<Item = &str> {
        self.instruments.keys().map(String::as_str)
    }
}

/// What the engine remembers about one instrument.
#[derive(Debug)]
struct InstrumentState {
    last_bucket: DateTime<Utc>,
    /// Latest bucket whose bar has been handed out. Nothing at or before it
    /// may open again, so each bar completes at most once.
    closed_through: Option<DateTime<Utc>>,
    open: Option<BarBuilder>,
}

impl InstrumentState {
    fn advance(
        &mut self,
        trade: &Trade,
        bucket: DateTime<Utc>,
        late_policy: LatePolicy,
    ) -> Result<Ingested, IngestError> {
        if let Some(builder) = self.open.as_mut().filter(|b| b.bucket_start == bucket) {
            builder.update(trade)?;
            return Ok(Ingested {
                snapshot: builder.snapshot(),
                completed: None,
            });
        }

        if self.closed_through.is_some_and(|closed| bucket <= closed) {
            return Err(IngestError::BucketClosed {
                instrument: trade.instrument.clone(),
                bucket,
            });
        }

        if bucket < self.last_bucket && late_policy == LatePolicy::Reject {
            return Err(IngestError::LateTrade {
                instrument: trade.instrument.clone(),
                bucket,
                current: self.last_bucket,
            });
        }

        let completed = self.close();
        let builder = BarBuilder::new(bucket, trade);
        let snapshot = builder.snapshot();
        self.last_bucket = bucket;
        self.open = Some(builder);
        Ok(Ingested {
            snapshot,
            completed,
        })
    }

    /// Completes the open bar and raises the closed mark to its bucket.
    fn close(&mut self) -> Option<Bar> {
        let bar = self.open.take()?.finish();
        self.closed_through = self.closed_through.max(Some(bar.bucket_start));
        Some(bar)
    }
}

/// Accumulator for the bar being built.
#[derive(Debug)]
struct BarBuilder {
    instrument: String,
    bucket_start: DateTime<Utc>,
    open: Decimal,
    high: Decimal,
    low: Decimal,
    close: Decimal,
    volume: Decimal,
    trade_count: u64,
}

impl BarBuilder {
    /// Creates a new builder from the first trade.
    fn new(bucket_start: DateTime<Utc>, trade: &Trade) -> Self {
        Self {
            instrument: trade.instrument.clone(),
            bucket_start,
            open: trade.price,
            high: trade.price,
            low: trade.price,
            close: trade.price,
            volume: trade.quantity,
            trade_count: 1,
        }
    }

    /// Folds a trade into the bar. On overflow the bar is left untouched.
    fn update(&mut self, trade: &Trade) -> Result<(), IngestError> {
        let volume =
            self.volume
                .checked_add(trade.quantity)
                .ok_or_else(|| IngestError::Overflow {
                    instrument: self.instrument.clone(),
                    bucket: self.bucket_start,
                })?;
        self.high = self.high.max(trade.price);
        self.low = self.low.min(trade.price);
        self.close = trade.price;
        self.volume = volume;
        self.trade_count += 1;
        Ok(())
    }

    fn snapshot(&self) -> Bar {
        Bar {
            instrument: self.instrument.clone(),
            bucket_start: self.bucket_start,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
            trade_count: self.trade_count,
        }
    }

    fn finish(self) -> Bar {
        Bar {
            instrument: self.instrument,
            bucket_start: self.bucket_start,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
            trade_count: self.trade_count,
        }
    }
}
