//! Lock-guarded aggregator for multi-producer setups.

use std::sync::Arc;

use candlestream_types::{Interval, RawTrade};
use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;

use crate::{Bar, BarAggregator, EngineStats, IngestError, Ingested};

/// A [`BarAggregator`] that can be cloned across tasks.
///
/// Every call holds the lock for the whole map, so updates to one
/// instrument's bar are never interleaved.
#[derive(Debug, Clone)]
pub struct SharedAggregator {
    inner: Arc<Mutex<BarAggregator>>,
}

impl SharedAggregator {
    /// Wraps an aggregator.
    #[must_use]
    pub fn new(aggregator: BarAggregator) -> Self {
        Self {
            inner: Arc::new(Mutex::new(aggregator)),
        }
    }

    /// Returns the bucket width.
    #[must_use]
    pub fn interval(&self) -> Interval {
        self.inner.lock().interval()
    }

    /// See [`BarAggregator::process`].
    ///
    /// # Errors
    ///
    /// Returns an [`IngestError`] if the trade is refused.
    pub fn process(&self, raw: &RawTrade) -> Result<Ingested, IngestError> {
        self.inner.lock().process(raw)
    }

    /// See [`BarAggregator::flush_idle`].
    #[must_use]
    pub fn flush_idle(&self, now: DateTime<Utc>, grace: TimeDelta) -> Vec<Bar> {
        self.inner.lock().flush_idle(now, grace)
    }

    /// See [`BarAggregator::drain`].
    #[must_use]
    pub fn drain(&self) -> Vec<Bar> {
        self.inner.lock().drain()
    }

    /// See [`BarAggregator::open_bar`].
    #[must_use]
    pub fn open_bar(&self, instrument: &str) -> Option<Bar> {
        self.inner.lock().open_bar(instrument)
    }

    /// Returns the engine counters.
    #[must_use]
    pub fn stats(&self) -> EngineStats {
        self.inner.lock().stats()
    }
}

impl From<BarAggregator> for SharedAggregator {
    fn from(aggregator: BarAggregator) -> Self {
        Self::new(aggregator)
    }
}
