//! Candlestick bar data structure.

use candlestream_types::Interval;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One candlestick: the summary of an instrument's trades inside one bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bar {
    /// Instrument identifier.
    pub instrument: String,
    /// Bucket start time, aligned to the engine interval.
    pub bucket_start: DateTime<Utc>,
    /// Price of the first trade in the bucket.
    pub open: Decimal,
    /// Highest trade price in the bucket.
    pub high: Decimal,
    /// Lowest trade price in the bucket.
    pub low: Decimal,
    /// Price of the most recent trade in the bucket.
    pub close: Decimal,
    /// Sum of traded quantities, opening trade included.
    pub volume: Decimal,
    /// Number of trades folded into the bar.
    pub trade_count: u64,
}

impl Bar {
    /// Returns the `(instrument, bucket_start)` pair identifying this bar.
    #[must_use]
    pub fn key(&self) -> (&str, DateTime<Utc>) {
        (&self.instrument, self.bucket_start)
    }

    /// Returns the exclusive end of this bar's bucket, if representable.
    #[must_use]
    pub fn bucket_end(&self, interval: Interval) -> Option<DateTime<Utc>> {
        interval.bucket_end(self.bucket_start)
    }

    /// Returns the price range (high - low).
    #[must_use]
    pub fn range(&self) -> Decimal {
        self.high - self.low
    }

    /// Returns the body size (|close - open|).
    #[must_use]
    pub fn body(&self) -> Decimal {
        (self.close - self.open).abs()
    }

    /// Returns true if this is a bullish (green) bar.
    #[must_use]
    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    /// Returns true if this is a bearish (red) bar.
    #[must_use]
    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }

    /// Returns the typical price ((high + low + close) / 3).
    #[must_use]
    pub fn typical_price(&self) -> Decimal {
        (self.high + self.low + self.close) / Decimal::from(3)
    }
}

/// Whether a published bar can still change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BarStatus {
    /// The bucket is still accumulating trades.
    Open,
    /// The bucket is closed; the bar is final.
    Complete,
}

/// A bar together with its completion status, as delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarUpdate {
    /// The bar values at the time of publishing.
    pub bar: Bar,
    /// Whether the bar is final.
    pub status: BarStatus,
}

impl BarUpdate {
    /// Wraps a bar whose bucket has closed.
    #[must_use]
    pub const fn complete(bar: Bar) -> Self {
        Self {
            bar,
            status: BarStatus::Complete,
        }
    }

    /// Wraps a snapshot of a bar that is still open.
    #[must_use]
    pub const fn open(bar: Bar) -> Self {
        Self {
            bar,
            status: BarStatus::Open,
        }
    }

    /// Returns true if the bar is final.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        matches!(self.status, BarStatus::Complete)
    }
}
