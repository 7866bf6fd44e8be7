//! Delivery format of a bar.

use candlestream_aggregate::{Bar, BarStatus, BarUpdate};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A bar as sent to subscribers.
///
/// Decimals travel as strings so no precision is lost; `timestamp` is the
/// bucket start in RFC 3339 UTC.
///
/// ```json
/// {"symbol":"BTCUSDT","open":"100.0","high":"102.5","low":"100.0",
///  "close":"102.5","volume":"1.5","timestamp":"2024-01-01T12:00:00Z","complete":true}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireBar {
    /// Instrument identifier.
    pub symbol: String,
    /// Opening price.
    #[serde(with = "rust_decimal::serde::str")]
    pub open: Decimal,
    /// Highest price.
    #[serde(with = "rust_decimal::serde::str")]
    pub high: Decimal,
    /// Lowest price.
    #[serde(with = "rust_decimal::serde::str")]
    pub low: Decimal,
    /// Closing price.
    #[serde(with = "rust_decimal::serde::str")]
    pub close: Decimal,
    /// Traded volume.
    #[serde(with = "rust_decimal::serde::str")]
    pub volume: Decimal,
    /// Bucket start.
    pub timestamp: DateTime<Utc>,
    /// Whether the bar is final.
    pub complete: bool,
}

impl WireBar {
    /// Converts a bar, marking it complete or not.
    #[must_use]
    pub fn from_bar(bar: &Bar, complete: bool) -> Self {
        Self {
            symbol: bar.instrument.clone(),
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.volume,
            timestamp: bar.bucket_start,
            complete,
        }
    }

    /// Returns the status carried by the `complete` flag.
    #[must_use]
    pub const fn status(&self) -> BarStatus {
        if self.complete {
            BarStatus::Complete
        } else {
            BarStatus::Open
        }
    }
}

impl From<&BarUpdate> for WireBar {
    fn from(update: &BarUpdate) -> Self {
        Self::from_bar(&update.bar, update.is_complete())
    }
}

impl From<BarUpdate> for WireBar {
    fn from(update: BarUpdate) -> Self {
        Self::from(&update)
    }
}
