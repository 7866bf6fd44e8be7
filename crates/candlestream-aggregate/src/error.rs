//! Engine error types.

use candlestream_types::ParseError;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Reasons the engine refuses a trade.
///
/// None of these are fatal: the trade is dropped and engine state is left
/// exactly as it was.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IngestError {
    /// The wire record could not be parsed.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// The trade maps to a bucket earlier than the instrument's current one.
    #[error("Late trade for {instrument}: bucket {bucket} precedes {current}")]
    LateTrade {
        /// Instrument identifier.
        instrument: String,
        /// Bucket the trade maps to.
        bucket: DateTime<Utc>,
        /// The instrument's last-seen bucket.
        current: DateTime<Utc>,
    },

    /// The trade maps to a bucket at or before the instrument's latest
    /// completed bar.
    #[error("Bucket {bucket} for {instrument} is already closed")]
    BucketClosed {
        /// Instrument identifier.
        instrument: String,
        /// Bucket the trade maps to.
        bucket: DateTime<Utc>,
    },

    /// Folding the trade in would overflow the bar's volume.
    #[error("Volume overflow for {instrument} in bucket {bucket}")]
    Overflow {
        /// Instrument identifier.
        instrument: String,
        /// Bucket of the open bar.
        bucket: DateTime<Utc>,
    },
}

impl IngestError {
    /// Returns true if the trade itself was malformed.
    #[must_use]
    pub const fn is_parse(&self) -> bool {
        matches!(self, Self::Parse(_))
    }
}
