//! CSV output format.

use std::io::Write;

use crate::{FormatError, Formatter, WireBar};

const HEADER: &str = "timestamp,symbol,open,high,low,close,volume,complete";

/// How the `timestamp` column renders a bar's bucket start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TimestampStyle {
    /// RFC 3339 UTC, e.g. `2024-01-15T12:30:00Z`.
    #[default]
    Rfc3339,
    /// Unix milliseconds, the unit exchange trade times use.
    EpochMillis,
}

/// Writes bars as CSV, one row per bar in delivery order.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvFormatter {
    timestamps: TimestampStyle,
    headerless: bool,
}

impl CsvFormatter {
    /// Creates a formatter with a header row and RFC 3339 timestamps.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            timestamps: TimestampStyle::Rfc3339,
            headerless: false,
        }
    }

    /// Sets how bucket starts are rendered.
    #[must_use]
    pub const fn with_timestamps(mut self, timestamps: TimestampStyle) -> Self {
        self.timestamps = timestamps;
        self
    }

    /// Omits the header row, for appending to an existing file.
    #[must_use]
    pub const fn without_header(mut self) -> Self {
        self.headerless = true;
        self
    }
}

impl Formatter for CsvFormatter {
    fn write_bars(&self, bars: &[WireBar], writer: &mut dyn Write) -> Result<(), FormatError> {
        if !self.headerless {
            writeln!(writer, "{HEADER}")?;
        }

        for bar in bars {
            match self.timestamps {
                TimestampStyle::Rfc3339 => {
                    write!(writer, "{}", bar.timestamp.format("%Y-%m-%dT%H:%M:%SZ"))?;
                }
                TimestampStyle::EpochMillis => {
                    write!(writer, "{}", bar.timestamp.timestamp_millis())?;
                }
            }
            writeln!(
                writer,
                ",{},{},{},{},{},{},{}",
                bar.symbol, bar.open, bar.high, bar.low, bar.close, bar.volume, bar.complete
            )?;
        }

        Ok(())
    }

    fn extension(&self) -> &str {
        "csv"
    }
}
