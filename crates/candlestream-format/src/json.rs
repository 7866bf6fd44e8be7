//! JSON output format.

use std::io::Write;

use crate::{FormatError, Formatter, WireBar};

/// Layout of JSON output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum JsonStyle {
    /// One array holding every bar.
    #[default]
    Array,
    /// One bar per line, the layout subscribers receive.
    Ndjson,
}

/// Writes bars as [`WireBar`] JSON objects.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFormatter {
    style: JsonStyle,
}

impl JsonFormatter {
    /// Creates a formatter with the given layout.
    #[must_use]
    pub const fn new(style: JsonStyle) -> Self {
        Self { style }
    }

    /// Returns the layout.
    #[must_use]
    pub const fn style(&self) -> JsonStyle {
        self.style
    }
}

impl Formatter for JsonFormatter {
    fn write_bars(&self, bars: &[WireBar], writer: &mut dyn Write) -> Result<(), FormatError> {
        match self.style {
            JsonStyle::Array => {
                serde_json::to_writer(&mut *writer, bars)?;
                writeln!(writer)?;
            }
            JsonStyle::Ndjson => {
                for bar in bars {
                    serde_json::to_writer(&mut *writer, bar)?;
                    writeln!(writer)?;
                }
            }
        }
        Ok(())
    }

    fn extension(&self) -> &str {
        match self.style {
            JsonStyle::Array => "json",
            JsonStyle::Ndjson => "ndjson",
        }
    }
}
