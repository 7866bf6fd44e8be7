//! Display utilities and output formatting for the candlestream CLI.

use anyhow::{Context, Result};
use candlestream_lib::{CsvFormatter, Formatter, OutputFormat, TimestampStyle, WireBar};
use clap::ValueEnum;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Output format for aggregated bars.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub(crate) enum Format {
    Csv,
    Json,
    Ndjson,
}

impl From<Format> for OutputFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Csv => Self::Csv,
            Format::Json => Self::Json,
            Format::Ndjson => Self::Ndjson,
        }
    }
}

/// Picks the formatter; `timestamps` only affects CSV.
fn formatter(format: Format, timestamps: TimestampStyle) -> Box<dyn Formatter> {
    match format {
        Format::Csv => Box::new(CsvFormatter::new().with_timestamps(timestamps)),
        other => OutputFormat::from(other).formatter(),
    }
}

/// Write bars to `output`, or to stdout when no path is given.
pub(crate) fn write_bars(
    bars: &[WireBar],
    output: Option<&Path>,
    format: Format,
    timestamps: TimestampStyle,
) -> Result<()> {
    let formatter = formatter(format, timestamps);

    match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            let mut writer = BufWriter::new(file);
            formatter.write_bars(bars, &mut writer)?;
            writer.flush()?;
        }
        None => {
            let mut writer = std::io::stdout().lock();
            formatter.write_bars(bars, &mut writer)?;
            writer.flush()?;
        }
    }

    Ok(())
}

/// One human-readable line per bar.
pub(crate) fn bar_line(bar: &WireBar) -> String {
    format!(
        "{} {:<10} o={} h={} l={} c={} v={}{}",
        bar.timestamp.format("%Y-%m-%d %H:%M:%S"),
        bar.symbol,
        bar.open,
        bar.high,
        bar.low,
        bar.close,
        bar.volume,
        if bar.complete { "" } else { " (open)" },
    )
}
