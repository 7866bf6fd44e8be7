//! Replay command implementation.
//!
//! Aggregates a recorded NDJSON trade file offline. Produces the same bars the
//! live pipeline would have produced for the same trades in the same order.

use std::path::PathBuf;

use anyhow::{Context, Result};
use candlestream_lib::{
    BarAggregator, BarStore, DeliveryMode, FileStore, IngestConfig, Ingestor, Interval,
    LatePolicy, OverflowPolicy, TimestampStyle, WireBar, completion, open_replay,
};
use clap::Args;
use tokio_util::sync::CancellationToken;

use crate::display::{Format, write_bars};
use crate::telemetry;

/// Options for `candlestream replay`.
#[derive(Debug, Args)]
pub(crate) struct ReplayArgs {
    /// NDJSON file of aggTrade payloads or combined-stream frames
    input: PathBuf,

    /// Bar interval (s1, m1, m5, m15, m30, h1, h4, d1)
    #[arg(short, long, env = "CANDLESTREAM_INTERVAL", default_value = "m1")]
    interval: Interval,

    /// Output file path. Defaults to stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "csv")]
    format: Format,

    /// Write CSV timestamps as Unix milliseconds
    #[arg(long)]
    epoch_millis: bool,

    /// Include a snapshot of the open bar after every trade
    #[arg(long)]
    live: bool,

    /// Reject trades older than the open bucket instead of rolling back
    #[arg(long)]
    reject_late: bool,

    /// Also upsert complete bars into a file store at this directory
    #[arg(long, env = "CANDLESTREAM_STORE_DIR")]
    store_dir: Option<PathBuf>,
}

/// Aggregate a trade file and write the resulting bars.
pub(crate) async fn replay(args: ReplayArgs, quiet: bool) -> Result<()> {
    let trades = open_replay(&args.input)
        .await
        .with_context(|| format!("Failed to open {}", args.input.display()))?;

    let (sender, mut receiver) =
        completion::channel(completion::DEFAULT_CAPACITY, OverflowPolicy::Block);
    let collector = tokio::spawn(async move {
        let mut updates = Vec::new();
        while let Some(update) = receiver.recv().await {
            updates.push(update);
        }
        updates
    });

    let late_policy = if args.reject_late {
        LatePolicy::Reject
    } else {
        LatePolicy::Rollover
    };
    let config = IngestConfig {
        mode: if args.live {
            DeliveryMode::Live
        } else {
            DeliveryMode::Completed
        },
        idle: None,
    };
    let ingestor = Ingestor::new(
        BarAggregator::new(args.interval).with_late_policy(late_policy),
        sender,
        config,
    );

    // Ctrl+C stops reading and flushes what has been aggregated so far.
    let shutdown = CancellationToken::new();
    tokio::spawn(telemetry::shutdown_on_signal(shutdown.clone()));
    let report = ingestor
        .run(trades, shutdown.clone())
        .await
        .context("Replay failed")?;
    shutdown.cancel();
    let updates = collector.await?;

    if let Some(dir) = &args.store_dir {
        let store = FileStore::new(dir)
            .with_context(|| format!("Failed to open store at {}", dir.display()))?;
        let mut written = 0usize;
        for update in updates.iter().filter(|u| u.is_complete()) {
            store
                .upsert(&update.bar)
                .await
                .with_context(|| format!("Failed to store bar for {}", update.bar.instrument))?;
            written += 1;
        }
        tracing::info!(written, path = %dir.display(), "Bars stored");
    }

    let bars: Vec<WireBar> = updates.iter().map(WireBar::from).collect();
    let timestamps = if args.epoch_millis {
        TimestampStyle::EpochMillis
    } else {
        TimestampStyle::Rfc3339
    };
    write_bars(&bars, args.output.as_deref(), args.format, timestamps)?;

    if !quiet {
        tracing::info!(
            trades = report.received,
            rejected = report.rejected,
            bars = report.completed,
            "Replay complete"
        );
    }
    if let Some(output) = &args.output {
        tracing::info!(path = %output.display(), "Output written");
    }

    Ok(())
}
