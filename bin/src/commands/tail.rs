//! Tail command implementation.
//!
//! Connects to a running `candlestream serve` and prints bars as they arrive.

use std::io::Write;

use anyhow::{Context, Result};
use candlestream_lib::WireBar;
use clap::Args;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

use crate::display::bar_line;
use crate::telemetry;

/// Options for `candlestream tail`.
#[derive(Debug, Args)]
pub(crate) struct TailArgs {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:50051")]
    addr: String,

    /// Only show these instruments (comma separated)
    #[arg(short, long, value_delimiter = ',')]
    symbols: Vec<String>,

    /// Print the raw NDJSON instead of formatted lines
    #[arg(long)]
    json: bool,
}

/// Print bars from a stream server until it closes or a signal arrives.
pub(crate) async fn tail(args: TailArgs) -> Result<()> {
    let socket = TcpStream::connect(&args.addr)
        .await
        .with_context(|| format!("Failed to connect to {}", args.addr))?;
    tracing::info!(addr = %args.addr, "Connected");

    let shutdown = CancellationToken::new();
    tokio::spawn(telemetry::shutdown_on_signal(shutdown.clone()));

    let filter: Vec<String> = args.symbols.iter().map(|s| s.trim().to_uppercase()).collect();
    let mut stdout = std::io::stdout();
    let printed = tokio::select! {
        result = follow(BufReader::new(socket), &filter, args.json, &mut stdout) => result?,
        () = shutdown.cancelled() => 0,
    };
    shutdown.cancel();

    tracing::info!(printed, "Stream closed");
    Ok(())
}

/// Copies bars from `reader` to `out` until end of stream.
///
/// Lines that are not bars are logged and skipped.
async fn follow<R, W>(reader: R, symbols: &[String], json: bool, out: &mut W) -> Result<u64>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = reader.lines();
    let mut printed = 0u64;

    while let Some(line) = lines.next_line().await.context("Connection failed")? {
        let bar: WireBar = match serde_json::from_str(&line) {
            Ok(bar) => bar,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping malformed line");
                continue;
            }
        };
        if !symbols.is_empty() && !symbols.contains(&bar.symbol) {
            continue;
        }

        if json {
            writeln!(out, "{line}")?;
        } else {
            writeln!(out, "{}", bar_line(&bar))?;
        }
        out.flush()?;
        printed += 1;
    }

    Ok(printed)
}
