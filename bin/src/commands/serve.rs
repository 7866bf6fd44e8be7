//! Serve command implementation.
//!
//! Runs the live pipeline: websocket trades feed the aggregation engine, whose
//! bars fan out to TCP subscribers and, optionally, a file store.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use candlestream_lib::{
    BarAggregator, ClientConfig, DeliveryHub, DeliveryMode, FileStore, HubConfig, IdleFlush,
    IngestConfig, Ingestor, Interval, LatePolicy, OverflowPolicy, Persister, StreamServer,
    TradeClient, completion, receiver_stream,
};
use clap::Args;
use tokio_util::sync::CancellationToken;

use crate::telemetry;

/// Buffer between the websocket reader and the engine.
const TRADE_BUFFER: usize = 4096;

/// Options for `candlestream serve`.
#[derive(Debug, Args)]
pub(crate) struct ServeArgs {
    /// Instruments to subscribe to (comma separated, e.g. btcusdt,ethusdt)
    #[arg(
        short,
        long,
        env = "CANDLESTREAM_SYMBOLS",
        value_delimiter = ',',
        required = true
    )]
    symbols: Vec<String>,

    /// Websocket endpoint
    #[arg(
        long,
        env = "CANDLESTREAM_WS_URL",
        default_value = candlestream_lib::url::DEFAULT_BASE_URL
    )]
    ws_url: String,

    /// Bar interval (s1, m1, m5, m15, m30, h1, h4, d1)
    #[arg(short, long, env = "CANDLESTREAM_INTERVAL", default_value = "m1")]
    interval: Interval,

    /// Address of the NDJSON streaming endpoint
    #[arg(short, long, env = "CANDLESTREAM_LISTEN", default_value = "0.0.0.0:50051")]
    listen: SocketAddr,

    /// Persist bars under this directory
    #[arg(long, env = "CANDLESTREAM_STORE_DIR")]
    store_dir: Option<PathBuf>,

    /// Persist bars under the platform data directory
    #[arg(long, conflicts_with = "store_dir")]
    persist: bool,

    /// Only persist complete bars
    #[arg(long)]
    complete_only: bool,

    /// Completion channel capacity
    #[arg(long, env = "CANDLESTREAM_CHANNEL_CAPACITY", default_value_t = completion::DEFAULT_CAPACITY)]
    channel_capacity: usize,

    /// Per-subscriber buffer
    #[arg(long, env = "CANDLESTREAM_HUB_CAPACITY", default_value_t = 1024)]
    hub_capacity: usize,

    /// Drop bars instead of waiting when the completion channel is full
    #[arg(long)]
    drop_on_full: bool,

    /// Publish a snapshot of the open bar after every trade
    #[arg(long)]
    live: bool,

    /// Reject trades older than the open bucket instead of rolling back
    #[arg(long)]
    reject_late: bool,

    /// Complete bars this many seconds after their bucket ends, even without
    /// a newer trade
    #[arg(long, env = "CANDLESTREAM_IDLE_GRACE_SECS")]
    idle_grace_secs: Option<u64>,
}

impl ServeArgs {
    fn resolve_store_dir(&self) -> Result<Option<PathBuf>> {
        if self.persist {
            return Ok(Some(
                FileStore::default_path().context("Failed to determine data directory")?,
            ));
        }
        Ok(self.store_dir.clone())
    }

    fn ingest_config(&self) -> IngestConfig {
        IngestConfig {
            mode: if self.live {
                DeliveryMode::Live
            } else {
                DeliveryMode::Completed
            },
            idle: self.idle_grace_secs.map(|secs| IdleFlush {
                every: Duration::from_secs(1),
                grace: Duration::from_secs(secs),
            }),
        }
    }

    fn client_config(&self) -> ClientConfig {
        ClientConfig {
            base_url: self.ws_url.clone(),
            symbols: self.symbols.iter().map(|s| s.trim().to_lowercase()).collect(),
        }
    }
}

/// Run the live pipeline until the trade stream ends or a signal arrives.
pub(crate) async fn serve(args: ServeArgs) -> Result<()> {
    let shutdown = CancellationToken::new();
    tokio::spawn(telemetry::shutdown_on_signal(shutdown.clone()));

    let policy = if args.drop_on_full {
        OverflowPolicy::DropNewest
    } else {
        OverflowPolicy::Block
    };
    let (sender, receiver) = completion::channel(args.channel_capacity, policy);
    let hub = DeliveryHub::new(HubConfig {
        capacity: args.hub_capacity,
    });

    // Subscribe before anything is published.
    let persist_task = match args.resolve_store_dir()? {
        Some(dir) => {
            let store = FileStore::new(&dir)
                .with_context(|| format!("Failed to open store at {}", dir.display()))?;
            tracing::info!(path = %dir.display(), "Persisting bars");
            let persister = Persister::new(store).with_complete_only(args.complete_only);
            let subscription = hub.subscribe();
            Some(tokio::spawn(async move { persister.run(subscription).await }))
        }
        None => None,
    };

    let server = StreamServer::bind(args.listen, hub.clone())
        .await
        .context("Failed to start stream server")?;
    let server_task = tokio::spawn(server.serve(shutdown.clone()));

    let hub_task = {
        let hub = hub.clone();
        tokio::spawn(async move { hub.run(receiver).await })
    };

    let client = TradeClient::new(args.client_config());
    let (trade_tx, trade_rx) = tokio::sync::mpsc::channel(TRADE_BUFFER);
    let client_task = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move { client.run(trade_tx, shutdown).await })
    };

    tracing::info!(
        symbols = ?args.symbols,
        interval = %args.interval,
        listen = %args.listen,
        "Serving"
    );

    let aggregator = BarAggregator::new(args.interval).with_late_policy(if args.reject_late {
        LatePolicy::Reject
    } else {
        LatePolicy::Rollover
    });
    let ingestor = Ingestor::new(aggregator, sender, args.ingest_config());
    let report = ingestor
        .run(receiver_stream(trade_rx), shutdown.clone())
        .await
        .context("Ingest pipeline failed")?;

    // Ingest only returns early when the stream ended on its own.
    shutdown.cancel();

    match client_task.await? {
        Ok(forwarded) => tracing::info!(forwarded, "Trade client stopped"),
        Err(e) => tracing::error!(error = %e, "Trade client failed"),
    }
    let delivered = hub_task.await?;
    let served = server_task.await??;
    if let Some(task) = persist_task {
        let stats = task.await?;
        tracing::info!(
            written = stats.written,
            failed = stats.failed,
            lagged = stats.lagged,
            "Persister stopped"
        );
    }

    tracing::info!(
        received = report.received,
        rejected = report.rejected,
        completed = report.completed,
        dropped = report.dropped,
        delivered,
        served,
        "Shutdown complete"
    );
    Ok(())
}
