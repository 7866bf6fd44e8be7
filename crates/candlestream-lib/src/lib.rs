//! Streaming trade-to-candlestick aggregation for Binance aggTrade feeds.
//!
//! This is a facade crate that re-exports functionality from the candlestream
//! workspace crates for convenient access.
//!
//! # Quick Start
//!
//! ```ignore
//! use candlestream_lib::prelude::*;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (sender, receiver) = completion::channel(1024, OverflowPolicy::Block);
//!     let hub = DeliveryHub::with_defaults();
//!     let mut subscription = hub.subscribe();
//!
//!     let trades = open_replay("trades.ndjson").await?;
//!     let ingestor = Ingestor::new(
//!         BarAggregator::new(Interval::Minute1),
//!         sender,
//!         IngestConfig::default(),
//!     );
//!
//!     let shutdown = CancellationToken::new();
//!     tokio::spawn(ingestor.run(trades, shutdown));
//!     tokio::spawn({
//!         let hub = hub.clone();
//!         async move { hub.run(receiver).await }
//!     });
//!
//!     while let Some(update) = subscription.recv().await {
//!         println!("{:?}", WireBar::from(update));
//!     }
//!
//!     Ok(())
//! }
//! ```

#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/candlestream/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Re-export core types
pub use candlestream_types::*;

// Re-export the aggregation engine
pub use candlestream_aggregate::{
    Bar, BarAggregator, BarStatus, BarUpdate, EngineStats, IngestError, Ingested, LatePolicy,
    SharedAggregator,
};

// Re-export the exchange client and replay
#[cfg(feature = "source")]
pub use candlestream_source::{
    ClientConfig, SourceError, TradeClient, decode_frame, open_replay, receiver_stream,
    replay_stream, url,
};

// Re-export formatters
#[cfg(feature = "format")]
pub use candlestream_format::{
    CsvFormatter, FormatError, Formatter, JsonFormatter, JsonStyle, OutputFormat, TimestampStyle,
    WireBar,
};

// Re-export delivery
#[cfg(feature = "relay")]
pub use candlestream_relay::{
    BarSink, ChannelSink, CompletionReceiver, CompletionSender, DeliveryHub, DeliveryMode,
    HubConfig, IdleFlush, IngestConfig, IngestReport, Ingestor, NdjsonSink, OverflowPolicy,
    RelayError, StreamServer, SubscriberHandle, Subscription, TransportError, completion,
};

// Re-export persistence
#[cfg(feature = "store")]
pub use candlestream_store::{
    BarStore, FileStore, MemoryStore, PersistStats, PersistenceError, Persister,
};

/// Prelude module for convenient imports.
///
/// ```
/// use candlestream_lib::prelude::*;
/// ```
pub mod prelude {
    pub use candlestream_types::{Interval, ParseError, RawTrade, Trade};

    pub use candlestream_aggregate::{Bar, BarAggregator, BarUpdate, IngestError, LatePolicy};

    #[cfg(feature = "source")]
    pub use candlestream_source::{ClientConfig, TradeClient, open_replay, receiver_stream};

    #[cfg(feature = "format")]
    pub use candlestream_format::{Formatter, OutputFormat, WireBar};

    #[cfg(feature = "relay")]
    pub use candlestream_relay::{
        DeliveryHub, DeliveryMode, IdleFlush, IngestConfig, Ingestor, OverflowPolicy,
        StreamServer, completion,
    };

    #[cfg(feature = "store")]
    pub use candlestream_store::{BarStore, FileStore, MemoryStore, Persister};
}
