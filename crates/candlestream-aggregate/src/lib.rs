//! Candlestick aggregation for candlestream.
//!
//! This crate turns a stream of trades into per-instrument OHLCV bars:
//!
//! - [`Bar`] - One candlestick for an `(instrument, bucket_start)` key
//! - [`BarUpdate`] - A bar plus its [`BarStatus`], as delivered downstream
//! - [`BarAggregator`] - The single-writer aggregation engine
//! - [`SharedAggregator`] - Lock-guarded engine for multi-producer use

#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/candlestream/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod aggregator;
mod bar;
mod error;
mod shared;

pub use aggregator::{BarAggregator, EngineStats, Ingested, LatePolicy};
pub use bar::{Bar, BarStatus, BarUpdate};
pub use error::IngestError;
pub use shared::SharedAggregator;
