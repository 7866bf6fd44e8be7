//! Trade sources for candlestream.
//!
//! This crate feeds raw trades into the aggregation pipeline:
//!
//! - [`url::stream_url`] - Builds Binance combined-stream URLs
//! - [`decode_frame`] - Decodes websocket frames into [`RawTrade`](candlestream_types::RawTrade)s
//! - [`TradeClient`] - Websocket client for the combined aggTrade stream
//! - [`replay_stream`] - Replays recorded NDJSON captures

#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/candlestream/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod client;
mod error;
mod parse;
mod replay;
pub mod url;

pub use client::{ClientConfig, TradeClient, receiver_stream};
pub use error::SourceError;
pub use parse::{AGG_TRADE_EVENT, decode_frame};
pub use replay::{open_replay, replay_stream};
