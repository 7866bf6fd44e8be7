//! Core types for the candlestream trade-to-candlestick aggregator.
//!
//! This crate provides the fundamental data structures used throughout candlestream:
//!
//! - [`RawTrade`] - A trade record as received from the exchange, prices as text
//! - [`Trade`] - A validated trade with decimal price and quantity
//! - [`Interval`] - Bucket width used for candlestick aggregation
//! - [`ParseError`] - Reasons a wire record is rejected

#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/candlestream/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
mod interval;
mod trade;

pub use error::ParseError;
pub use interval::{Interval, IntervalParseError};
pub use trade::{RawTrade, Trade};
