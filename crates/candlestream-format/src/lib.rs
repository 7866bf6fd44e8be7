//! Bar delivery and output formats for candlestream.
//!
//! - [`WireBar`] - The bar representation sent to subscribers
//! - [`CsvFormatter`] - CSV format, RFC 3339 or epoch-millisecond timestamps
//! - [`JsonFormatter`] - JSON array or NDJSON format

#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/candlestream/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod csv;
mod formatter;
mod json;
mod wire;

pub use crate::csv::{CsvFormatter, TimestampStyle};
pub use formatter::{FormatError, Formatter, OutputFormat};
pub use json::{JsonFormatter, JsonStyle};
pub use wire::WireBar;
