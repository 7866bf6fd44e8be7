//! Bar persistence for candlestream.
//!
//! This crate stores bars keyed by `(instrument, bucket_start)` with upsert
//! semantics, so replaying the same bar leaves the store unchanged:
//!
//! - [`BarStore`] - The upsert contract
//! - [`MemoryStore`] - Process-local store
//! - [`FileStore`] - One JSON file per bar, written atomically
//! - [`Persister`] - Hub subscriber that writes every delivered bar

#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/candlestream/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
mod file;
mod persister;
mod store;

pub use error::{PersistenceError, Result};
pub use file::FileStore;
pub use persister::{PersistStats, Persister};
pub use store::{BarStore, MemoryStore};
