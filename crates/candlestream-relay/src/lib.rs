//! Delivery plumbing for candlestream.
//!
//! This crate moves bars from the engine to their consumers:
//!
//! - [`completion`] - Bounded, order-preserving engine-to-delivery channel
//! - [`Ingestor`] - Owns the engine; ingests trades, sweeps idle bars,
//!   flushes on shutdown
//! - [`DeliveryHub`] - Broadcast fan-out to subscriptions and attached sinks
//! - [`BarSink`] - Subscriber destination ([`NdjsonSink`], [`ChannelSink`])
//! - [`StreamServer`] - NDJSON-over-TCP streaming endpoint

#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/candlestream/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod completion;
mod error;
mod hub;
mod ingest;
mod server;
mod sink;

pub use completion::{CompletionReceiver, CompletionSender, OverflowPolicy};
pub use error::{RelayError, TransportError};
pub use hub::{DeliveryHub, DeliveryMode, HubConfig, SubscriberHandle, Subscription};
pub use ingest::{IdleFlush, IngestConfig, IngestReport, Ingestor};
pub use server::StreamServer;
pub use sink::{BarSink, ChannelSink, NdjsonSink};
