//! The upsert contract and an in-memory implementation.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use candlestream_aggregate::Bar;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::Result;

/// Durable bar storage keyed by `(instrument, bucket_start)`.
///
/// `upsert` inserts a new key or overwrites the stored values of an existing
/// one, so applying the same bar twice leaves the store unchanged.
/// Implementations must allow concurrent upserts of different keys.
#[async_trait]
pub trait BarStore: Send + Sync {
    /// Inserts or replaces the bar stored under the bar's key.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError`](crate::PersistenceError) if the bar
    /// cannot be stored.
    async fn upsert(&self, bar: &Bar) -> Result<()>;

    /// Loads one bar.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError`](crate::PersistenceError) if the store
    /// cannot be read.
    async fn get(&self, instrument: &str, bucket_start: DateTime<Utc>) -> Result<Option<Bar>>;

    /// Loads every bar of an instrument, oldest first.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError`](crate::PersistenceError) if the store
    /// cannot be read.
    async fn list(&self, instrument: &str) -> Result<Vec<Bar>>;
}

#[async_trait]
impl<T: BarStore + ?Sized> BarStore for Arc<T> {
    async fn upsert(&self, bar: &Bar) -> Result<()> {
        (**self).upsert(bar).await
    }

    async fn get(&self, instrument: &str, bucket_start: DateTime<Utc>) -> Result<Option<Bar>> {
        (**self).get(instrument, bucket_start).await
    }

    async fn list(&self, instrument: &str) -> Result<Vec<Bar>> {
        (**self).list(instrument).await
    }
}

type Key = (String, DateTime<Utc>);

/// Process-local store, mostly for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    bars: RwLock<BTreeMap<Key, Bar>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored bars.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bars.read().len()
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bars.read().is_empty()
    }
}

#[async_trait]
impl BarStore for MemoryStore {
    async fn upsert(&self, bar: &Bar) -> Result<()> {
        self.bars
            .write()
            .insert((bar.instrument.clone(), bar.bucket_start), bar.clone());
        Ok(())
    }

    async fn get(&self, instrument: &str, bucket_start: DateTime<Utc>) -> Result<Option<Bar>> {
        Ok(self
            .bars
            .read()
            .get(&(instrument.to_string(), bucket_start))
            .cloned())
    }

    async fn list(&self, instrument: &str) -> Result<Vec<Bar>> {
        Ok(self
            .bars
            .read()
            .iter()
            .filter(|((name, _), _)| name == instrument)
            .map(|(_, bar)| bar.clone())
            .collect())
    }
}
