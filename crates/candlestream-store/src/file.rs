//! File-backed bar storage.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use candlestream_aggregate::Bar;
use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use tempfile::NamedTempFile;

use crate::{BarStore, PersistenceError, Result};

/// Stores each bar as a JSON file.
///
/// Layout: `<root>/<instrument>/<bucket_start_ms>.json`. Files are written to
/// a temporary file in the same directory and renamed into place, so a reader
/// never sees a partially written bar.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Opens a store rooted at `root`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        create_dir(&root)?;
        Ok(Self { root })
    }

    /// Returns the default location for stored bars.
    ///
    /// Uses the `directories` crate to find the appropriate location:
    /// - Linux: `~/.local/share/candlestream/bars`
    /// - macOS: `~/Library/Application Support/candlestream/bars`
    /// - Windows: `C:\Users\<User>\AppData\Roaming\candlestream\data\bars`
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::NoDataDir`] if no home directory is known.
    pub fn default_path() -> Result<PathBuf> {
        ProjectDirs::from("", "", "candlestream")
            .map(|dirs| dirs.data_dir().join("bars"))
            .ok_or(PersistenceError::NoDataDir)
    }

    /// Opens a store at the default path.
    ///
    /// # Errors
    ///
    /// Returns an error if the path cannot be determined or created.
    pub fn with_default_path() -> Result<Self> {
        Self::new(Self::default_path()?)
    }

    /// Returns the store root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the file a bar is stored in.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::InvalidInstrument`] if the instrument is
    /// not a plain file name.
    pub fn bar_path(&self, instrument: &str, bucket_start: DateTime<Utc>) -> Result<PathBuf> {
        Ok(self
            .instrument_dir(instrument)?
            .join(format!("{}.json", bucket_start.timestamp_millis())))
    }

    fn instrument_dir(&self, instrument: &str) -> Result<PathBuf> {
        let valid = !instrument.is_empty()
            && instrument != "."
            && instrument != ".."
            && !instrument.contains(['/', '\\', '\0']);
        if !valid {
            return Err(PersistenceError::InvalidInstrument(instrument.to_string()));
        }
        Ok(self.root.join(instrument))
    }
}

#[async_trait]
impl BarStore for FileStore {
    async fn upsert(&self, bar: &Bar) -> Result<()> {
        let dir = self.instrument_dir(&bar.instrument)?;
        let path = self.bar_path(&bar.instrument, bar.bucket_start)?;
        let json = serde_json::to_vec_pretty(bar)?;
        blocking(move || write_atomic(&dir, &path, &json)).await
    }

    async fn get(&self, instrument: &str, bucket_start: DateTime<Utc>) -> Result<Option<Bar>> {
        let path = self.bar_path(instrument, bucket_start)?;
        blocking(move || {
            if path.exists() {
                read_bar(&path).map(Some)
            } else {
                Ok(None)
            }
        })
        .await
    }

    async fn list(&self, instrument: &str) -> Result<Vec<Bar>> {
        let dir = self.instrument_dir(instrument)?;
        blocking(move || list_dir(&dir)).await
    }
}

/// Runs blocking file I/O off the async executor.
async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| PersistenceError::WriteFile {
            path: PathBuf::new(),
            source: std::io::Error::other(e),
        })?
}

fn create_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|e| PersistenceError::CreateDir {
        path: path.to_path_buf(),
        source: e,
    })
}

fn write_atomic(dir: &Path, path: &Path, contents: &[u8]) -> Result<()> {
    create_dir(dir)?;
    let write_err = |e: std::io::Error| PersistenceError::WriteFile {
        path: path.to_path_buf(),
        source: e,
    };

    let mut tmp = NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(contents).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}

fn read_bar(path: &Path) -> Result<Bar> {
    let content = fs::read_to_string(path).map_err(|e| PersistenceError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;
    serde_json::from_str(&content).map_err(|e| PersistenceError::ParseJson {
        path: path.to_path_buf(),
        source: e,
    })
}

fn list_dir(dir: &Path) -> Result<Vec<Bar>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let read_err = |e: std::io::Error| PersistenceError::ReadFile {
        path: dir.to_path_buf(),
        source: e,
    };

    let mut bars = Vec::new();
    for entry in fs::read_dir(dir).map_err(read_err)? {
        let path = entry.map_err(read_err)?.path();
        if !path.extension().is_some_and(|ext| ext == "json") {
            continue;
        }
        match read_bar(&path) {
            Ok(bar) => bars.push(bar),
            // A corrupt file should not hide the rest of the series.
            Err(e) => tracing::warn!(error = %e, "Skipping unreadable bar file"),
        }
    }

    bars.sort_by_key(|bar| bar.bucket_start);
    Ok(bars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use tempfile::TempDir;

    fn create_test_bar(instrument: &str, minute: u32) -> Bar {
        Bar {
            instrument: instrument.to_string(),
            bucket_start: Utc.with_ymd_and_hms(2024, 1, 1, 12, minute, 0).unwrap(),
            open: dec!(100.0),
            high: dec!(102.5),
            low: dec!(100.0),
            close: dec!(102.5),
            volume: dec!(1.5),
            trade_count: 2,
        }
    }

    #[test]
    fn test_store_creation() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("bars");
        let store = FileStore::new(&root).unwrap();

        assert!(store.root().exists());
    }

    #[test]
    fn test_bar_path_layout() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(temp_dir.path()).unwrap();
        let bar = create_test_bar("BTCUSDT", 0);

        let path = store.bar_path("BTCUSDT", bar.bucket_start).unwrap();
        assert_eq!(
            path,
            temp_dir.path().join("BTCUSDT").join("1704110400000.json")
        );
    }

    #[test]
    fn test_rejects_path_like_instruments() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(temp_dir.path()).unwrap();
        let t = create_test_bar("X", 0).bucket_start;

        for name in ["", "..", "a/b", "a\\b"] {
            assert!(matches!(
                store.bar_path(name, t),
                Err(PersistenceError::InvalidInstrument(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_upsert_and_get() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(temp_dir.path()).unwrap();
        let bar = create_test_bar("BTCUSDT", 0);

        store.upsert(&bar).await.unwrap();
        let loaded = store.get("BTCUSDT", bar.bucket_start).await.unwrap();
        assert_eq!(loaded, Some(bar));
    }

    #[tokio::test]
    async fn test_upsert_overwrites_and_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(temp_dir.path()).unwrap();
        let bar = create_test_bar("BTCUSDT", 0);
        store.upsert(&bar).await.unwrap();

        let updated = Bar {
            high: dec!(110),
            close: dec!(110),
            ..bar.clone()
        };
        store.upsert(&updated).await.unwrap();
        store.upsert(&updated).await.unwrap();

        let bars = store.list("BTCUSDT").await.unwrap();
        assert_eq!(bars, vec![updated]);
        // No temporary files left behind.
        assert_eq!(fs::read_dir(temp_dir.path().join("BTCUSDT")).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        {
            let store = FileStore::new(temp_dir.path()).unwrap();
            store.upsert(&create_test_bar("ETHUSDT", 2)).await.unwrap();
            store.upsert(&create_test_bar("ETHUSDT", 1)).await.unwrap();
        }

        let reopened = FileStore::new(temp_dir.path()).unwrap();
        let bars = reopened.list("ETHUSDT").await.unwrap();
        assert_eq!(bars.len(), 2);
        assert!(bars[0].bucket_start < bars[1].bucket_start);
    }

    #[tokio::test]
    async fn test_list_skips_corrupt_files() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(temp_dir.path()).unwrap();
        store.upsert(&create_test_bar("BTCUSDT", 0)).await.unwrap();
        fs::write(temp_dir.path().join("BTCUSDT").join("1.json"), "{broken").unwrap();

        assert_eq!(store.list("BTCUSDT").await.unwrap().len(), 1);
        assert!(store.list("UNKNOWN").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_corrupt_file_is_parse_error() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(temp_dir.path()).unwrap();
        let bar = create_test_bar("BTCUSDT", 0);
        let path = store.bar_path("BTCUSDT", bar.bucket_start).unwrap();
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "not json").unwrap();

        let result = store.get("BTCUSDT", bar.bucket_start).await;
        assert!(matches!(result, Err(PersistenceError::ParseJson { .. })));
    }
}
