//! Ingestion memoization.
//!
//! Reading and merging a week of logger exports is the slowest part of a
//! multi-room run, and every room of a plan reads the same files. The cache
//! keeps the last ingested value together with the identity of the files it
//! came from; a run against a different file set replaces it.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::debug;

use crate::error::Result;

/// Identity of one input file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceIdentity {
    pub path: PathBuf,
    pub len: u64,
    pub modified: Option<SystemTime>,
}

impl SourceIdentity {
    /// Read the identity of a file from its metadata.
    pub fn of(path: &Path) -> Result<Self> {
        let meta = std::fs::metadata(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            len: meta.len(),
            modified: meta.modified().ok(),
        })
    }
}

/// Identity of an input selection. Order-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceKey {
    sources: Vec<SourceIdentity>,
}

impl SourceKey {
    pub fn new(mut sources: Vec<SourceIdentity>) -> Self {
        sources.sort_by(|a, b| a.path.cmp(&b.path));
        sources.dedup();
        Self { sources }
    }

    /// Key for a set of files, read from their metadata.
    pub fn from_paths<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        let sources = paths
            .iter()
            .map(|p| SourceIdentity::of(p.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(sources))
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

/// Single-slot memo of an ingested value, keyed by [`SourceKey`].
pub struct IngestCache<T> {
    slot: RwLock<Option<(SourceKey, Arc<T>)>>,
}

impl<T> Default for IngestCache<T> {
    fn default() -> Self {
        Self {
            slot: RwLock::new(None),
        }
    }
}

impl<T> IngestCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached value for `key`, or run `load` and cache its result.
    ///
    /// A failed load leaves the previous entry in place.
    pub fn get_or_load<F>(&self, key: &SourceKey, load: F) -> Result<Arc<T>>
    where
        F: FnOnce() -> Result<T>,
    {
        if let Some(hit) = self.get(key) {
            debug!(sources = key.len(), "Ingest cache hit");
            return Ok(hit);
        }

        let mut slot = self.slot.write();
        // Another caller may have filled the slot while we waited.
        if let Some((cached_key, value)) = slot.as_ref()
            && cached_key == key
        {
            return Ok(Arc::clone(value));
        }

        debug!(sources = key.len(), "Ingest cache miss; loading");
        let value = Arc::new(load()?);
        *slot = Some((key.clone(), Arc::clone(&value)));
        Ok(value)
    }

    /// Cached value for `key`, if the slot holds that key.
    pub fn get(&self, key: &SourceKey) -> Option<Arc<T>> {
        let slot = self.slot.read();
        match slot.as_ref() {
            Some((cached_key, value)) if cached_key == key => Some(Arc::clone(value)),
            _ => None,
        }
    }

    pub fn invalidate(&self) {
        *self.slot.write() = None;
    }
}

static_assertions::assert_impl_all!(IngestCache<crate::matrix::SensorMatrix>: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MappingError;
    use std::cell::Cell;

    fn key(name: &str, len: u64) -> SourceKey {
        SourceKey::new(vec![SourceIdentity {
            path: PathBuf::from(name),
            len,
            modified: None,
        }])
    }

    #[test]
    fn test_loads_once_per_key() {
        let cache = IngestCache::new();
        let calls = Cell::new(0);

        let load = || {
            calls.set(calls.get() + 1);
            Ok(42)
        };

        assert_eq!(*cache.get_or_load(&key("a.csv", 10), load).unwrap(), 42);
        assert_eq!(*cache.get_or_load(&key("a.csv", 10), load).unwrap(), 42);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_changed_key_reloads() {
        let cache = IngestCache::new();
        cache.get_or_load(&key("a.csv", 10), || Ok(1)).unwrap();

        // Same path, different size: the file changed.
        let value = cache.get_or_load(&key("a.csv", 11), || Ok(2)).unwrap();
        assert_eq!(*value, 2);
        assert!(cache.get(&key("a.csv", 10)).is_none());
    }

    #[test]
    fn test_failed_load_keeps_previous_entry() {
        let cache = IngestCache::new();
        cache.get_or_load(&key("a.csv", 10), || Ok(1)).unwrap();

        let result = cache.get_or_load(&key("b.csv", 10), || {
            Err(MappingError::Internal("read failed".to_string()))
        });
        assert!(result.is_err());
        assert_eq!(cache.get(&key("a.csv", 10)).map(|v| *v), Some(1));
    }

    #[test]
    fn test_invalidate() {
        let cache = IngestCache::new();
        cache.get_or_load(&key("a.csv", 10), || Ok(1)).unwrap();
        cache.invalidate();
        assert!(cache.get(&key("a.csv", 10)).is_none());
    }

    #[test]
    fn test_key_is_order_insensitive() {
        let a = SourceIdentity {
            path: PathBuf::from("a.csv"),
            len: 1,
            modified: None,
        };
        let b = SourceIdentity {
            path: PathBuf::from("b.csv"),
            len: 2,
            modified: None,
        };
        assert_eq!(
            SourceKey::new(vec![a.clone(), b.clone()]),
            SourceKey::new(vec![b, a])
        );
    }

    #[test]
    fn test_key_from_missing_path_is_io_error() {
        let err = SourceKey::from_paths(&["/definitely/not/here.csv"]).unwrap_err();
        assert_eq!(err.error_code(), "IO_ERROR");
    }
}
