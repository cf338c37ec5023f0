//! Explicit, caller-invalidated caches.
//!
//! Loads are memoized by the blake3 checksum of the source bytes; results by
//! that checksum plus the canonical serialization of the [`FilterSpec`]. Both
//! caches sit behind a `Mutex`, so one instance can be shared across threads.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::debug;

use crate::data::filter::FilterSpec;
use crate::data::loader::{self, LoadOptions};
use crate::data::model::RecordSet;
use crate::error::{LoadError, Result};
use crate::pipeline::{Evaluation, Pipeline};

/// Hex blake3 digest of `bytes`.
pub fn checksum_bytes(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // Entries are only ever inserted whole, so a poisoned map is still usable.
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// DatasetCache
// ---------------------------------------------------------------------------

/// A loaded source together with the checksum it was loaded at.
#[derive(Debug, Clone)]
pub struct LoadedDataset {
    pub source: PathBuf,
    pub checksum: String,
    pub records: Arc<RecordSet>,
}

/// Memoizes [`loader::load_bytes`] per path and content checksum.
pub struct DatasetCache {
    options: LoadOptions,
    entries: Mutex<HashMap<PathBuf, LoadedDataset>>,
}

impl DatasetCache {
    pub fn new(options: LoadOptions) -> Self {
        DatasetCache {
            options,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Return the cached dataset if the file content is unchanged, otherwise
    /// (re)load it. The file is read once; the records are parsed from the
    /// same bytes the checksum was taken of.
    pub fn load(&self, path: &Path) -> Result<LoadedDataset> {
        let bytes = std::fs::read(path).map_err(|source| LoadError::data_load(path, source))?;
        let checksum = checksum_bytes(&bytes);

        if let Some(hit) = lock(&self.entries).get(path) {
            if hit.checksum == checksum {
                debug!("Dataset cache hit for {}", path.display());
                return Ok(hit.clone());
            }
        }

        debug!("Dataset cache miss for {} ({checksum})", path.display());
        let records = loader::load_bytes(path, bytes, &self.options)?;
        let loaded = LoadedDataset {
            source: path.to_path_buf(),
            checksum,
            records: Arc::new(records),
        };
        lock(&self.entries).insert(path.to_path_buf(), loaded.clone());
        Ok(loaded)
    }

    /// Drop the entry for `path`; the next [`load`](Self::load) re-reads it.
    pub fn invalidate(&self, path: &Path) -> bool {
        let removed = lock(&self.entries).remove(path).is_some();
        if removed {
            debug!("Invalidated dataset cache for {}", path.display());
        }
        removed
    }

    pub fn clear(&self) {
        lock(&self.entries).clear();
    }
}

impl Default for DatasetCache {
    fn default() -> Self {
        DatasetCache::new(LoadOptions::default())
    }
}

// ---------------------------------------------------------------------------
// ResultCache
// ---------------------------------------------------------------------------

type ResultKey = (String, String);

/// Entries kept by [`ResultCache::new`].
pub const DEFAULT_RESULT_CAPACITY: usize = 64;

#[derive(Default)]
struct ResultEntries {
    map: HashMap<ResultKey, Arc<Evaluation>>,
    /// Insertion order, oldest first.
    order: VecDeque<ResultKey>,
}

/// Memoizes [`Pipeline::evaluate`] by (source checksum, canonical spec).
///
/// Holds at most `capacity` evaluations; inserting beyond that evicts the
/// oldest entry. Nothing else expires, so a changed source must be dropped
/// with [`invalidate_source`](Self::invalidate_source).
pub struct ResultCache {
    pipeline: Pipeline,
    capacity: usize,
    entries: Mutex<ResultEntries>,
}

impl ResultCache {
    pub fn new(pipeline: Pipeline) -> Self {
        ResultCache::with_capacity(pipeline, DEFAULT_RESULT_CAPACITY)
    }

    /// A cache holding at most `capacity` evaluations (at least one).
    pub fn with_capacity(pipeline: Pipeline, capacity: usize) -> Self {
        ResultCache {
            pipeline,
            capacity: capacity.max(1),
            entries: Mutex::new(ResultEntries::default()),
        }
    }

    pub fn evaluate(&self, dataset: &LoadedDataset, spec: &FilterSpec) -> Arc<Evaluation> {
        let key = (dataset.checksum.clone(), spec.canonical_key());

        if let Some(hit) = lock(&self.entries).map.get(&key) {
            debug!("Result cache hit");
            return Arc::clone(hit);
        }

        // Computed without holding the lock; a racing caller may compute the
        // same entry, and the first insert wins.
        let evaluation = Arc::new(self.pipeline.evaluate(&dataset.records, spec));
        let mut entries = lock(&self.entries);
        if let Some(existing) = entries.map.get(&key) {
            return Arc::clone(existing);
        }
        while entries.map.len() >= self.capacity {
            let Some(oldest) = entries.order.pop_front() else {
                break;
            };
            entries.map.remove(&oldest);
            debug!("Evicted cached result for source {}", oldest.0);
        }
        entries.order.push_back(key.clone());
        entries.map.insert(key, Arc::clone(&evaluation));
        evaluation
    }

    /// Drop every result computed from the source with `checksum`.
    pub fn invalidate_source(&self, checksum: &str) -> usize {
        let mut entries = lock(&self.entries);
        let before = entries.map.len();
        entries.map.retain(|(source, _), _| source != checksum);
        entries.order.retain(|(source, _)| source != checksum);
        let removed = before - entries.map.len();
        debug!("Invalidated {removed} cached results for source {checksum}");
        removed
    }

    pub fn clear(&self) {
        let mut entries = lock(&self.entries);
        entries.map.clear();
        entries.order.clear();
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
