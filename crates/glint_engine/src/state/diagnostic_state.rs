//! One versioned cache of diagnostic sets.

use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use glint_core::{AnalysisKey, VersionStamp};
use glint_diagnostic::serialize;

use crate::error::EngineError;
use crate::storage::{CacheKey, StorageRef};

/// Cache of diagnostic sets for one (analyzer, granularity) pair.
///
/// Two tiers: a concurrent in-memory map for keys with an active
/// consumer, and the persistent storage for everything else. The
/// retention predicate decides which tier a result lands in; a key is
/// never in both.
pub struct DiagnosticState {
    name: Arc<str>,
    analyzer_version: VersionStamp,
    storage: StorageRef,
    in_memory: RwLock<FxHashMap<AnalysisKey, super::AnalysisData>>,
}

impl DiagnosticState {
    pub fn new(name: Arc<str>, analyzer_version: VersionStamp, storage: StorageRef) -> Self {
        DiagnosticState {
            name,
            analyzer_version,
            storage,
            in_memory: RwLock::new(FxHashMap::default()),
        }
    }

    pub fn name(&self) -> &Arc<str> {
        &self.name
    }

    /// Look up existing data without computing anything. Falls through
    /// to storage; records written by a different analyzer version
    /// decode as absent.
    pub fn try_get_existing_data(&self, key: AnalysisKey) -> Option<super::AnalysisData> {
        if let Some(data) = self.in_memory.read().get(&key) {
            return Some(data.clone());
        }
        let bytes = self
            .storage
            .read(&CacheKey::new(self.name.clone(), key))
            .ok()
            .flatten()?;
        let record = serialize::decode(&bytes, self.analyzer_version, key)?;
        Some(super::AnalysisData::from_cache(
            record.text_version,
            record.data_version,
            record.items.into(),
        ))
    }

    /// Whether any data is cached for the key, in either tier.
    pub fn has_data(&self, key: AnalysisKey) -> bool {
        self.try_get_existing_data(key).is_some()
    }

    /// Store freshly computed data. Retained keys live in memory;
    /// everything else is encoded to storage and evicted.
    pub fn persist(
        &self,
        key: AnalysisKey,
        data: super::AnalysisData,
        retain: bool,
    ) -> Result<(), EngineError> {
        if retain {
            // Store the steady-state shape, as a storage round-trip
            // would: `old_items` describes one transition, and keeping
            // it would make every later same-version lookup report a
            // change that never happened.
            let steady = super::AnalysisData::from_cache(
                data.text_version(),
                data.data_version(),
                data.items().clone(),
            );
            self.in_memory.write().insert(key, steady);
            self.storage.remove(&CacheKey::new(self.name.clone(), key))?;
            return Ok(());
        }
        let bytes = serialize::encode(
            self.analyzer_version,
            data.text_version(),
            data.data_version(),
            data.items(),
        );
        self.storage
            .write(&CacheKey::new(self.name.clone(), key), &bytes)?;
        self.in_memory.write().remove(&key);
        Ok(())
    }

    /// Drop everything cached for the key.
    pub fn remove(&self, key: AnalysisKey) -> Result<(), EngineError> {
        self.in_memory.write().remove(&key);
        self.storage.remove(&CacheKey::new(self.name.clone(), key))
    }

    /// Number of in-memory entries, for tests.
    pub fn in_memory_count(&self) -> usize {
        self.in_memory.read().len()
    }
}

impl std::fmt::Debug for DiagnosticState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiagnosticState")
            .field("name", &self.name)
            .field("analyzer_version", &self.analyzer_version)
            .field("in_memory", &self.in_memory.read().len())
            .finish_non_exhaustive()
    }
}
