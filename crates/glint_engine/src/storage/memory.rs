//! In-process storage backend.

use dashmap::DashMap;

use crate::error::EngineError;

use super::{CacheKey, PersistentStorage};

/// Storage that keeps encoded records in a concurrent map. The default
/// backend, and the one tests use.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    records: DashMap<CacheKey, Vec<u8>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records, for tests and diagnostics.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl PersistentStorage for MemoryStorage {
    fn read(&self, key: &CacheKey) -> Result<Option<Vec<u8>>, EngineError> {
        Ok(self.records.get(key).map(|entry| entry.clone()))
    }

    fn write(&self, key: &CacheKey, bytes: &[u8]) -> Result<(), EngineError> {
        self.records.insert(key.clone(), bytes.to_vec());
        Ok(())
    }

    fn remove(&self, key: &CacheKey) -> Result<(), EngineError> {
        self.records.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use glint_core::{AnalysisKey, ProjectId};
    use pretty_assertions::assert_eq;

    use super::*;

    fn cache_key() -> CacheKey {
        CacheKey::new(Arc::from("glint/test/Project"), AnalysisKey::from(ProjectId(1)))
    }

    #[test]
    fn test_write_read_remove() {
        let storage = MemoryStorage::new();
        let key = cache_key();

        assert_eq!(storage.read(&key), Ok(None));
        storage
            .write(&key, b"payload")
            .unwrap_or_else(|e| panic!("write failed: {e}"));
        assert_eq!(storage.read(&key), Ok(Some(b"payload".to_vec())));

        storage
            .remove(&key)
            .unwrap_or_else(|e| panic!("remove failed: {e}"));
        assert_eq!(storage.read(&key), Ok(None));
        // Removing again is a no-op.
        assert_eq!(storage.remove(&key), Ok(()));
    }

    #[test]
    fn test_write_replaces() {
        let storage = MemoryStorage::new();
        let key = cache_key();
        storage
            .write(&key, b"old")
            .unwrap_or_else(|e| panic!("write failed: {e}"));
        storage
            .write(&key, b"new")
            .unwrap_or_else(|e| panic!("write failed: {e}"));
        assert_eq!(storage.read(&key), Ok(Some(b"new".to_vec())));
        assert_eq!(storage.len(), 1);
    }
}
