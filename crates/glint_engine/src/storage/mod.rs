//! Persistent storage behind the in-memory diagnostic caches.
//!
//! Storage holds already-encoded cache records keyed by (state name,
//! analysis key). It is an opaque byte store: validation of what comes
//! back out happens at decode time, so a backend is free to lose or
//! corrupt data and the engine degrades to recomputation.

use std::sync::Arc;

use glint_core::AnalysisKey;

use crate::error::EngineError;

mod disk;
mod memory;

pub use disk::DiskStorage;
pub use memory::MemoryStorage;

/// Key for one persisted record.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct CacheKey {
    /// Name of the owning diagnostic state, unique per (language,
    /// analyzer, granularity).
    pub state_name: Arc<str>,
    /// Document or project the record describes.
    pub key: AnalysisKey,
}

impl CacheKey {
    pub fn new(state_name: Arc<str>, key: AnalysisKey) -> Self {
        CacheKey { state_name, key }
    }
}

/// A byte store for encoded diagnostic records.
///
/// `read` returning `Ok(None)` and `read` returning stale bytes are
/// equally fine; callers must re-validate everything they decode.
pub trait PersistentStorage: Send + Sync {
    /// Fetch the bytes stored for a key, if any.
    fn read(&self, key: &CacheKey) -> Result<Option<Vec<u8>>, EngineError>;

    /// Store bytes for a key, replacing any previous value atomically.
    fn write(&self, key: &CacheKey, bytes: &[u8]) -> Result<(), EngineError>;

    /// Drop the record for a key. Removing an absent key is not an error.
    fn remove(&self, key: &CacheKey) -> Result<(), EngineError>;
}

/// Shared handle to a storage backend.
pub type StorageRef = Arc<dyn PersistentStorage>;
