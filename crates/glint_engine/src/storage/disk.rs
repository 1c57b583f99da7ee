//! On-disk storage backend.
//!
//! One file per record under a root directory, named by an FNV-1a hash
//! of the cache key. Each file opens with the full key string so a hash
//! collision reads as a miss instead of someone else's record. Writes go
//! through a temp file and rename, so readers only ever see complete
//! records.

use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use crate::error::EngineError;

use super::{CacheKey, PersistentStorage};

const FILE_MAGIC: &[u8; 4] = b"GLC1";

/// Storage rooted at a directory on disk.
#[derive(Debug)]
pub struct DiskStorage {
    root: PathBuf,
}

impl DiskStorage {
    /// Open (creating if needed) a storage directory.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, EngineError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| EngineError::Storage(e.to_string()))?;
        Ok(DiskStorage { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn key_string(key: &CacheKey) -> String {
        format!("{}\u{0}{:?}", key.state_name, key.key)
    }

    fn file_path(&self, key: &CacheKey) -> PathBuf {
        let hash = fnv1a64(Self::key_string(key).as_bytes());
        self.root.join(format!("{hash:016x}.glintcache"))
    }
}

impl PersistentStorage for DiskStorage {
    fn read(&self, key: &CacheKey) -> Result<Option<Vec<u8>>, EngineError> {
        let bytes = match fs::read(self.file_path(key)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(EngineError::Storage(e.to_string())),
        };

        // Header: magic, key length, key string; then the payload.
        let expected = Self::key_string(key);
        let header_len = FILE_MAGIC.len() + 4 + expected.len();
        if bytes.len() < header_len || &bytes[..4] != FILE_MAGIC {
            return Ok(None);
        }
        let mut len_bytes = [0u8; 4];
        len_bytes.copy_from_slice(&bytes[4..8]);
        let key_len = u32::from_le_bytes(len_bytes) as usize;
        if key_len != expected.len() || &bytes[8..8 + key_len] != expected.as_bytes() {
            return Ok(None);
        }
        Ok(Some(bytes[8 + key_len..].to_vec()))
    }

    fn write(&self, key: &CacheKey, payload: &[u8]) -> Result<(), EngineError> {
        let key_string = Self::key_string(key);
        let path = self.file_path(key);
        let tmp = path.with_extension("tmp");

        let io = |e: std::io::Error| EngineError::Storage(e.to_string());
        {
            let mut file = fs::File::create(&tmp).map_err(io)?;
            file.write_all(FILE_MAGIC).map_err(io)?;
            let len = u32::try_from(key_string.len())
                .map_err(|_| EngineError::Storage("cache key too long".to_string()))?;
            file.write_all(&len.to_le_bytes()).map_err(io)?;
            file.write_all(key_string.as_bytes()).map_err(io)?;
            file.write_all(payload).map_err(io)?;
            file.sync_all().map_err(io)?;
        }
        fs::rename(&tmp, &path).map_err(io)
    }

    fn remove(&self, key: &CacheKey) -> Result<(), EngineError> {
        match fs::remove_file(self.file_path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(EngineError::Storage(e.to_string())),
        }
    }
}

fn fnv1a64(bytes: &[u8]) -> u64 {
    let mut hash = 0xcbf2_9ce4_8422_2325u64;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use glint_core::{AnalysisKey, DocumentId, ProjectId};
    use pretty_assertions::assert_eq;

    use super::*;

    fn cache_key(name: &str) -> CacheKey {
        CacheKey::new(
            Arc::from(name),
            AnalysisKey::from(DocumentId::new(ProjectId(0), 3)),
        )
    }

    #[test]
    fn test_round_trip_on_disk() {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir failed: {e}"));
        let storage =
            DiskStorage::new(dir.path()).unwrap_or_else(|e| panic!("open failed: {e}"));
        let key = cache_key("glint/unused/Document");

        assert_eq!(storage.read(&key), Ok(None));
        storage
            .write(&key, b"record bytes")
            .unwrap_or_else(|e| panic!("write failed: {e}"));
        assert_eq!(storage.read(&key), Ok(Some(b"record bytes".to_vec())));

        storage
            .remove(&key)
            .unwrap_or_else(|e| panic!("remove failed: {e}"));
        assert_eq!(storage.read(&key), Ok(None));
    }

    #[test]
    fn test_survives_reopen() {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir failed: {e}"));
        let key = cache_key("glint/unused/Document");
        {
            let storage =
                DiskStorage::new(dir.path()).unwrap_or_else(|e| panic!("open failed: {e}"));
            storage
                .write(&key, b"persisted")
                .unwrap_or_else(|e| panic!("write failed: {e}"));
        }
        let storage =
            DiskStorage::new(dir.path()).unwrap_or_else(|e| panic!("open failed: {e}"));
        assert_eq!(storage.read(&key), Ok(Some(b"persisted".to_vec())));
    }

    #[test]
    fn test_mismatched_key_reads_as_miss() {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir failed: {e}"));
        let storage =
            DiskStorage::new(dir.path()).unwrap_or_else(|e| panic!("open failed: {e}"));
        let key = cache_key("glint/a/Document");
        storage
            .write(&key, b"bytes")
            .unwrap_or_else(|e| panic!("write failed: {e}"));

        // Corrupt the header in place.
        let path = storage.file_path(&key);
        fs::write(&path, b"garbage").unwrap_or_else(|e| panic!("corrupt failed: {e}"));
        assert_eq!(storage.read(&key), Ok(None));
    }
}
