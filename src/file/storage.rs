//! Object storage for document payloads.
//!
//! Payloads are keyed by document id. Two backends are provided:
//! - `FileStorage`: sharded directory tree on the local filesystem
//! - `MemoryStorage`: process-local map, for tests and ephemeral setups

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use tracing::debug;
use uuid::Uuid;

use crate::{FolioError, Result};

/// Binary blob store keyed by document id.
///
/// `delete` is idempotent: removing a missing key succeeds and returns
/// `false`, so interrupted cleanups can simply be retried.
pub trait ObjectStore: Send + Sync {
    /// Store `bytes` under `key`, replacing any previous payload.
    fn put(&self, key: Uuid, bytes: &[u8]) -> Result<()>;

    /// Load the payload stored under `key`.
    fn get(&self, key: Uuid) -> Result<Vec<u8>>;

    /// Remove the payload stored under `key`.
    ///
    /// Returns `true` if a payload was removed, `false` if none existed.
    fn delete(&self, key: Uuid) -> Result<bool>;

    /// Check whether a payload exists under `key`.
    fn exists(&self, key: Uuid) -> Result<bool>;
}

fn missing(key: Uuid) -> FolioError {
    FolioError::NotFound(format!("payload for document {key}"))
}

fn storage_io(action: &str, key: Uuid, e: impl std::fmt::Display) -> FolioError {
    FolioError::StorageIo(format!("{action} payload {key}: {e}"))
}

/// Filesystem object store.
///
/// Payloads are stored in a sharded directory structure:
/// ```text
/// {base_path}/
/// ├── ab/
/// │   └── ab12cd34-5678-90ab-cdef-123456789012
/// ├── cd/
/// │   └── cd90ab12-3456-7890-abcd-ef1234567890
/// └── ...
/// ```
#[derive(Debug, Clone)]
pub struct FileStorage {
    /// Base directory for payload storage.
    base_path: PathBuf,
}

impl FileStorage {
    /// Create a new FileStorage with the given base path.
    ///
    /// The base directory will be created if it doesn't exist.
    pub fn new(base_path: impl Into<PathBuf>) -> Result<Self> {
        let base_path = base_path.into();
        fs::create_dir_all(&base_path)?;

        Ok(Self { base_path })
    }

    /// Get the base path of this storage.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Get the full file path for a key.
    ///
    /// The path is constructed as: {base_path}/{shard}/{key}
    /// where shard is the first 2 characters of the key.
    pub fn get_file_path(&self, key: Uuid) -> PathBuf {
        let name = key.to_string();
        self.base_path.join(&name[..2]).join(name)
    }

    /// Clean up empty shard directories.
    pub fn cleanup_empty_dirs(&self) -> Result<usize> {
        let mut removed = 0;

        if let Ok(entries) = fs::read_dir(&self.base_path) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_dir() {
                    if let Ok(dir_entries) = fs::read_dir(&path) {
                        if dir_entries.count() == 0 && fs::remove_dir(&path).is_ok() {
                            removed += 1;
                        }
                    }
                }
            }
        }

        Ok(removed)
    }
}

impl ObjectStore for FileStorage {
    fn put(&self, key: Uuid, bytes: &[u8]) -> Result<()> {
        let file_path = self.get_file_path(key);

        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).map_err(|e| storage_io("write", key, e))?;
        }

        // Write then rename so readers never observe a partial payload.
        let partial = file_path.with_extension("part");
        fs::write(&partial, bytes).map_err(|e| storage_io("write", key, e))?;
        fs::rename(&partial, &file_path).map_err(|e| {
            let _ = fs::remove_file(&partial);
            storage_io("write", key, e)
        })?;

        debug!(%key, size = bytes.len(), "stored payload");
        Ok(())
    }

    fn get(&self, key: Uuid) -> Result<Vec<u8>> {
        match fs::read(self.get_file_path(key)) {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(missing(key)),
            Err(e) => Err(storage_io("read", key, e)),
        }
    }

    fn delete(&self, key: Uuid) -> Result<bool> {
        match fs::remove_file(self.get_file_path(key)) {
            Ok(()) => {
                debug!(%key, "deleted payload");
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(storage_io("delete", key, e)),
        }
    }

    fn exists(&self, key: Uuid) -> Result<bool> {
        Ok(self.get_file_path(key).is_file())
    }
}

/// In-memory object store.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    blobs: RwLock<HashMap<Uuid, Vec<u8>>>,
}

impl MemoryStorage {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored payloads.
    pub fn len(&self) -> usize {
        self.blobs.read().map(|b| b.len()).unwrap_or(0)
    }

    /// Whether the store holds no payloads.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ObjectStore for MemoryStorage {
    fn put(&self, key: Uuid, bytes: &[u8]) -> Result<()> {
        let mut blobs = self
            .blobs
            .write()
            .map_err(|e| storage_io("write", key, e))?;
        blobs.insert(key, bytes.to_vec());
        Ok(())
    }

    fn get(&self, key: Uuid) -> Result<Vec<u8>> {
        let blobs = self.blobs.read().map_err(|e| storage_io("read", key, e))?;
        blobs.get(&key).cloned().ok_or_else(|| missing(key))
    }

    fn delete(&self, key: Uuid) -> Result<bool> {
        let mut blobs = self
            .blobs
            .write()
            .map_err(|e| storage_io("delete", key, e))?;
        Ok(blobs.remove(&key).is_some())
    }

    fn exists(&self, key: Uuid) -> Result<bool> {
        let blobs = self.blobs.read().map_err(|e| storage_io("read", key, e))?;
        Ok(blobs.contains_key(&key))
    }
}
