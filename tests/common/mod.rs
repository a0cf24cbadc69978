//! Test helpers for integration tests.
//!
//! Provides a fault-injecting object store and helpers for building a
//! hierarchy manager over in-memory or on-disk stores.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use tempfile::TempDir;
use uuid::Uuid;

use folio::file::OfficeConverter;
use folio::{
    Caller, Database, DeletePolicy, FileStorage, FolioError, HierarchyManager, ManagerSettings,
    MemoryStorage, ObjectStore, Result,
};

/// Object store that can be told to fail puts or deletes.
#[derive(Debug, Default)]
pub struct FaultyStorage {
    inner: MemoryStorage,
    fail_put: AtomicBool,
    fail_delete: AtomicBool,
    deletes: AtomicUsize,
}

impl FaultyStorage {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_puts(&self, fail: bool) {
        self.fail_put.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_delete.store(fail, Ordering::SeqCst);
    }

    /// Number of delete calls seen, including failed ones.
    pub fn delete_calls(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    /// Number of payloads currently stored.
    pub fn len(&self) -> usize {
        self.inner.len()
    }
}

impl ObjectStore for FaultyStorage {
    fn put(&self, key: Uuid, bytes: &[u8]) -> Result<()> {
        if self.fail_put.load(Ordering::SeqCst) {
            return Err(FolioError::StorageIo(format!("injected put failure for {key}")));
        }
        self.inner.put(key, bytes)
    }

    fn get(&self, key: Uuid) -> Result<Vec<u8>> {
        self.inner.get(key)
    }

    fn delete(&self, key: Uuid) -> Result<bool> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(FolioError::StorageIo(format!("injected delete failure for {key}")));
        }
        self.inner.delete(key)
    }

    fn exists(&self, key: Uuid) -> Result<bool> {
        self.inner.exists(key)
    }
}

/// Build a manager over an in-memory database and the given store.
pub async fn manager_with(
    store: Arc<dyn ObjectStore>,
    policy: DeletePolicy,
) -> HierarchyManager {
    let db = Database::open_in_memory().await.unwrap();
    let settings = ManagerSettings::default().with_delete_policy(policy);
    let manager = HierarchyManager::new(db, store, Arc::new(OfficeConverter::default()), settings);
    manager.ensure_root().await.unwrap();
    manager
}

/// Build a manager with an on-disk database and filesystem payload storage.
pub async fn disk_manager(temp: &TempDir) -> HierarchyManager {
    let db = Database::open(temp.path().join("folio.db"), 4).await.unwrap();
    let store = FileStorage::new(temp.path().join("payloads")).unwrap();
    let manager = HierarchyManager::new(
        db,
        Arc::new(store),
        Arc::new(OfficeConverter::default()),
        ManagerSettings::default(),
    );
    manager.ensure_root().await.unwrap();
    manager
}

/// A cohort-scoped caller.
pub fn student(cohort: &str) -> Caller {
    Caller::member(format!("student-{cohort}"), Some(cohort.to_string()))
}

/// Tag list for uploads without tags.
pub const NO_TAGS: &[&str] = &[];
