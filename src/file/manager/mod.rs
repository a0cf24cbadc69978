//! Hierarchy manager.
//!
//! Coordinates the metadata store, the object store and the conversion
//! collaborator for every folder and document operation. Metadata writes of
//! one operation share a single transaction. Payload writes precede the
//! metadata commit on create, payload deletes precede the metadata delete on
//! removal.

mod documents;
mod folders;

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use super::conversion::{DocumentConverter, OfficeConverter};
use super::document::Document;
use super::folder::{Folder, FolderNode, FolderRepository};
use super::storage::{FileStorage, ObjectStore};
use super::{ROOT_FOLDER_NAME, ROOT_TOKEN};
use crate::config::{Config, DeletePolicy};
use crate::db::{Database, DbConnection};
use crate::id::{new_id, parse_id};
use crate::tag::TagService;
use crate::{FolioError, Result};

/// Behavioural settings of the hierarchy manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerSettings {
    /// What deleting a non-empty folder does.
    pub delete_policy: DeletePolicy,
    /// How often a write is retried after losing a sibling-name race.
    pub name_retries: u32,
    /// Prefix of document download locators.
    pub download_base: String,
    /// Largest accepted payload in bytes.
    pub max_upload_bytes: u64,
}

impl ManagerSettings {
    /// Take settings from the loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            delete_policy: config.folders.delete_policy,
            name_retries: config.folders.name_retries,
            download_base: config.documents.download_base.clone(),
            max_upload_bytes: config.max_upload_bytes(),
        }
    }

    /// Set the delete policy.
    pub fn with_delete_policy(mut self, policy: DeletePolicy) -> Self {
        self.delete_policy = policy;
        self
    }

    /// Set the maximum payload size.
    pub fn with_max_upload_bytes(mut self, bytes: u64) -> Self {
        self.max_upload_bytes = bytes;
        self
    }
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// A folder with its sub-folder tree and direct documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FolderContents {
    /// The requested folder.
    pub folder: Folder,
    /// Sub-folders, each carrying its own nested sub-folders.
    pub subfolders: Vec<FolderNode>,
    /// Documents directly in the folder.
    pub documents: Vec<Document>,
}

/// Orchestrates folder and document operations.
#[derive(Clone)]
pub struct HierarchyManager {
    db: Database,
    store: Arc<dyn ObjectStore>,
    converter: Arc<dyn DocumentConverter>,
    settings: ManagerSettings,
}

impl HierarchyManager {
    /// Create a manager over the given collaborators.
    pub fn new(
        db: Database,
        store: Arc<dyn ObjectStore>,
        converter: Arc<dyn DocumentConverter>,
        settings: ManagerSettings,
    ) -> Self {
        Self {
            db,
            store,
            converter,
            settings,
        }
    }

    /// Create a manager with filesystem storage and the office converter
    /// named in `config`.
    pub fn from_config(db: Database, config: &Config) -> Result<Self> {
        let store = FileStorage::new(&config.storage.path)?;
        let converter = OfficeConverter::new(&config.documents.office_binary);
        Ok(Self::new(
            db,
            Arc::new(store),
            Arc::new(converter),
            ManagerSettings::from_config(config),
        ))
    }

    /// The metadata store.
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// The object store.
    pub fn store(&self) -> &dyn ObjectStore {
        self.store.as_ref()
    }

    /// Current settings.
    pub fn settings(&self) -> &ManagerSettings {
        &self.settings
    }

    /// Tag operations over the same metadata store.
    pub fn tags(&self) -> TagService<'_> {
        TagService::new(&self.db)
    }

    /// Create the root folder if it does not exist yet and return it.
    pub async fn ensure_root(&self) -> Result<Folder> {
        let mut conn = self.db.pool().acquire().await?;
        if let Some(root) = FolderRepository::find_root_by_name(&mut conn, ROOT_FOLDER_NAME).await? {
            return Ok(root);
        }

        let root = Folder {
            id: new_id(),
            name: ROOT_FOLDER_NAME.to_string(),
            parent_id: None,
            created_at: Utc::now(),
            visibility_groups: BTreeSet::new(),
        };

        match FolderRepository::insert(&mut conn, &root).await {
            Ok(()) => {
                info!(folder = %root.id, "root folder created");
                Ok(root)
            }
            // Someone else created it first.
            Err(e) if e.is_duplicate() => {
                FolderRepository::find_root_by_name(&mut conn, ROOT_FOLDER_NAME)
                    .await?
                    .ok_or(e)
            }
            Err(e) => Err(e),
        }
    }

    fn download_url(&self, id: Uuid) -> String {
        format!(
            "{}/v1/documents/{}/download",
            self.settings.download_base.trim_end_matches('/'),
            id
        )
    }
}

impl std::fmt::Debug for HierarchyManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HierarchyManager")
            .field("db", &self.db)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

/// Load a folder addressed by id or by the root token.
async fn load_folder(conn: &mut DbConnection, raw: &str) -> Result<Folder> {
    if raw.trim() == ROOT_TOKEN {
        return FolderRepository::find_root_by_name(conn, ROOT_FOLDER_NAME)
            .await?
            .ok_or_else(|| FolioError::NotFound("root folder".to_string()));
    }

    let id = parse_id(raw)?;
    FolderRepository::get_by_id(conn, id)
        .await?
        .ok_or_else(|| FolioError::NotFound(format!("folder {id}")))
}

/// Trim visibility group ids and reject blank ones.
fn normalize_groups(groups: Option<&BTreeSet<String>>) -> Result<Option<BTreeSet<String>>> {
    let Some(groups) = groups else {
        return Ok(None);
    };

    let mut normalized = BTreeSet::new();
    for group in groups {
        let group = group.trim();
        if group.is_empty() || group.chars().any(char::is_control) {
            return Err(FolioError::Validation(format!(
                "invalid visibility group '{group}'"
            )));
        }
        normalized.insert(group.to_string());
    }
    Ok(Some(normalized))
}

/// Run `attempt` again while it loses sibling-name races, up to `retries`
/// extra times.
async fn retry_on_duplicate<T, F, Fut>(retries: u32, what: &str, mut attempt: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut retried = 0;
    loop {
        match attempt().await {
            Err(e) if e.is_duplicate() && retried < retries => {
                retried += 1;
                warn!(what, retried, "sibling name taken concurrently, retrying: {e}");
            }
            result => return result,
        }
    }
}
