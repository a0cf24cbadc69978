//! Folder operations.

use std::collections::BTreeSet;

use chrono::Utc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{load_folder, normalize_groups, retry_on_duplicate, FolderContents, HierarchyManager};
use crate::config::DeletePolicy;
use crate::db::DbConnection;
use crate::file::document::DocumentRepository;
use crate::file::folder::{Folder, FolderNode, FolderRepository, FolderUpdate, NewFolder};
use crate::file::naming::{resolve_name, sibling_names, validate_name};
use crate::file::visibility::Caller;
use crate::id::{new_id, parse_id};
use crate::{FolioError, Result};

impl HierarchyManager {
    // ========== Read Operations ==========

    /// Get a folder with its sub-folder tree and direct documents.
    ///
    /// `id` is a folder id or the root token. Sub-folders the caller may not
    /// see are removed along with everything below them; documents in the
    /// requested folder are returned as-is.
    pub async fn get_contents(&self, id: &str, caller: &Caller) -> Result<FolderContents> {
        let mut conn = self.db.pool().acquire().await?;
        let folder = load_folder(&mut conn, id).await?;
        let descendants = FolderRepository::list_descendants(&mut conn, folder.id).await?;
        let documents = DocumentRepository::list_by_folder(&mut conn, folder.id).await?;

        let total = descendants.len();
        let subfolders = caller.filter(FolderNode::build_forest(folder.id, descendants));
        debug!(
            folder = %folder.id,
            total,
            visible = subfolders.iter().map(FolderNode::len).sum::<usize>(),
            "loaded folder contents"
        );

        Ok(FolderContents {
            folder,
            subfolders,
            documents,
        })
    }

    /// Get a single folder.
    pub async fn get_folder(&self, id: &str) -> Result<Folder> {
        let mut conn = self.db.pool().acquire().await?;
        load_folder(&mut conn, id).await
    }

    /// The chain of folders from the root down to `id`.
    pub async fn folder_path(&self, id: &str) -> Result<Vec<Folder>> {
        let mut conn = self.db.pool().acquire().await?;
        let folder = load_folder(&mut conn, id).await?;
        FolderRepository::get_path(&mut conn, folder.id).await
    }

    // ========== Write Operations ==========

    /// Create a folder under an existing parent.
    ///
    /// The name is made unique among the parent's children.
    pub async fn create_folder(&self, new: &NewFolder) -> Result<Folder> {
        let name = new.name.trim();
        validate_name(name, "folder")?;
        let parent = new
            .parent_id
            .as_deref()
            .ok_or_else(|| FolioError::Validation("folder parent is required".to_string()))?;
        let groups = normalize_groups(new.visibility_groups.as_ref())?.unwrap_or_default();
        let groups = &groups;

        retry_on_duplicate(self.settings.name_retries, "folder", move || {
            self.try_create_folder(name, parent, groups)
        })
        .await
    }

    async fn try_create_folder(
        &self,
        name: &str,
        parent: &str,
        groups: &BTreeSet<String>,
    ) -> Result<Folder> {
        let mut tx = self.db.begin().await?;
        let parent = load_folder(&mut tx, parent).await?;

        let siblings = FolderRepository::list_by_parent(&mut tx, parent.id).await?;
        let taken = sibling_names(siblings.iter().map(|f| (f.id, f.name.as_str())), None);
        let resolved = resolve_name(name, &taken);
        validate_name(&resolved, "folder")?;
        if resolved != name {
            debug!(requested = name, resolved = %resolved, "folder name collision resolved");
        }

        let folder = Folder {
            id: new_id(),
            name: resolved,
            parent_id: Some(parent.id),
            created_at: Utc::now(),
            visibility_groups: groups.clone(),
        };
        FolderRepository::insert(&mut tx, &folder).await?;
        tx.commit().await?;

        info!(folder = %folder.id, name = %folder.name, parent = %parent.id, "folder created");
        Ok(folder)
    }

    /// Rename, move or change the visibility groups of a folder.
    ///
    /// Moving re-resolves the name against the destination's children, and
    /// a folder cannot be moved below itself.
    pub async fn update_folder(&self, id: &str, update: &FolderUpdate) -> Result<Folder> {
        let id = parse_id(id)?;
        let name = update.name.as_deref().map(str::trim);
        if let Some(name) = name {
            validate_name(name, "folder")?;
        }
        let groups = normalize_groups(update.visibility_groups.as_ref())?;
        let parent = update.parent_id.as_deref();
        let groups = groups.as_ref();

        retry_on_duplicate(self.settings.name_retries, "folder", move || {
            self.try_update_folder(id, name, parent, groups)
        })
        .await
    }

    async fn try_update_folder(
        &self,
        id: Uuid,
        name: Option<&str>,
        parent: Option<&str>,
        groups: Option<&BTreeSet<String>>,
    ) -> Result<Folder> {
        let mut tx = self.db.begin().await?;
        let mut folder = FolderRepository::get_by_id(&mut tx, id)
            .await?
            .ok_or_else(|| FolioError::NotFound(format!("folder {id}")))?;

        if folder.is_root() && (parent.is_some() || name.is_some_and(|n| n != folder.name)) {
            return Err(FolioError::Validation(
                "the root folder cannot be renamed or moved".to_string(),
            ));
        }

        let mut target_parent = folder.parent_id;
        if let Some(parent) = parent {
            let parent = load_folder(&mut tx, parent).await?;
            if parent.id == folder.id {
                return Err(FolioError::Validation(
                    "a folder cannot be its own parent".to_string(),
                ));
            }
            let ancestry = FolderRepository::get_path(&mut tx, parent.id).await?;
            if ancestry.iter().any(|f| f.id == folder.id) {
                warn!(folder = %folder.id, target = %parent.id, "rejected move into own subtree");
                return Err(FolioError::Validation(format!(
                    "cannot move folder '{}' into its own subfolder '{}'",
                    folder.name, parent.name
                )));
            }
            target_parent = Some(parent.id);
        }

        let moved = target_parent != folder.parent_id;
        if name.is_some() || moved {
            if let Some(parent_id) = target_parent {
                let candidate = name.unwrap_or(&folder.name);
                let siblings = FolderRepository::list_by_parent(&mut tx, parent_id).await?;
                let taken = sibling_names(
                    siblings.iter().map(|f| (f.id, f.name.as_str())),
                    Some(folder.id),
                );
                let resolved = resolve_name(candidate, &taken);
                validate_name(&resolved, "folder")?;
                folder.name = resolved;
            }
        }

        folder.parent_id = target_parent;
        if let Some(groups) = groups {
            folder.visibility_groups = groups.clone();
        }

        FolderRepository::save(&mut tx, &folder).await?;
        tx.commit().await?;

        info!(folder = %folder.id, name = %folder.name, moved, "folder updated");
        Ok(folder)
    }

    /// Delete a folder according to the configured delete policy.
    ///
    /// Strict: the folder must have no sub-folders and no documents.
    /// Cascade: every payload in the subtree is removed first, then the
    /// folder and all its descendants in one transaction. A payload that
    /// cannot be removed aborts the delete with all metadata intact.
    pub async fn delete_folder(&self, id: &str) -> Result<()> {
        let id = parse_id(id)?;
        match self.settings.delete_policy {
            DeletePolicy::Strict => self.delete_empty_folder(id).await,
            DeletePolicy::Cascade => self.delete_folder_tree(id).await,
        }
    }

    async fn delete_empty_folder(&self, id: Uuid) -> Result<()> {
        let mut tx = self.db.begin().await?;
        let folder = Self::deletable_folder(&mut tx, id).await?;

        let subfolders = FolderRepository::count_children(&mut tx, id).await?;
        if subfolders > 0 {
            warn!(folder = %id, subfolders, "refused to delete non-empty folder");
            return Err(FolioError::Validation(format!(
                "folder '{}' is not empty: contains {subfolders} subfolder(s)",
                folder.name
            )));
        }
        let documents = FolderRepository::count_documents(&mut tx, id).await?;
        if documents > 0 {
            warn!(folder = %id, documents, "refused to delete non-empty folder");
            return Err(FolioError::Validation(format!(
                "folder '{}' is not empty: contains {documents} document(s)",
                folder.name
            )));
        }

        FolderRepository::delete(&mut tx, id).await?;
        tx.commit().await?;

        info!(folder = %id, name = %folder.name, "folder deleted");
        Ok(())
    }

    async fn delete_folder_tree(&self, id: Uuid) -> Result<()> {
        let document_ids = {
            let mut conn = self.db.pool().acquire().await?;
            Self::deletable_folder(&mut conn, id).await?;
            DocumentRepository::list_ids_in_subtree(&mut conn, id).await?
        };

        for document_id in &document_ids {
            if let Err(e) = self.store.delete(*document_id) {
                error!(
                    folder = %id,
                    document = %document_id,
                    "payload delete failed, aborting folder delete: {e}"
                );
                return Err(e);
            }
        }

        let mut tx = self.db.begin().await?;
        let removed = FolderRepository::delete(&mut tx, id).await?;
        tx.commit().await?;
        if !removed {
            return Err(FolioError::NotFound(format!("folder {id}")));
        }

        info!(folder = %id, documents = document_ids.len(), "folder tree deleted");
        Ok(())
    }

    async fn deletable_folder(conn: &mut DbConnection, id: Uuid) -> Result<Folder> {
        let folder = FolderRepository::get_by_id(conn, id)
            .await?
            .ok_or_else(|| FolioError::NotFound(format!("folder {id}")))?;
        if folder.is_root() {
            return Err(FolioError::Validation(
                "the root folder cannot be deleted".to_string(),
            ));
        }
        Ok(folder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::manager::tests::setup_manager;

    async fn child(manager: &HierarchyManager, parent: Uuid, name: &str) -> Folder {
        manager
            .create_folder(&NewFolder::new(name, parent.to_string()))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_folder_resolves_collision() {
        let manager = setup_manager().await;
        let root = manager.ensure_root().await.unwrap();

        let a = child(&manager, root.id, "A").await;
        let a1 = child(&manager, root.id, "A").await;
        let a2 = child(&manager, root.id, "A").await;
        assert_eq!(a.name, "A");
        assert_eq!(a1.name, "A (1)");
        assert_eq!(a2.name, "A (2)");
        assert_eq!(a1.parent_id, Some(root.id));
    }

    #[tokio::test]
    async fn test_create_folder_under_root_token() {
        let manager = setup_manager().await;
        let root = manager.ensure_root().await.unwrap();

        let folder = manager
            .create_folder(&NewFolder::new("Docs", "root"))
            .await
            .unwrap();
        assert_eq!(folder.parent_id, Some(root.id));
    }

    #[tokio::test]
    async fn test_create_folder_requires_parent() {
        let manager = setup_manager().await;
        manager.ensure_root().await.unwrap();

        let orphan = NewFolder {
            name: "Orphan".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            manager.create_folder(&orphan).await,
            Err(FolioError::Validation(_))
        ));

        let missing = NewFolder::new("X", Uuid::new_v4().to_string());
        assert!(matches!(
            manager.create_folder(&missing).await,
            Err(FolioError::NotFound(_))
        ));

        let malformed = NewFolder::new("X", "not-a-uuid");
        assert!(matches!(
            manager.create_folder(&malformed).await,
            Err(FolioError::InvalidIdentifier(_))
        ));
    }

    #[tokio::test]
    async fn test_create_folder_rejects_bad_names() {
        let manager = setup_manager().await;
        let root = manager.ensure_root().await.unwrap();

        let long = "x".repeat(256);
        for name in ["", "   ", long.as_str()] {
            let result = manager
                .create_folder(&NewFolder::new(name, root.id.to_string()))
                .await;
            assert!(matches!(result, Err(FolioError::Validation(_))), "{name:?}");
        }
    }

    #[tokio::test]
    async fn test_get_contents_nested() {
        let manager = setup_manager().await;
        let root = manager.ensure_root().await.unwrap();
        let a = child(&manager, root.id, "A").await;
        child(&manager, a.id, "A1").await;
        child(&manager, root.id, "B").await;

        let contents = manager
            .get_contents("root", &Caller::anonymous())
            .await
            .unwrap();
        assert_eq!(contents.folder.id, root.id);
        assert_eq!(contents.subfolders.len(), 2);
        assert_eq!(contents.subfolders[0].folder.name, "A");
        assert_eq!(contents.subfolders[0].subfolders[0].folder.name, "A1");
        assert!(contents.documents.is_empty());
    }

    #[tokio::test]
    async fn test_contents_json_shape() {
        let manager = setup_manager().await;
        let root = manager.ensure_root().await.unwrap();
        let a = child(&manager, root.id, "A").await;
        child(&manager, a.id, "A1").await;

        let contents = manager
            .get_contents("root", &Caller::anonymous())
            .await
            .unwrap();
        let json = serde_json::to_value(&contents).unwrap();

        assert_eq!(json["folder"]["name"], "root");
        assert!(json["folder"]["parent_id"].is_null());
        assert_eq!(json["subfolders"][0]["name"], "A");
        assert_eq!(json["subfolders"][0]["subfolders"][0]["name"], "A1");
        assert!(json["documents"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_contents_filters_by_cohort() {
        let manager = setup_manager().await;
        let root = manager.ensure_root().await.unwrap();
        let course = manager
            .create_folder(
                &NewFolder::new("Course", root.id.to_string()).with_visibility_groups(["g1"]),
            )
            .await
            .unwrap();
        child(&manager, course.id, "Public inside").await;
        child(&manager, root.id, "Public").await;

        let outsider = Caller::member("s2", Some("g2".to_string()));
        let contents = manager.get_contents("root", &outsider).await.unwrap();
        let names: Vec<&str> = contents
            .subfolders
            .iter()
            .map(|n| n.folder.name.as_str())
            .collect();
        assert_eq!(names, vec!["Public"]);

        let insider = Caller::member("s1", Some("g1".to_string()));
        let contents = manager.get_contents("root", &insider).await.unwrap();
        assert_eq!(contents.subfolders.len(), 2);

        let admin = Caller::elevated("admin");
        let contents = manager.get_contents("root", &admin).await.unwrap();
        assert_eq!(contents.subfolders.len(), 2);

        // The requested folder itself is not gated
        let direct = manager
            .get_contents(&course.id.to_string(), &outsider)
            .await
            .unwrap();
        assert_eq!(direct.folder.id, course.id);
    }

    #[tokio::test]
    async fn test_get_contents_errors() {
        let manager = setup_manager().await;
        let caller = Caller::anonymous();

        assert!(matches!(
            manager.get_contents("root", &caller).await,
            Err(FolioError::NotFound(_))
        ));
        assert!(matches!(
            manager.get_contents("xyz", &caller).await,
            Err(FolioError::InvalidIdentifier(_))
        ));
        assert!(matches!(
            manager
                .get_contents(&Uuid::new_v4().to_string(), &caller)
                .await,
            Err(FolioError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_rename_folder() {
        let manager = setup_manager().await;
        let root = manager.ensure_root().await.unwrap();
        let a = child(&manager, root.id, "A").await;
        let b = child(&manager, root.id, "B").await;

        // Renaming to itself keeps the name
        let same = manager
            .update_folder(&a.id.to_string(), &FolderUpdate::new().name("A"))
            .await
            .unwrap();
        assert_eq!(same.name, "A");

        let renamed = manager
            .update_folder(&b.id.to_string(), &FolderUpdate::new().name("A"))
            .await
            .unwrap();
        assert_eq!(renamed.name, "A (1)");
    }

    #[tokio::test]
    async fn test_move_folder_resolves_in_destination() {
        let manager = setup_manager().await;
        let root = manager.ensure_root().await.unwrap();
        let src = child(&manager, root.id, "src").await;
        let dst = child(&manager, root.id, "dst").await;
        child(&manager, dst.id, "Notes").await;
        let notes = child(&manager, src.id, "Notes").await;

        let moved = manager
            .update_folder(
                &notes.id.to_string(),
                &FolderUpdate::new().parent_id(dst.id.to_string()),
            )
            .await
            .unwrap();
        assert_eq!(moved.parent_id, Some(dst.id));
        assert_eq!(moved.name, "Notes (1)");
    }

    #[tokio::test]
    async fn test_move_folder_into_descendant_rejected() {
        let manager = setup_manager().await;
        let root = manager.ensure_root().await.unwrap();
        let a = child(&manager, root.id, "A").await;
        let b = child(&manager, a.id, "B").await;
        let c = child(&manager, b.id, "C").await;

        for target in [a.id, c.id] {
            let result = manager
                .update_folder(
                    &a.id.to_string(),
                    &FolderUpdate::new().parent_id(target.to_string()),
                )
                .await;
            assert!(matches!(result, Err(FolioError::Validation(_))));
        }

        let unchanged = manager.get_folder(&a.id.to_string()).await.unwrap();
        assert_eq!(unchanged.parent_id, Some(root.id));
    }

    #[tokio::test]
    async fn test_update_visibility_groups() {
        let manager = setup_manager().await;
        let root = manager.ensure_root().await.unwrap();
        let a = child(&manager, root.id, "A").await;

        let updated = manager
            .update_folder(
                &a.id.to_string(),
                &FolderUpdate::new().visibility_groups(["g1", "g2"]),
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "A");
        assert_eq!(updated.visibility_groups.len(), 2);
    }

    #[tokio::test]
    async fn test_root_is_immutable() {
        let manager = setup_manager().await;
        let root = manager.ensure_root().await.unwrap();
        let a = child(&manager, root.id, "A").await;
        let root_id = root.id.to_string();

        assert!(matches!(
            manager
                .update_folder(&root_id, &FolderUpdate::new().name("top"))
                .await,
            Err(FolioError::Validation(_))
        ));
        assert!(matches!(
            manager
                .update_folder(&root_id, &FolderUpdate::new().parent_id(a.id.to_string()))
                .await,
            Err(FolioError::Validation(_))
        ));
        assert!(matches!(
            manager.delete_folder(&root_id).await,
            Err(FolioError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_empty_folder() {
        let manager = setup_manager().await;
        let root = manager.ensure_root().await.unwrap();
        let a = child(&manager, root.id, "A").await;

        manager.delete_folder(&a.id.to_string()).await.unwrap();
        assert!(matches!(
            manager.get_folder(&a.id.to_string()).await,
            Err(FolioError::NotFound(_))
        ));
        assert!(matches!(
            manager.delete_folder(&a.id.to_string()).await,
            Err(FolioError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_strict_delete_names_subfolder_count() {
        let manager = setup_manager().await;
        let root = manager.ensure_root().await.unwrap();
        let a = child(&manager, root.id, "A").await;
        let b = child(&manager, a.id, "B").await;
        child(&manager, a.id, "C").await;

        let err = manager.delete_folder(&a.id.to_string()).await.unwrap_err();
        assert!(matches!(err, FolioError::Validation(ref msg) if msg.contains("2 subfolder(s)")));
        assert!(manager.get_folder(&b.id.to_string()).await.is_ok());
    }

    #[tokio::test]
    async fn test_folder_path() {
        let manager = setup_manager().await;
        let root = manager.ensure_root().await.unwrap();
        let a = child(&manager, root.id, "A").await;
        let b = child(&manager, a.id, "B").await;

        let path = manager.folder_path(&b.id.to_string()).await.unwrap();
        let names: Vec<&str> = path.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["root", "A", "B"]);
    }
}
