//! Folder types and repository for the document tree.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::db::DbConnection;
use crate::id::stored_id;
use crate::Result;

/// Separator used when folding visibility groups into one column.
const GROUP_SEPARATOR: char = '\u{1f}';

/// Column list shared by every folder query.
const FOLDER_COLUMNS: &str = "f.id, f.name, f.parent_id, f.created_at,
    (SELECT group_concat(g.group_id, char(31)) FROM folder_visibility_groups g
     WHERE g.folder_id = f.id) AS visibility_groups";

/// A folder in the document tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Folder {
    /// Unique folder ID.
    pub id: Uuid,
    /// Folder name, unique among its siblings.
    pub name: String,
    /// Parent folder ID (None only for the root).
    pub parent_id: Option<Uuid>,
    /// When the folder was created.
    pub created_at: DateTime<Utc>,
    /// Groups allowed to see the folder. Empty means visible to everyone.
    pub visibility_groups: BTreeSet<String>,
}

impl Folder {
    /// Whether this is the parentless root folder.
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

#[derive(Debug, sqlx::FromRow)]
struct FolderRow {
    id: String,
    name: String,
    parent_id: Option<String>,
    created_at: DateTime<Utc>,
    visibility_groups: Option<String>,
}

impl FolderRow {
    fn into_folder(self) -> Result<Folder> {
        let visibility_groups = self
            .visibility_groups
            .map(|joined| {
                joined
                    .split(GROUP_SEPARATOR)
                    .map(str::to_string)
                    .collect::<BTreeSet<_>>()
            })
            .unwrap_or_default();

        Ok(Folder {
            id: stored_id(&self.id)?,
            name: self.name,
            parent_id: self.parent_id.as_deref().map(stored_id).transpose()?,
            created_at: self.created_at,
            visibility_groups,
        })
    }
}

fn into_folders(rows: Vec<FolderRow>) -> Result<Vec<Folder>> {
    rows.into_iter().map(FolderRow::into_folder).collect()
}

/// Data for creating a new folder.
#[derive(Debug, Clone, Default)]
pub struct NewFolder {
    /// Requested folder name (may be adjusted to avoid sibling collisions).
    pub name: String,
    /// Parent folder ID as supplied by the caller.
    pub parent_id: Option<String>,
    /// Visibility groups; absent means globally visible.
    pub visibility_groups: Option<BTreeSet<String>>,
}

impl NewFolder {
    /// Create a new NewFolder under the given parent.
    pub fn new(name: impl Into<String>, parent_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent_id: Some(parent_id.into()),
            visibility_groups: None,
        }
    }

    /// Restrict the folder to the given groups.
    pub fn with_visibility_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.visibility_groups = Some(groups.into_iter().map(Into::into).collect());
        self
    }
}

/// Patch for updating a folder.
#[derive(Debug, Clone, Default)]
pub struct FolderUpdate {
    /// New folder name.
    pub name: Option<String>,
    /// New parent folder ID.
    pub parent_id: Option<String>,
    /// Replacement visibility groups.
    pub visibility_groups: Option<BTreeSet<String>>,
}

impl FolderUpdate {
    /// Create a new FolderUpdate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the parent folder ID.
    pub fn parent_id(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    /// Replace the visibility groups.
    pub fn visibility_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.visibility_groups = Some(groups.into_iter().map(Into::into).collect());
        self
    }

    /// Check if any fields are set.
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.parent_id.is_none() && self.visibility_groups.is_none()
    }
}

/// A folder together with its nested sub-folders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FolderNode {
    /// The folder itself.
    #[serde(flatten)]
    pub folder: Folder,
    /// Direct sub-folders, each with their own subtree.
    pub subfolders: Vec<FolderNode>,
}

impl FolderNode {
    /// Create a leaf node.
    pub fn leaf(folder: Folder) -> Self {
        Self {
            folder,
            subfolders: Vec::new(),
        }
    }

    /// Build the subtrees hanging off `parent_id` from a flat descendant list.
    pub fn build_forest(parent_id: Uuid, descendants: Vec<Folder>) -> Vec<FolderNode> {
        let mut by_parent: HashMap<Uuid, Vec<Folder>> = HashMap::new();
        for folder in descendants {
            if let Some(pid) = folder.parent_id {
                by_parent.entry(pid).or_default().push(folder);
            }
        }
        Self::attach(parent_id, &mut by_parent)
    }

    fn attach(parent_id: Uuid, by_parent: &mut HashMap<Uuid, Vec<Folder>>) -> Vec<FolderNode> {
        let children = by_parent.remove(&parent_id).unwrap_or_default();
        children
            .into_iter()
            .map(|folder| {
                let subfolders = Self::attach(folder.id, by_parent);
                FolderNode { folder, subfolders }
            })
            .collect()
    }

    /// Number of folders in this subtree, including this one.
    pub fn len(&self) -> usize {
        1 + self.subfolders.iter().map(FolderNode::len).sum::<usize>()
    }

    /// Visit every folder in this subtree, parents before children.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Folder)) {
        visit(&self.folder);
        for child in &self.subfolders {
            child.walk(visit);
        }
    }
}

/// Repository for folder operations.
///
/// Every method takes the connection explicitly so callers decide whether a
/// call runs on a pooled connection or inside an open transaction.
pub struct FolderRepository;

impl FolderRepository {
    /// Insert a fully-formed folder and its visibility groups.
    pub async fn insert(conn: &mut DbConnection, folder: &Folder) -> Result<()> {
        sqlx::query("INSERT INTO folders (id, name, parent_id, created_at) VALUES (?, ?, ?, ?)")
            .bind(folder.id.to_string())
            .bind(&folder.name)
            .bind(folder.parent_id.map(|p| p.to_string()))
            .bind(folder.created_at)
            .execute(&mut *conn)
            .await?;

        Self::replace_visibility_groups(conn, folder.id, &folder.visibility_groups).await
    }

    /// Get a folder by ID.
    pub async fn get_by_id(conn: &mut DbConnection, id: Uuid) -> Result<Option<Folder>> {
        let row: Option<FolderRow> =
            sqlx::query_as(&format!("SELECT {FOLDER_COLUMNS} FROM folders f WHERE f.id = ?"))
                .bind(id.to_string())
                .fetch_optional(&mut *conn)
                .await?;

        row.map(FolderRow::into_folder).transpose()
    }

    /// Find a parentless folder by name.
    pub async fn find_root_by_name(conn: &mut DbConnection, name: &str) -> Result<Option<Folder>> {
        let row: Option<FolderRow> = sqlx::query_as(&format!(
            "SELECT {FOLDER_COLUMNS} FROM folders f WHERE f.name = ? AND f.parent_id IS NULL"
        ))
        .bind(name)
        .fetch_optional(&mut *conn)
        .await?;

        row.map(FolderRow::into_folder).transpose()
    }

    /// List child folders of a parent folder, ordered by name.
    pub async fn list_by_parent(conn: &mut DbConnection, parent_id: Uuid) -> Result<Vec<Folder>> {
        let rows: Vec<FolderRow> = sqlx::query_as(&format!(
            "SELECT {FOLDER_COLUMNS} FROM folders f WHERE f.parent_id = ? ORDER BY f.name, f.id"
        ))
        .bind(parent_id.to_string())
        .fetch_all(&mut *conn)
        .await?;

        into_folders(rows)
    }

    /// List every folder below `id` (not including `id` itself).
    pub async fn list_descendants(conn: &mut DbConnection, id: Uuid) -> Result<Vec<Folder>> {
        let rows: Vec<FolderRow> = sqlx::query_as(&format!(
            "WITH RECURSIVE subtree(id) AS (
                 SELECT id FROM folders WHERE parent_id = ?
                 UNION ALL
                 SELECT c.id FROM folders c JOIN subtree s ON c.parent_id = s.id
             )
             SELECT {FOLDER_COLUMNS} FROM folders f
             WHERE f.id IN (SELECT id FROM subtree)
             ORDER BY f.name, f.id"
        ))
        .bind(id.to_string())
        .fetch_all(&mut *conn)
        .await?;

        into_folders(rows)
    }

    /// Check whether a folder exists.
    pub async fn exists(conn: &mut DbConnection, id: Uuid) -> Result<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM folders WHERE id = ?)")
            .bind(id.to_string())
            .fetch_one(&mut *conn)
            .await?;
        Ok(exists)
    }

    /// Persist name, parent and visibility groups of an existing folder.
    ///
    /// Returns false if no folder has the given ID.
    pub async fn save(conn: &mut DbConnection, folder: &Folder) -> Result<bool> {
        let result = sqlx::query("UPDATE folders SET name = ?, parent_id = ? WHERE id = ?")
            .bind(&folder.name)
            .bind(folder.parent_id.map(|p| p.to_string()))
            .bind(folder.id.to_string())
            .execute(&mut *conn)
            .await?;

        if result.rows_affected() == 0 {
            return Ok(false);
        }

        Self::replace_visibility_groups(conn, folder.id, &folder.visibility_groups).await?;
        Ok(true)
    }

    /// Replace the visibility groups of a folder.
    pub async fn replace_visibility_groups(
        conn: &mut DbConnection,
        id: Uuid,
        groups: &BTreeSet<String>,
    ) -> Result<()> {
        sqlx::query("DELETE FROM folder_visibility_groups WHERE folder_id = ?")
            .bind(id.to_string())
            .execute(&mut *conn)
            .await?;

        for group in groups {
            sqlx::query("INSERT INTO folder_visibility_groups (folder_id, group_id) VALUES (?, ?)")
                .bind(id.to_string())
                .bind(group)
                .execute(&mut *conn)
                .await?;
        }
        Ok(())
    }

    /// Delete a folder by ID.
    ///
    /// Descendant folders and documents go with it through the
    /// `ON DELETE CASCADE` foreign keys.
    pub async fn delete(conn: &mut DbConnection, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM folders WHERE id = ?")
            .bind(id.to_string())
            .execute(&mut *conn)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Get the path from root to a folder.
    pub async fn get_path(conn: &mut DbConnection, id: Uuid) -> Result<Vec<Folder>> {
        let mut path = Vec::new();
        let mut current_id = Some(id);

        while let Some(folder_id) = current_id {
            if let Some(folder) = Self::get_by_id(conn, folder_id).await? {
                current_id = folder.parent_id;
                path.push(folder);
            } else {
                break;
            }
        }

        path.reverse();
        Ok(path)
    }

    /// Count direct sub-folders.
    pub async fn count_children(conn: &mut DbConnection, id: Uuid) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM folders WHERE parent_id = ?")
            .bind(id.to_string())
            .fetch_one(&mut *conn)
            .await?;
        Ok(count)
    }

    /// Count documents directly in a folder.
    pub async fn count_documents(conn: &mut DbConnection, id: Uuid) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents WHERE folder_id = ?")
            .bind(id.to_string())
            .fetch_one(&mut *conn)
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::FolioError;

    async fn setup_db() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    fn folder(name: &str, parent_id: Option<Uuid>) -> Folder {
        Folder {
            id: Uuid::new_v4(),
            name: name.to_string(),
            parent_id,
            created_at: Utc::now(),
            visibility_groups: BTreeSet::new(),
        }
    }

    #[tokio::test]
    async fn test_insert_and_get_folder() {
        let db = setup_db().await;
        let mut conn = db.pool().acquire().await.unwrap();

        let mut new = folder("Projekte", None);
        new.visibility_groups = ["BIN-T23-F1", "BIN-T23-F4"]
            .into_iter()
            .map(String::from)
            .collect();
        FolderRepository::insert(&mut conn, &new).await.unwrap();

        let found = FolderRepository::get_by_id(&mut conn, new.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.name, "Projekte");
        assert!(found.is_root());
        assert_eq!(found.visibility_groups, new.visibility_groups);
    }

    #[tokio::test]
    async fn test_get_folder_not_found() {
        let db = setup_db().await;
        let mut conn = db.pool().acquire().await.unwrap();

        let found = FolderRepository::get_by_id(&mut conn, Uuid::new_v4())
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_find_root_by_name() {
        let db = setup_db().await;
        let mut conn = db.pool().acquire().await.unwrap();

        let root = folder("root", None);
        FolderRepository::insert(&mut conn, &root).await.unwrap();
        let child = folder("root", Some(root.id));
        FolderRepository::insert(&mut conn, &child).await.unwrap();

        let found = FolderRepository::find_root_by_name(&mut conn, "root")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, root.id);
    }

    #[tokio::test]
    async fn test_list_children_ordered_by_name() {
        let db = setup_db().await;
        let mut conn = db.pool().acquire().await.unwrap();

        let parent = folder("Parent", None);
        FolderRepository::insert(&mut conn, &parent).await.unwrap();
        for name in ["b", "a", "c"] {
            FolderRepository::insert(&mut conn, &folder(name, Some(parent.id)))
                .await
                .unwrap();
        }

        let names: Vec<String> = FolderRepository::list_by_parent(&mut conn, parent.id)
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.name)
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_sibling_name_unique_constraint() {
        let db = setup_db().await;
        let mut conn = db.pool().acquire().await.unwrap();

        let parent = folder("Parent", None);
        FolderRepository::insert(&mut conn, &parent).await.unwrap();
        FolderRepository::insert(&mut conn, &folder("A", Some(parent.id)))
            .await
            .unwrap();

        let err = FolderRepository::insert(&mut conn, &folder("A", Some(parent.id)))
            .await
            .unwrap_err();
        assert!(matches!(err, FolioError::Duplicate(_)));
    }

    #[tokio::test]
    async fn test_descendants_and_path() {
        let db = setup_db().await;
        let mut conn = db.pool().acquire().await.unwrap();

        let root = folder("Root", None);
        let level1 = folder("Level1", Some(root.id));
        let level2 = folder("Level2", Some(level1.id));
        let other = folder("Other", Some(root.id));
        for f in [&root, &level1, &level2, &other] {
            FolderRepository::insert(&mut conn, f).await.unwrap();
        }

        let descendants = FolderRepository::list_descendants(&mut conn, root.id)
            .await
            .unwrap();
        assert_eq!(descendants.len(), 3);

        let under_level1 = FolderRepository::list_descendants(&mut conn, level1.id)
            .await
            .unwrap();
        assert_eq!(under_level1.len(), 1);
        assert_eq!(under_level1[0].id, level2.id);

        let path = FolderRepository::get_path(&mut conn, level2.id).await.unwrap();
        let names: Vec<&str> = path.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["Root", "Level1", "Level2"]);
    }

    #[tokio::test]
    async fn test_save_replaces_groups() {
        let db = setup_db().await;
        let mut conn = db.pool().acquire().await.unwrap();

        let mut f = folder("Course", None);
        f.visibility_groups.insert("g1".to_string());
        FolderRepository::insert(&mut conn, &f).await.unwrap();

        f.name = "Course 2".to_string();
        f.visibility_groups = ["g2".to_string()].into_iter().collect();
        assert!(FolderRepository::save(&mut conn, &f).await.unwrap());

        let found = FolderRepository::get_by_id(&mut conn, f.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.name, "Course 2");
        assert_eq!(found.visibility_groups.len(), 1);
        assert!(found.visibility_groups.contains("g2"));
    }

    #[tokio::test]
    async fn test_delete_cascades_to_descendants() {
        let db = setup_db().await;
        let mut conn = db.pool().acquire().await.unwrap();

        let root = folder("Root", None);
        let child = folder("Child", Some(root.id));
        let grandchild = folder("Grandchild", Some(child.id));
        for f in [&root, &child, &grandchild] {
            FolderRepository::insert(&mut conn, f).await.unwrap();
        }

        assert!(FolderRepository::delete(&mut conn, child.id).await.unwrap());
        assert!(!FolderRepository::exists(&mut conn, grandchild.id)
            .await
            .unwrap());
        assert!(FolderRepository::exists(&mut conn, root.id).await.unwrap());
        assert!(!FolderRepository::delete(&mut conn, child.id).await.unwrap());
    }

    #[test]
    fn test_build_forest() {
        let root = folder("root", None);
        let a = folder("a", Some(root.id));
        let a1 = folder("a1", Some(a.id));
        let b = folder("b", Some(root.id));

        let forest = FolderNode::build_forest(root.id, vec![a.clone(), a1.clone(), b.clone()]);
        assert_eq!(forest.len(), 2);
        assert_eq!(forest[0].folder.id, a.id);
        assert_eq!(forest[0].subfolders[0].folder.id, a1.id);
        assert!(forest[1].subfolders.is_empty());
        assert_eq!(forest[0].len(), 2);
    }

    #[test]
    fn test_folder_update_builder() {
        let update = FolderUpdate::new()
            .name("New Name")
            .parent_id("c12b8e51-6c40-42b6-86e9-d8cf823f4d34")
            .visibility_groups(["g1"]);

        assert_eq!(update.name, Some("New Name".to_string()));
        assert!(update.parent_id.is_some());
        assert!(!update.is_empty());
        assert!(FolderUpdate::new().is_empty());
    }
}
