//! Tag repository.

use std::collections::BTreeSet;

use uuid::Uuid;

use super::Tag;
use crate::db::DbConnection;
use crate::id::{parse_id, stored_id};
use crate::{FolioError, Result};

#[derive(Debug, sqlx::FromRow)]
struct TagRow {
    id: String,
    name: String,
}

impl TagRow {
    fn into_tag(self) -> Result<Tag> {
        Ok(Tag {
            id: stored_id(&self.id)?,
            name: self.name,
        })
    }
}

/// Repository for tag operations.
pub struct TagRepository;

impl TagRepository {
    /// Insert a tag.
    pub async fn insert(conn: &mut DbConnection, tag: &Tag) -> Result<()> {
        sqlx::query("INSERT INTO tags (id, name) VALUES (?, ?)")
            .bind(tag.id.to_string())
            .bind(&tag.name)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    /// Get a tag by ID.
    pub async fn get_by_id(conn: &mut DbConnection, id: Uuid) -> Result<Option<Tag>> {
        let row: Option<TagRow> = sqlx::query_as("SELECT id, name FROM tags WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&mut *conn)
            .await?;

        row.map(TagRow::into_tag).transpose()
    }

    /// Get a tag by name.
    pub async fn get_by_name(conn: &mut DbConnection, name: &str) -> Result<Option<Tag>> {
        let row: Option<TagRow> = sqlx::query_as("SELECT id, name FROM tags WHERE name = ?")
            .bind(name)
            .fetch_optional(&mut *conn)
            .await?;

        row.map(TagRow::into_tag).transpose()
    }

    /// List all tags, ordered by name.
    pub async fn list_all(conn: &mut DbConnection) -> Result<Vec<Tag>> {
        let rows: Vec<TagRow> = sqlx::query_as("SELECT id, name FROM tags ORDER BY name")
            .fetch_all(&mut *conn)
            .await?;

        rows.into_iter().map(TagRow::into_tag).collect()
    }

    /// Rename a tag. Returns false if no tag has the given ID.
    pub async fn rename(conn: &mut DbConnection, id: Uuid, name: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE tags SET name = ? WHERE id = ?")
            .bind(name)
            .bind(id.to_string())
            .execute(&mut *conn)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete a tag. Document bindings go with it.
    pub async fn delete(conn: &mut DbConnection, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM tags WHERE id = ?")
            .bind(id.to_string())
            .execute(&mut *conn)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Resolve caller-supplied tag ids.
    ///
    /// Every id must be well-formed and name an existing tag; the first one
    /// that does not fails the whole call.
    pub async fn resolve_all<S: AsRef<str>>(
        conn: &mut DbConnection,
        ids: &[S],
    ) -> Result<BTreeSet<Uuid>> {
        let mut resolved = BTreeSet::new();
        for raw in ids {
            let id = parse_id(raw.as_ref())?;
            if resolved.contains(&id) {
                continue;
            }
            let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM tags WHERE id = ?)")
                .bind(id.to_string())
                .fetch_one(&mut *conn)
                .await?;
            if !exists {
                return Err(FolioError::NotFound(format!("tag {id}")));
            }
            resolved.insert(id);
        }
        Ok(resolved)
    }
}
