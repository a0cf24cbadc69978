//! Tag service.

use std::collections::BTreeSet;

use tracing::info;
use uuid::Uuid;

use super::{Tag, TagRepository};
use crate::db::Database;
use crate::file::naming::validate_name;
use crate::id::{new_id, parse_id};
use crate::{FolioError, Result};

/// Service for tag operations.
pub struct TagService<'a> {
    db: &'a Database,
}

impl<'a> TagService<'a> {
    /// Create a new TagService with the given database reference.
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Get a tag by ID.
    pub async fn get(&self, id: &str) -> Result<Tag> {
        let id = parse_id(id)?;
        let mut conn = self.db.pool().acquire().await?;
        TagRepository::get_by_id(&mut conn, id)
            .await?
            .ok_or_else(|| FolioError::NotFound(format!("tag {id}")))
    }

    /// List all tags, ordered by name.
    pub async fn list_all(&self) -> Result<Vec<Tag>> {
        let mut conn = self.db.pool().acquire().await?;
        TagRepository::list_all(&mut conn).await
    }

    /// Create a tag. Fails with `Conflict` if the name is taken.
    pub async fn create(&self, name: &str) -> Result<Tag> {
        let name = name.trim();
        validate_name(name, "tag")?;

        let mut conn = self.db.pool().acquire().await?;
        if TagRepository::get_by_name(&mut conn, name).await?.is_some() {
            return Err(name_taken(name));
        }

        let tag = Tag {
            id: new_id(),
            name: name.to_string(),
        };
        TagRepository::insert(&mut conn, &tag)
            .await
            .map_err(|e| conflict_on_duplicate(e, name))?;

        info!(tag = %tag.id, name = %tag.name, "tag created");
        Ok(tag)
    }

    /// Rename a tag.
    pub async fn update(&self, id: &str, name: &str) -> Result<Tag> {
        let id = parse_id(id)?;
        let name = name.trim();
        validate_name(name, "tag")?;

        let mut conn = self.db.pool().acquire().await?;
        if TagRepository::get_by_id(&mut conn, id).await?.is_none() {
            return Err(FolioError::NotFound(format!("tag {id}")));
        }
        if let Some(existing) = TagRepository::get_by_name(&mut conn, name).await? {
            if existing.id != id {
                return Err(name_taken(name));
            }
        }

        TagRepository::rename(&mut conn, id, name)
            .await
            .map_err(|e| conflict_on_duplicate(e, name))?;

        info!(tag = %id, name, "tag renamed");
        Ok(Tag {
            id,
            name: name.to_string(),
        })
    }

    /// Delete a tag. Documents lose the binding.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let id = parse_id(id)?;
        let mut conn = self.db.pool().acquire().await?;
        if !TagRepository::delete(&mut conn, id).await? {
            return Err(FolioError::NotFound(format!("tag {id}")));
        }

        info!(tag = %id, "tag deleted");
        Ok(())
    }

    /// Resolve tag ids, failing `NotFound` on the first unknown one.
    pub async fn resolve_all<S: AsRef<str>>(&self, ids: &[S]) -> Result<BTreeSet<Uuid>> {
        let mut conn = self.db.pool().acquire().await?;
        TagRepository::resolve_all(&mut conn, ids).await
    }
}

fn name_taken(name: &str) -> FolioError {
    FolioError::Conflict(format!("tag '{name}' already exists"))
}

fn conflict_on_duplicate(e: FolioError, name: &str) -> FolioError {
    if e.is_duplicate() {
        name_taken(name)
    } else {
        e
    }
}
