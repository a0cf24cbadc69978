//! Document metadata types and repository.
//!
//! Only metadata lives here. Payload bytes are kept in the object store
//! under the document id.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::db::DbConnection;
use crate::id::stored_id;
use crate::Result;

/// Media type used when neither the caller nor the file name says otherwise.
pub const DEFAULT_MEDIA_TYPE: &str = "application/octet-stream";

const DOCUMENT_COLUMNS: &str = "d.id, d.folder_id, d.name, d.media_type, d.size, d.owner_id,
    d.download_url, d.created_at,
    (SELECT group_concat(t.tag_id) FROM document_tags t WHERE t.document_id = d.id) AS tag_ids";

/// Metadata for a stored document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Document {
    /// Unique document ID, also the object store key.
    pub id: Uuid,
    /// Folder this document belongs to.
    pub folder_id: Uuid,
    /// Display name, unique within the folder.
    pub name: String,
    /// Media type of the payload.
    pub media_type: String,
    /// Payload size in bytes.
    pub size: i64,
    /// Caller that uploaded the document.
    pub owner_id: Option<String>,
    /// Where the payload can be downloaded.
    pub download_url: String,
    /// When the document was uploaded.
    pub created_at: DateTime<Utc>,
    /// Tags bound to the document.
    pub tag_ids: BTreeSet<Uuid>,
}

#[derive(Debug, sqlx::FromRow)]
struct DocumentRow {
    id: String,
    folder_id: String,
    name: String,
    media_type: String,
    size: i64,
    owner_id: Option<String>,
    download_url: String,
    created_at: DateTime<Utc>,
    tag_ids: Option<String>,
}

impl DocumentRow {
    fn into_document(self) -> Result<Document> {
        let tag_ids = match self.tag_ids {
            Some(joined) => joined
                .split(',')
                .map(stored_id)
                .collect::<Result<BTreeSet<_>>>()?,
            None => BTreeSet::new(),
        };

        Ok(Document {
            id: stored_id(&self.id)?,
            folder_id: stored_id(&self.folder_id)?,
            name: self.name,
            media_type: self.media_type,
            size: self.size,
            owner_id: self.owner_id,
            download_url: self.download_url,
            created_at: self.created_at,
            tag_ids,
        })
    }
}

fn into_documents(rows: Vec<DocumentRow>) -> Result<Vec<Document>> {
    rows.into_iter().map(DocumentRow::into_document).collect()
}

/// An uploaded file: original name, media type and payload.
#[derive(Debug, Clone)]
pub struct Upload {
    /// Original file name.
    pub name: String,
    /// Declared media type, if the client sent one.
    pub media_type: Option<String>,
    /// Payload bytes.
    pub bytes: Vec<u8>,
}

impl Upload {
    /// Create a new Upload.
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            media_type: None,
            bytes: bytes.into(),
        }
    }

    /// Set the declared media type.
    pub fn with_media_type(mut self, media_type: impl Into<String>) -> Self {
        self.media_type = Some(media_type.into());
        self
    }

    /// The declared media type, or one guessed from the file name.
    pub fn effective_media_type(&self) -> String {
        match self.media_type.as_deref().map(str::trim) {
            Some(declared) if !declared.is_empty() => declared.to_string(),
            _ => mime_guess::from_path(&self.name)
                .first_raw()
                .unwrap_or(DEFAULT_MEDIA_TYPE)
                .to_string(),
        }
    }
}

/// Patch for updating document metadata.
#[derive(Debug, Clone, Default)]
pub struct DocumentUpdate {
    /// New name.
    pub name: Option<String>,
    /// New owning folder ID.
    pub folder_id: Option<String>,
    /// New media type.
    pub media_type: Option<String>,
    /// Replacement tag IDs.
    pub tag_ids: Option<Vec<String>>,
}

impl DocumentUpdate {
    /// Create a new DocumentUpdate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the owning folder ID.
    pub fn folder_id(mut self, folder_id: impl Into<String>) -> Self {
        self.folder_id = Some(folder_id.into());
        self
    }

    /// Set the media type.
    pub fn media_type(mut self, media_type: impl Into<String>) -> Self {
        self.media_type = Some(media_type.into());
        self
    }

    /// Replace the tag list.
    pub fn tag_ids<I, S>(mut self, tag_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tag_ids = Some(tag_ids.into_iter().map(Into::into).collect());
        self
    }

    /// Check if any fields are set.
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.folder_id.is_none()
            && self.media_type.is_none()
            && self.tag_ids.is_none()
    }
}

/// Repository for document metadata operations.
pub struct DocumentRepository;

impl DocumentRepository {
    /// Insert a document record and its tag bindings.
    pub async fn insert(conn: &mut DbConnection, document: &Document) -> Result<()> {
        sqlx::query(
            "INSERT INTO documents
                 (id, folder_id, name, media_type, size, owner_id, download_url, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(document.id.to_string())
        .bind(document.folder_id.to_string())
        .bind(&document.name)
        .bind(&document.media_type)
        .bind(document.size)
        .bind(&document.owner_id)
        .bind(&document.download_url)
        .bind(document.created_at)
        .execute(&mut *conn)
        .await?;

        Self::replace_tags(conn, document.id, &document.tag_ids).await
    }

    /// Get a document by ID.
    pub async fn get_by_id(conn: &mut DbConnection, id: Uuid) -> Result<Option<Document>> {
        let row: Option<DocumentRow> =
            sqlx::query_as(&format!("SELECT {DOCUMENT_COLUMNS} FROM documents d WHERE d.id = ?"))
                .bind(id.to_string())
                .fetch_optional(&mut *conn)
                .await?;

        row.map(DocumentRow::into_document).transpose()
    }

    /// List documents in a folder, ordered by name.
    pub async fn list_by_folder(conn: &mut DbConnection, folder_id: Uuid) -> Result<Vec<Document>> {
        let rows: Vec<DocumentRow> = sqlx::query_as(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents d WHERE d.folder_id = ? ORDER BY d.name, d.id"
        ))
        .bind(folder_id.to_string())
        .fetch_all(&mut *conn)
        .await?;

        into_documents(rows)
    }

    /// List documents uploaded by an owner (newest first).
    pub async fn list_by_owner(conn: &mut DbConnection, owner_id: &str) -> Result<Vec<Document>> {
        let rows: Vec<DocumentRow> = sqlx::query_as(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents d WHERE d.owner_id = ?
             ORDER BY d.created_at DESC, d.id DESC"
        ))
        .bind(owner_id)
        .fetch_all(&mut *conn)
        .await?;

        into_documents(rows)
    }

    /// IDs of every document in a folder or any of its descendants.
    pub async fn list_ids_in_subtree(conn: &mut DbConnection, folder_id: Uuid) -> Result<Vec<Uuid>> {
        let ids: Vec<String> = sqlx::query_scalar(
            "WITH RECURSIVE subtree(id) AS (
                 SELECT ?
                 UNION ALL
                 SELECT c.id FROM folders c JOIN subtree s ON c.parent_id = s.id
             )
             SELECT d.id FROM documents d
             WHERE d.folder_id IN (SELECT id FROM subtree)
             ORDER BY d.id",
        )
        .bind(folder_id.to_string())
        .fetch_all(&mut *conn)
        .await?;

        ids.iter().map(|id| stored_id(id)).collect()
    }

    /// Persist the mutable fields and tag bindings of an existing document.
    ///
    /// Returns false if no document has the given ID.
    pub async fn save(conn: &mut DbConnection, document: &Document) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE documents SET folder_id = ?, name = ?, media_type = ?, size = ? WHERE id = ?",
        )
        .bind(document.folder_id.to_string())
        .bind(&document.name)
        .bind(&document.media_type)
        .bind(document.size)
        .bind(document.id.to_string())
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(false);
        }

        Self::replace_tags(conn, document.id, &document.tag_ids).await?;
        Ok(true)
    }

    /// Replace every tag binding of a document.
    pub async fn replace_tags(
        conn: &mut DbConnection,
        id: Uuid,
        tag_ids: &BTreeSet<Uuid>,
    ) -> Result<()> {
        sqlx::query("DELETE FROM document_tags WHERE document_id = ?")
            .bind(id.to_string())
            .execute(&mut *conn)
            .await?;

        for tag_id in tag_ids {
            sqlx::query("INSERT INTO document_tags (document_id, tag_id) VALUES (?, ?)")
                .bind(id.to_string())
                .bind(tag_id.to_string())
                .execute(&mut *conn)
                .await?;
        }
        Ok(())
    }

    /// Delete a document record. Tag bindings go with it.
    pub async fn delete(conn: &mut DbConnection, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(id.to_string())
            .execute(&mut *conn)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
