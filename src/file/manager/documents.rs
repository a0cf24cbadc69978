//! Document operations.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{load_folder, retry_on_duplicate, HierarchyManager};
use crate::db::DbConnection;
use crate::file::conversion::{pdf_file_name, ConvertedDocument, SourceFormat};
use crate::file::document::{Document, DocumentRepository, DocumentUpdate, Upload};
use crate::file::naming::{resolve_name, sibling_names, validate_name};
use crate::file::visibility::Caller;
use crate::id::{new_id, parse_id};
use crate::tag::TagRepository;
use crate::{FolioError, Result};

impl HierarchyManager {
    // ========== Read Operations ==========

    /// Get document metadata.
    pub async fn get_document(&self, id: &str) -> Result<Document> {
        let id = parse_id(id)?;
        let mut conn = self.db.pool().acquire().await?;
        Self::existing_document(&mut conn, id).await
    }

    /// Get a document's payload bytes.
    pub async fn get_payload(&self, id: &str) -> Result<Vec<u8>> {
        let document = self.get_document(id).await?;
        self.store.get(document.id)
    }

    /// Get metadata and payload together.
    pub async fn download(&self, id: &str) -> Result<(Document, Vec<u8>)> {
        let document = self.get_document(id).await?;
        let bytes = self.store.get(document.id)?;
        debug!(document = %document.id, size = bytes.len(), "payload loaded");
        Ok((document, bytes))
    }

    /// List documents uploaded by `owner_id`, newest first.
    pub async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Document>> {
        let mut conn = self.db.pool().acquire().await?;
        DocumentRepository::list_by_owner(&mut conn, owner_id).await
    }

    // ========== Write Operations ==========

    /// Store an uploaded file as a new document in `folder_id`.
    ///
    /// The payload is written before the metadata is committed. If the
    /// metadata cannot be committed the payload is removed again.
    pub async fn create_document<S: AsRef<str>>(
        &self,
        upload: &Upload,
        folder_id: &str,
        tag_ids: &[S],
        caller: &Caller,
    ) -> Result<Document> {
        let name = upload.name.trim();
        validate_name(name, "document")?;
        let size = upload.bytes.len() as u64;
        if size > self.settings.max_upload_bytes {
            return Err(FolioError::Validation(format!(
                "document '{name}' is {size} bytes, the limit is {} bytes",
                self.settings.max_upload_bytes
            )));
        }

        let (folder_id, tags) = {
            let mut conn = self.db.pool().acquire().await?;
            let folder = load_folder(&mut conn, folder_id).await?;
            let tags = TagRepository::resolve_all(&mut conn, tag_ids).await?;
            (folder.id, tags)
        };

        let id = new_id();
        self.store
            .put(id, &upload.bytes)
            .map_err(|e| FolioError::UploadFailure {
                name: name.to_string(),
                reason: e.to_string(),
            })?;

        let media_type = upload.effective_media_type();
        let tags = &tags;
        let media_type = media_type.as_str();
        let owner = caller.id.as_deref();
        let result = retry_on_duplicate(self.settings.name_retries, "document", move || {
            self.try_insert_document(id, name, media_type, size as i64, owner, folder_id, tags)
        })
        .await;

        match result {
            Ok(document) => {
                info!(
                    document = %document.id,
                    name = %document.name,
                    folder = %folder_id,
                    size,
                    "document created"
                );
                Ok(document)
            }
            Err(e) => {
                if let Err(cleanup) = self.store.delete(id) {
                    warn!(document = %id, "orphaned payload after failed create: {cleanup}");
                }
                Err(e)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn try_insert_document(
        &self,
        id: Uuid,
        name: &str,
        media_type: &str,
        size: i64,
        owner: Option<&str>,
        folder_id: Uuid,
        tags: &BTreeSet<Uuid>,
    ) -> Result<Document> {
        let mut tx = self.db.begin().await?;

        let siblings = DocumentRepository::list_by_folder(&mut tx, folder_id).await?;
        let taken = sibling_names(siblings.iter().map(|d| (d.id, d.name.as_str())), None);
        let resolved = resolve_name(name, &taken);
        validate_name(&resolved, "document")?;
        if resolved != name {
            debug!(requested = name, resolved = %resolved, "document name collision resolved");
        }

        let document = Document {
            id,
            folder_id,
            name: resolved,
            media_type: media_type.to_string(),
            size,
            owner_id: owner.map(str::to_string),
            download_url: self.download_url(id),
            created_at: Utc::now(),
            tag_ids: tags.clone(),
        };
        // A folder deleted since it was looked up fails the foreign key here.
        DocumentRepository::insert(&mut tx, &document).await?;
        tx.commit().await?;
        Ok(document)
    }

    /// Rename, move, retype or retag a document.
    ///
    /// Renames and moves re-resolve the name among the destination folder's
    /// documents, excluding the document itself.
    pub async fn update_document(&self, id: &str, update: &DocumentUpdate) -> Result<Document> {
        let id = parse_id(id)?;
        let name = update.name.as_deref().map(str::trim);
        if let Some(name) = name {
            validate_name(name, "document")?;
        }
        let media_type = update.media_type.as_deref().map(str::trim);
        if media_type.is_some_and(str::is_empty) {
            return Err(FolioError::Validation(
                "media type must not be empty".to_string(),
            ));
        }

        retry_on_duplicate(self.settings.name_retries, "document", move || {
            self.try_update_document(id, name, media_type, update)
        })
        .await
    }

    async fn try_update_document(
        &self,
        id: Uuid,
        name: Option<&str>,
        media_type: Option<&str>,
        update: &DocumentUpdate,
    ) -> Result<Document> {
        let mut tx = self.db.begin().await?;
        let mut document = Self::existing_document(&mut tx, id).await?;

        let mut target_folder = document.folder_id;
        if let Some(folder) = update.folder_id.as_deref() {
            target_folder = load_folder(&mut tx, folder).await?.id;
        }
        if let Some(tag_ids) = &update.tag_ids {
            document.tag_ids = TagRepository::resolve_all(&mut tx, tag_ids.as_slice()).await?;
        }

        let moved = target_folder != document.folder_id;
        if name.is_some() || moved {
            let candidate = name.unwrap_or(&document.name);
            let siblings = DocumentRepository::list_by_folder(&mut tx, target_folder).await?;
            let taken = sibling_names(
                siblings.iter().map(|d| (d.id, d.name.as_str())),
                Some(document.id),
            );
            let resolved = resolve_name(candidate, &taken);
            validate_name(&resolved, "document")?;
            document.name = resolved;
        }

        document.folder_id = target_folder;
        if let Some(media_type) = media_type {
            document.media_type = media_type.to_string();
        }

        DocumentRepository::save(&mut tx, &document).await?;
        tx.commit().await?;

        info!(document = %document.id, name = %document.name, moved, "document updated");
        Ok(document)
    }

    /// Delete a document: payload first, then metadata.
    ///
    /// If the payload cannot be removed the metadata is left in place and
    /// the call can be retried.
    pub async fn delete_document(&self, id: &str) -> Result<()> {
        let id = parse_id(id)?;
        {
            let mut conn = self.db.pool().acquire().await?;
            Self::existing_document(&mut conn, id).await?;
        }

        if let Err(e) = self.store.delete(id) {
            error!(document = %id, "payload delete failed, keeping metadata: {e}");
            return Err(e);
        }

        let mut conn = self.db.pool().acquire().await?;
        if !DocumentRepository::delete(&mut conn, id).await? {
            debug!(document = %id, "metadata already removed");
        }

        info!(document = %id, "document deleted");
        Ok(())
    }

    // ========== Conversion ==========

    /// Render a document as PDF.
    ///
    /// PDFs are returned unchanged. Formats outside the registry fail with
    /// `ConversionUnsupported`.
    pub async fn convert_document(&self, id: &str) -> Result<ConvertedDocument> {
        let (document, bytes) = self.download(id).await?;
        let file_name = pdf_file_name(&document.name);

        let extension = match SourceFormat::detect(&document.media_type, &document.name) {
            Some(SourceFormat::Pdf) => return Ok(ConvertedDocument { file_name, bytes }),
            Some(SourceFormat::Convertible(extension)) => extension,
            None => {
                return Err(FolioError::ConversionUnsupported(document.media_type));
            }
        };

        let converter = Arc::clone(&self.converter);
        let pdf = tokio::task::spawn_blocking(move || converter.convert_to_pdf(&bytes, extension))
            .await
            .map_err(|e| FolioError::ConversionFailed(format!("conversion task failed: {e}")))??;

        info!(document = %document.id, extension, size = pdf.len(), "document converted to PDF");
        Ok(ConvertedDocument {
            file_name,
            bytes: pdf,
        })
    }

    async fn existing_document(conn: &mut DbConnection, id: Uuid) -> Result<Document> {
        DocumentRepository::get_by_id(conn, id)
            .await?
            .ok_or_else(|| FolioError::NotFound(format!("document {id}")))
    }
}
