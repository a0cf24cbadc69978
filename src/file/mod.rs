//! Document tree for Folio.
//!
//! This module provides the folder/document hierarchy:
//! - Folder and document metadata in the relational store
//! - Payloads in a separate object store keyed by document id
//! - Collision-free naming among siblings
//! - Cohort-based folder visibility
//! - PDF conversion of office documents

pub mod conversion;
mod document;
mod folder;
mod manager;
pub mod naming;
pub mod storage;
pub mod visibility;

pub use conversion::{ConvertedDocument, DocumentConverter, OfficeConverter, SourceFormat};
pub use document::{Document, DocumentRepository, DocumentUpdate, Upload};
pub use folder::{Folder, FolderNode, FolderRepository, FolderUpdate, NewFolder};
pub use manager::{FolderContents, HierarchyManager, ManagerSettings};
pub use storage::{FileStorage, MemoryStorage, ObjectStore};
pub use visibility::{filter_tree, is_visible, Access, Caller};

/// Maximum length for folder, document and tag names (in characters).
pub const MAX_NAME_LENGTH: usize = 255;

/// Name of the parentless root folder.
pub const ROOT_FOLDER_NAME: &str = "root";

/// Folder id token that addresses the root folder.
pub const ROOT_TOKEN: &str = "root";
