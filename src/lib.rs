//! Folio - hierarchical document store.
//!
//! Folders form a tree, each folder holds documents and sub-folders, and
//! document payloads live in an object store separate from their metadata.

pub mod config;
pub mod db;
pub mod error;
pub mod file;
pub mod id;
pub mod logging;
pub mod tag;

pub use config::{Config, DeletePolicy};
pub use db::Database;
pub use error::{FolioError, Result};
pub use file::{
    Access, Caller, ConvertedDocument, Document, DocumentUpdate, FileStorage, Folder,
    FolderContents, FolderNode, FolderUpdate, HierarchyManager, ManagerSettings, MemoryStorage,
    NewFolder, ObjectStore, Upload,
};
pub use id::{new_id, parse_id};
pub use tag::{Tag, TagService};
