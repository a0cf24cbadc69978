//! Tags for Folio.
//!
//! Tags are free-standing labels with unique names. Documents reference
//! zero or more tags; tags do not belong to the folder tree.

mod repository;
mod service;

use serde::Serialize;
use uuid::Uuid;

pub use repository::TagRepository;
pub use service::TagService;

/// A document tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tag {
    /// Unique tag ID.
    pub id: Uuid,
    /// Unique tag name.
    pub name: String,
}
