//! Identifier helpers.
//!
//! Folders, documents and tags are keyed by UUID v4, stored in text form.

use uuid::Uuid;

use crate::{FolioError, Result};

/// Generate a fresh identifier.
pub fn new_id() -> Uuid {
    Uuid::new_v4()
}

/// Parse a caller-supplied identifier.
///
/// Fails with `InvalidIdentifier` carrying the offending text.
pub fn parse_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| FolioError::InvalidIdentifier(raw.to_string()))
}

/// Parse an identifier read back from the metadata store.
pub(crate) fn stored_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw)
        .map_err(|e| FolioError::Database(format!("corrupt identifier '{raw}' in store: {e}")))
}
