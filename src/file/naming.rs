//! Collision-free naming within a sibling set.
//!
//! Names that collide with a sibling get a ` (n)` counter inserted between
//! the stem and the extension: `report.pdf` becomes `report (1).pdf`, then
//! `report (2).pdf`, and so on. A leading dot (`.env`) is part of the stem.

use std::collections::HashSet;

use uuid::Uuid;

use super::MAX_NAME_LENGTH;
use crate::{FolioError, Result};

/// Resolve `candidate` against the names already present among its siblings.
///
/// Returns `candidate` unchanged when it does not collide. Otherwise returns
/// the first `stem (n)ext` with `n = 1, 2, ...` that is not taken.
pub fn resolve_name(candidate: &str, siblings: &HashSet<String>) -> String {
    if !siblings.contains(candidate) {
        return candidate.to_string();
    }

    let (stem, ext) = split_extension(candidate);
    let mut counter: u64 = 1;
    loop {
        let name = format!("{stem} ({counter}){ext}");
        if !siblings.contains(&name) {
            return name;
        }
        counter += 1;
    }
}

/// Split a name at its last dot. The extension keeps the dot.
///
/// A dot at index 0 does not start an extension.
pub fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if idx > 0 => name.split_at(idx),
        _ => (name, ""),
    }
}

/// Collect the names of siblings, skipping the entity being renamed or moved.
pub fn sibling_names<'a, I>(siblings: I, exclude: Option<Uuid>) -> HashSet<String>
where
    I: IntoIterator<Item = (Uuid, &'a str)>,
{
    siblings
        .into_iter()
        .filter(|(id, _)| Some(*id) != exclude)
        .map(|(_, name)| name.to_string())
        .collect()
}

/// Validate a folder, document or tag name.
///
/// Names must be non-blank and at most `MAX_NAME_LENGTH` characters.
pub fn validate_name(name: &str, what: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(FolioError::Validation(format!("{what} name must not be empty")));
    }
    let len = name.chars().count();
    if len > MAX_NAME_LENGTH {
        return Err(FolioError::Validation(format!(
            "{what} name must be at most {MAX_NAME_LENGTH} characters (got {len})"
        )));
    }
    Ok(())
}
