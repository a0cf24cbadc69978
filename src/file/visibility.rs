//! Cohort-based folder visibility.
//!
//! A folder with an empty visibility-group set is visible to everyone.
//! Otherwise only callers whose cohort is in the set can see it. Elevated
//! callers bypass the filter entirely.

use tracing::debug;

use super::folder::{Folder, FolderNode};

/// What a caller is allowed to see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Sees every folder regardless of visibility groups.
    Elevated,
    /// Sees only public folders and folders shared with their cohort.
    Cohort,
}

/// The identity a hierarchy operation runs on behalf of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    /// Caller id, stamped as document owner.
    pub id: Option<String>,
    /// Caller cohort (group id), if any.
    pub cohort: Option<String>,
    /// Access capability.
    pub access: Access,
}

impl Caller {
    /// An elevated caller.
    pub fn elevated(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            cohort: None,
            access: Access::Elevated,
        }
    }

    /// A cohort-scoped caller.
    pub fn member(id: impl Into<String>, cohort: Option<String>) -> Self {
        Self {
            id: Some(id.into()),
            cohort,
            access: Access::Cohort,
        }
    }

    /// A caller with no identity and no cohort. Sees only public folders.
    pub fn anonymous() -> Self {
        Self {
            id: None,
            cohort: None,
            access: Access::Cohort,
        }
    }

    /// Build a caller from its roles.
    ///
    /// The caller is elevated if any of `roles` is in `elevated_roles`
    /// (compared case-insensitively).
    pub fn from_roles<S: AsRef<str>>(
        id: Option<String>,
        cohort: Option<String>,
        roles: &[S],
        elevated_roles: &[String],
    ) -> Self {
        let elevated = roles.iter().any(|role| {
            elevated_roles
                .iter()
                .any(|e| e.eq_ignore_ascii_case(role.as_ref()))
        });

        Self {
            id,
            cohort,
            access: if elevated {
                Access::Elevated
            } else {
                Access::Cohort
            },
        }
    }

    /// Whether the caller bypasses visibility filtering.
    pub fn is_elevated(&self) -> bool {
        self.access == Access::Elevated
    }

    /// Apply the visibility filter unless the caller is elevated.
    pub fn filter(&self, nodes: Vec<FolderNode>) -> Vec<FolderNode> {
        if self.is_elevated() {
            return nodes;
        }
        filter_tree(nodes, self.cohort.as_deref())
    }
}

/// Whether `folder` is visible to a caller in `cohort`.
pub fn is_visible(folder: &Folder, cohort: Option<&str>) -> bool {
    if folder.visibility_groups.is_empty() {
        return true;
    }
    cohort.is_some_and(|c| folder.visibility_groups.contains(c))
}

/// Drop every folder `cohort` cannot see, together with its whole subtree.
///
/// Visible folders have their own sub-folders filtered recursively.
pub fn filter_tree(nodes: Vec<FolderNode>, cohort: Option<&str>) -> Vec<FolderNode> {
    nodes
        .into_iter()
        .filter_map(|node| {
            if !is_visible(&node.folder, cohort) {
                debug!(folder = %node.folder.id, hidden = node.len(), "hiding folder subtree");
                return None;
            }
            let FolderNode { folder, subfolders } = node;
            Some(FolderNode {
                folder,
                subfolders: filter_tree(subfolders, cohort),
            })
        })
        .collect()
}
