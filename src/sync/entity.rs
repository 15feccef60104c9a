use crate::config::CmsModule;
use crate::vfs::VfsObject;
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Resource kind. A 2-way switch, not a hierarchy: file and folder
/// entities share every field and differ only in how the executor
/// carries them out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SyncKind {
    File,
    Folder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    /// Transfer local content to the VFS.
    Push,
    /// Transfer VFS content to the local tree.
    Pull,
    /// Remove the local copy (VFS is authoritative and lacks it).
    DeleteRfs,
    /// Remove the VFS copy (local tree is authoritative and lacks it).
    DeleteVfs,
}

impl fmt::Display for SyncAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SyncAction::Push => "PUSH",
            SyncAction::Pull => "PULL",
            SyncAction::DeleteRfs => "DELETE_RFS",
            SyncAction::DeleteVfs => "DELETE_VFS",
        };
        f.write_str(s)
    }
}

/// One planned action, produced by the analyzer and consumed by the
/// executor exactly once. Identity is `(vfs_path, kind)`.
#[derive(Debug, Clone)]
pub struct SyncEntity {
    pub kind: SyncKind,
    /// Absolute, normalized VFS path.
    pub vfs_path: String,
    pub rfs_path: PathBuf,
    pub action: SyncAction,
    /// Whether a counterpart already existed at the action's
    /// destination. Drives the adapter's create-vs-update choice and
    /// the report labels.
    pub replace_existing: bool,
    pub module: Arc<CmsModule>,
    /// Remote handle, set only when the resource already existed on the
    /// VFS at analysis time.
    pub remote: Option<VfsObject>,
}

impl SyncEntity {
    pub fn identity(&self) -> (&str, SyncKind) {
        (&self.vfs_path, self.kind)
    }

    /// User-facing label for report lines.
    pub fn label(&self) -> &'static str {
        match self.action {
            SyncAction::DeleteRfs | SyncAction::DeleteVfs => "obsolete",
            _ if self.replace_existing => "changed",
            _ => "new",
        }
    }
}

impl PartialEq for SyncEntity {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for SyncEntity {}

/// Ordered action list. Pre-order: a folder entity precedes all of its
/// descendants. Insertion order is meaningful and duplicates (same
/// vfs_path and kind) are rejected.
#[derive(Debug, Default)]
pub struct SyncList {
    entries: Vec<SyncEntity>,
    seen: HashSet<(String, SyncKind)>,
}

impl SyncList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entity. Returns false (and keeps the list unchanged)
    /// when an entity with the same identity is already queued, which
    /// happens when selected roots overlap.
    pub fn push(&mut self, entity: SyncEntity) -> bool {
        let key = (entity.vfs_path.clone(), entity.kind);
        if !self.seen.insert(key) {
            tracing::debug!("Duplicate sync entity skipped: {}", entity.vfs_path);
            return false;
        }
        self.entries.push(entity);
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SyncEntity> {
        self.entries.iter()
    }
}

impl IntoIterator for SyncList {
    type Item = SyncEntity;
    type IntoIter = std::vec::IntoIter<SyncEntity>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
