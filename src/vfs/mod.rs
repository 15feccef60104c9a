pub mod fs;

use crate::error::Result;
use crate::sync::entity::SyncEntity;
use async_trait::async_trait;
use std::path::Path;
use std::time::SystemTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VfsKind {
    File,
    Folder,
}

/// Metadata handle for a resource that exists on the VFS.
#[derive(Debug, Clone)]
pub struct VfsObject {
    /// Absolute, normalized VFS path.
    pub path: String,
    pub kind: VfsKind,
    /// Modification time assigned by the repository.
    pub mtime: SystemTime,
}

impl VfsObject {
    pub fn name(&self) -> &str {
        crate::path::file_name(&self.path)
    }

    pub fn is_folder(&self) -> bool {
        self.kind == VfsKind::Folder
    }
}

/// Remote repository contract.
///
/// This is the seam between the sync engine and whatever protocol the
/// CMS speaks; the engine only ever talks to this trait. Implementations
/// must be safe against a concurrent `create_folder` for the same path
/// (both callers observe a valid folder) and tolerant of recursive
/// deletes over partially deleted trees.
#[async_trait]
pub trait VfsAdapter: Send + Sync {
    /// Whether the session is currently usable. Must perform an actual
    /// round-trip against the repository, not consult a cached flag:
    /// the transport can die silently.
    async fn is_connected(&self) -> bool;

    /// (Re-)establish the session. Idempotent.
    async fn start_session(&self) -> Result<()>;

    async fn exists(&self, vfs_path: &str) -> Result<bool>;

    /// Metadata for a resource. `Ok(None)` when it does not exist;
    /// `SyncError::PermissionDenied` is a distinct failure mode and
    /// never folded into "not found".
    async fn get_object(&self, vfs_path: &str) -> Result<Option<VfsObject>>;

    /// Direct children of a VFS folder, sorted by name.
    async fn list_children(&self, vfs_path: &str) -> Result<Vec<VfsObject>>;

    /// Create a folder, returning the existing one rather than erroring
    /// when it is already present.
    async fn create_folder(&self, vfs_path: &str) -> Result<VfsObject>;

    /// Write the entity's local file content to the VFS, creating or
    /// replacing per `entity.replace_existing`. Returns the remote file
    /// with its repository-assigned mtime; failures surface as
    /// `SyncError::PushFailed` with a human-readable cause.
    async fn push_file(&self, entity: &SyncEntity, resource_type: &str) -> Result<VfsObject>;

    /// Stream remote content into the local file referenced by the
    /// entity, creating parent directories as needed.
    async fn pull_file(&self, entity: &SyncEntity) -> Result<()>;

    /// Remove a resource, recursively for folders. Returns false when
    /// there was nothing to delete.
    async fn delete_resource(&self, vfs_path: &str) -> Result<bool>;

    /// Drop any adapter-local metadata cache so a fresh analysis
    /// observes current server state.
    async fn clear_cache(&self);
}

/// CMS resource type recorded with every pushed file, detected from the
/// file extension.
pub fn resource_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("jpg" | "jpeg" | "png" | "gif" | "bmp" | "svg" | "webp" | "ico") => "image",
        Some("jsp") => "jsp",
        Some(
            "txt" | "html" | "htm" | "css" | "js" | "json" | "xml" | "xsd" | "xsl" | "csv"
            | "properties" | "md",
        ) => "plain",
        _ => "binary",
    }
}
