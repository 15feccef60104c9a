use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Repository connection failed: {message}\nCheck that the VFS root is reachable and try again.")]
    Connection { message: String },

    #[error("Permission denied on VFS resource: {path}\nCheck the repository account's read permissions.")]
    PermissionDenied { path: String },

    #[error("VFS resource not found: {path}")]
    RemoteNotFound { path: String },

    #[error("Failed to push {path}\nCause: {cause}\nA resource with a conflicting name or type may already exist on the VFS.")]
    PushFailed { path: String, cause: String },

    #[error("Failed to delete {path}\nCause: {cause}\nSome descendants may have been removed before the failure.")]
    DeleteFailed { path: String, cause: String },

    #[error("Failed to read directory: {path}\nCause: {source}\nCheck that the directory exists and you have read permissions.")]
    ReadDirError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to transfer file: {path}\nCause: {source}\nCheck disk space and write permissions on the destination.")]
    CopyError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid VFS path: {path}\nVFS paths must be absolute, '/'-separated and must not contain '..' segments.")]
    InvalidPath { path: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Sync cancelled")]
    Cancelled,
}

impl SyncError {
    /// Connection loss and cancellation abort the whole run; every other
    /// failure is handled per resource.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SyncError::Connection { .. } | SyncError::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
