use super::{VfsAdapter, VfsKind, VfsObject};
use crate::error::{Result, SyncError};
use crate::path as vfs_path;
use crate::sync::entity::SyncEntity;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fs::{self, File};
use std::path::PathBuf;
use std::sync::Mutex;

/// Directory-backed repository adapter.
///
/// Serves a local directory as the VFS: absolute VFS paths map onto
/// paths below `root`, and repository mtimes are the filesystem's.
/// This is the adapter the binary runs against and the one the
/// contract tests exercise; an adapter speaking a real CMS protocol
/// implements the same trait.
pub struct FsVfsAdapter {
    root: PathBuf,
    /// Adapter-local metadata cache, keyed by normalized VFS path.
    /// Invalidated on every mutation, dropped by `clear_cache`.
    cache: Mutex<HashMap<String, VfsObject>>,
}

impl FsVfsAdapter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Map a VFS path onto the backing directory. Rejects anything that
    /// could escape the root.
    fn resolve(&self, vfs: &str) -> Result<PathBuf> {
        if !vfs.starts_with('/') || vfs.split('/').any(|seg| seg == "..") {
            return Err(SyncError::InvalidPath { path: vfs.to_string() });
        }
        let mut resolved = self.root.clone();
        for segment in vfs.split('/').filter(|s| !s.is_empty()) {
            resolved.push(segment);
        }
        Ok(resolved)
    }

    fn object_from_metadata(vfs: &str, metadata: &fs::Metadata) -> Result<VfsObject> {
        Ok(VfsObject {
            path: vfs_path::normalize(vfs),
            kind: if metadata.is_dir() {
                VfsKind::Folder
            } else {
                VfsKind::File
            },
            mtime: metadata.modified()?,
        })
    }

    fn cache_insert(&self, object: VfsObject) {
        self.cache.lock().unwrap().insert(object.path.clone(), object);
    }

    /// Drop the entry for `vfs` and everything below it.
    fn cache_evict(&self, vfs: &str) {
        let prefix = format!("{}/", vfs);
        self.cache
            .lock()
            .unwrap()
            .retain(|key, _| key.as_str() != vfs && !key.starts_with(&prefix));
    }
}

#[async_trait]
impl VfsAdapter for FsVfsAdapter {
    async fn is_connected(&self) -> bool {
        // A real round-trip against the backing store, not a cached flag.
        match tokio::fs::metadata(&self.root).await {
            Ok(metadata) => metadata.is_dir(),
            Err(_) => false,
        }
    }

    async fn start_session(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| SyncError::Connection {
                message: format!("cannot open VFS root {}: {}", self.root.display(), e),
            })
    }

    async fn exists(&self, vfs: &str) -> Result<bool> {
        let resolved = self.resolve(vfs)?;
        Ok(tokio::fs::metadata(&resolved).await.is_ok())
    }

    async fn get_object(&self, vfs: &str) -> Result<Option<VfsObject>> {
        let key = vfs_path::normalize(vfs);
        if let Some(cached) = self.cache.lock().unwrap().get(&key) {
            return Ok(Some(cached.clone()));
        }

        let resolved = self.resolve(&key)?;
        match tokio::fs::metadata(&resolved).await {
            Ok(metadata) => {
                let object = Self::object_from_metadata(&key, &metadata)?;
                self.cache_insert(object.clone());
                Ok(Some(object))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                Err(SyncError::PermissionDenied { path: key })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn list_children(&self, vfs: &str) -> Result<Vec<VfsObject>> {
        let key = vfs_path::normalize(vfs);
        let resolved = self.resolve(&key)?;

        let vfs = key.clone();
        let entries = tokio::task::spawn_blocking(move || -> Result<Vec<(String, fs::Metadata)>> {
            let mut entries = Vec::new();
            let read_dir = fs::read_dir(&resolved).map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => SyncError::RemoteNotFound { path: vfs.clone() },
                std::io::ErrorKind::PermissionDenied => {
                    SyncError::PermissionDenied { path: vfs.clone() }
                }
                _ => SyncError::ReadDirError {
                    path: resolved.clone(),
                    source: e,
                },
            })?;
            for entry in read_dir {
                let entry = entry.map_err(|e| SyncError::ReadDirError {
                    path: resolved.clone(),
                    source: e,
                })?;
                let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                    tracing::warn!("Skipping non-UTF-8 VFS entry in {}", resolved.display());
                    continue;
                };
                entries.push((name, entry.metadata()?));
            }
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Ok(entries)
        })
        .await
        .map_err(|e| SyncError::Io(std::io::Error::other(e.to_string())))??;

        let mut children = Vec::with_capacity(entries.len());
        for (name, metadata) in entries {
            let child_path = vfs_path::join(&key, &name);
            children.push(Self::object_from_metadata(&child_path, &metadata)?);
        }
        Ok(children)
    }

    async fn create_folder(&self, vfs: &str) -> Result<VfsObject> {
        let key = vfs_path::normalize(vfs);
        let resolved = self.resolve(&key)?;

        // create_dir_all succeeds when the folder already exists, which
        // is exactly the create-if-absent contract; a concurrent
        // duplicate call cannot error either.
        tokio::fs::create_dir_all(&resolved).await?;
        let metadata = tokio::fs::metadata(&resolved).await?;
        let object = Self::object_from_metadata(&key, &metadata)?;
        self.cache_insert(object.clone());
        Ok(object)
    }

    async fn push_file(&self, entity: &SyncEntity, resource_type: &str) -> Result<VfsObject> {
        let key = vfs_path::normalize(&entity.vfs_path);
        let resolved = self.resolve(&key)?;
        let source = entity.rfs_path.clone();
        tracing::debug!("push {} (type {})", key, resource_type);

        let vfs = key.clone();
        let object = tokio::task::spawn_blocking(move || -> Result<VfsObject> {
            if resolved.is_dir() {
                return Err(SyncError::PushFailed {
                    path: vfs,
                    cause: "a folder with this name already exists".into(),
                });
            }
            let parent = resolved.parent().ok_or_else(|| SyncError::PushFailed {
                path: vfs.clone(),
                cause: "resource has no parent folder".into(),
            })?;
            fs::create_dir_all(parent).map_err(|e| SyncError::PushFailed {
                path: vfs.clone(),
                cause: format!("cannot create parent folder: {}", e),
            })?;

            // One local handle for the duration of the transfer; closed
            // on every exit path when it drops.
            let mut local = File::open(&source).map_err(|e| SyncError::CopyError {
                path: source.clone(),
                source: e,
            })?;
            let mut staged =
                tempfile::NamedTempFile::new_in(parent).map_err(|e| SyncError::PushFailed {
                    path: vfs.clone(),
                    cause: format!("cannot stage upload: {}", e),
                })?;
            std::io::copy(&mut local, staged.as_file_mut()).map_err(|e| {
                SyncError::CopyError {
                    path: source.clone(),
                    source: e,
                }
            })?;
            staged.persist(&resolved).map_err(|e| SyncError::PushFailed {
                path: vfs.clone(),
                cause: e.to_string(),
            })?;

            let metadata = fs::metadata(&resolved)?;
            Self::object_from_metadata(&vfs, &metadata)
        })
        .await
        .map_err(|e| SyncError::Io(std::io::Error::other(e.to_string())))??;

        self.cache_insert(object.clone());
        Ok(object)
    }

    async fn pull_file(&self, entity: &SyncEntity) -> Result<()> {
        let key = vfs_path::normalize(&entity.vfs_path);
        let resolved = self.resolve(&key)?;
        let target = entity.rfs_path.clone();

        tokio::task::spawn_blocking(move || -> Result<()> {
            let parent = target.parent().ok_or_else(|| SyncError::CopyError {
                path: target.clone(),
                source: std::io::Error::other("destination has no parent directory"),
            })?;
            fs::create_dir_all(parent)?;

            let mut remote = File::open(&resolved).map_err(|e| SyncError::CopyError {
                path: resolved.clone(),
                source: e,
            })?;
            let mut staged = tempfile::NamedTempFile::new_in(parent)?;
            std::io::copy(&mut remote, staged.as_file_mut()).map_err(|e| SyncError::CopyError {
                path: target.clone(),
                source: e,
            })?;
            staged.persist(&target).map_err(|e| SyncError::CopyError {
                path: target.clone(),
                source: e.error,
            })?;
            Ok(())
        })
        .await
        .map_err(|e| SyncError::Io(std::io::Error::other(e.to_string())))?
    }

    async fn delete_resource(&self, vfs: &str) -> Result<bool> {
        let key = vfs_path::normalize(vfs);
        let resolved = self.resolve(&key)?;

        let vfs = key.clone();
        let deleted = tokio::task::spawn_blocking(move || -> Result<bool> {
            let metadata = match fs::symlink_metadata(&resolved) {
                Ok(m) => m,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
                Err(e) => return Err(e.into()),
            };
            let result = if metadata.is_dir() {
                fs::remove_dir_all(&resolved)
            } else {
                fs::remove_file(&resolved)
            };
            result.map_err(|e| SyncError::DeleteFailed {
                path: vfs,
                cause: e.to_string(),
            })?;
            Ok(true)
        })
        .await
        .map_err(|e| SyncError::Io(std::io::Error::other(e.to_string())))??;

        self.cache_evict(&key);
        Ok(deleted)
    }

    async fn clear_cache(&self) {
        self.cache.lock().unwrap().clear();
    }
}
