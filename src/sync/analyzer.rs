use crate::config::{CmsModule, SyncMode};
use crate::error::{Result, SyncError};
use crate::ignore;
use crate::path as vfs_path;
use crate::sync::entity::{SyncAction, SyncEntity, SyncKind, SyncList};
use crate::sync::progress::{CancelFlag, ProgressSink};
use crate::vfs::{VfsAdapter, VfsObject};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Transient walk mode for one step of the tree walk, never persisted.
/// `Push` marks a subtree already known to be local-only, so no remote
/// existence check is made for it. The opposite one-sided case (remote
/// only, walked in the pull direction) is the `Work::Remote` arm, which
/// carries the known remote object instead of a mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FolderSyncMode {
    Auto,
    Push,
}

/// Where a walk begins.
#[derive(Debug, Clone)]
pub enum StartPoint {
    /// A local path bound to a module (usually the module root).
    Local {
        module: Arc<CmsModule>,
        rfs_path: PathBuf,
    },
    /// A VFS resource known not to exist locally yet.
    Remote {
        module: Arc<CmsModule>,
        vfs_path: String,
    },
}

impl StartPoint {
    pub fn module_root(module: &Arc<CmsModule>) -> Self {
        StartPoint::Local {
            module: Arc::clone(module),
            rfs_path: module.rfs_root.clone(),
        }
    }
}

/// Result of one analysis run.
#[derive(Debug)]
pub struct Analysis {
    pub list: SyncList,
    pub warnings: Vec<String>,
    /// Names of modules with at least one queued entity, sorted.
    pub modules: Vec<String>,
}

/// One unit of walk work. The stack is processed LIFO; children are
/// pushed in reverse so siblings come out in name order and every
/// folder precedes its descendants.
#[derive(Debug)]
enum Work {
    /// A resource that exists locally. `mode` is `Auto` or `Push`.
    Local {
        module: Arc<CmsModule>,
        rfs: PathBuf,
        vfs: String,
        mode: FolderSyncMode,
    },
    /// A remote-only resource being classified in the pull direction;
    /// the local side is known absent, no remote existence check needed.
    Remote {
        module: Arc<CmsModule>,
        object: VfsObject,
        rfs: PathBuf,
    },
}

/// Walks the selected roots, compares local and remote children and
/// classifies every resource into a sync action. All state (the visited
/// set in particular) is scoped to one `analyze` call.
pub struct Analyzer<'a> {
    adapter: &'a dyn VfsAdapter,
    cancel: &'a CancelFlag,
    visited: HashSet<String>,
    list: SyncList,
    warnings: Vec<String>,
    touched: HashSet<String>,
}

impl<'a> Analyzer<'a> {
    pub fn new(adapter: &'a dyn VfsAdapter, cancel: &'a CancelFlag) -> Self {
        Self {
            adapter,
            cancel,
            visited: HashSet::new(),
            list: SyncList::new(),
            warnings: Vec::new(),
            touched: HashSet::new(),
        }
    }

    /// Run the walk. On cancellation the whole analysis is discarded and
    /// `SyncError::Cancelled` is returned; a partial SyncList never
    /// escapes.
    pub async fn analyze(
        mut self,
        starts: &[StartPoint],
        progress: &dyn ProgressSink,
    ) -> Result<Analysis> {
        progress.begin(0);

        let mut stack: Vec<Work> = Vec::new();
        for start in starts.iter().rev() {
            match start {
                StartPoint::Local { module, rfs_path } => {
                    if !rfs_path.exists() {
                        self.warn(format!(
                            "Local path {} does not exist, skipped",
                            rfs_path.display()
                        ));
                        continue;
                    }
                    let Some(vfs) =
                        vfs_path::rfs_to_vfs(&module.vfs_root, &module.rfs_root, rfs_path)
                    else {
                        self.warn(format!(
                            "Local path {} is outside module '{}', skipped",
                            rfs_path.display(),
                            module.name
                        ));
                        continue;
                    };
                    stack.push(Work::Local {
                        module: Arc::clone(module),
                        rfs: rfs_path.clone(),
                        vfs,
                        mode: FolderSyncMode::Auto,
                    });
                }
                StartPoint::Remote { module, vfs_path: vfs } => {
                    let vfs = vfs_path::normalize(vfs);
                    match self.adapter.get_object(&vfs).await {
                        Ok(Some(object)) => {
                            let Some(rfs) =
                                vfs_path::vfs_to_rfs(&module.rfs_root, &module.vfs_root, &vfs)
                            else {
                                self.warn(format!(
                                    "VFS path {} is outside module '{}', skipped",
                                    vfs, module.name
                                ));
                                continue;
                            };
                            stack.push(Work::Remote {
                                module: Arc::clone(module),
                                object,
                                rfs,
                            });
                        }
                        Ok(None) => {
                            self.warn(format!("VFS resource {} does not exist, skipped", vfs));
                        }
                        Err(SyncError::PermissionDenied { path }) => {
                            self.warn(format!("Permission denied on {}, skipped", path));
                        }
                        Err(e) => return Err(e),
                    }
                }
            }
        }

        while let Some(work) = stack.pop() {
            if self.cancel.is_cancelled() {
                return Err(SyncError::Cancelled);
            }
            match work {
                Work::Local { module, rfs, vfs, mode } => {
                    self.process_local(&module, &rfs, &vfs, mode, &mut stack, progress)
                        .await?
                }
                Work::Remote { module, object, rfs } => {
                    self.process_remote_only(&module, object, rfs, &mut stack)
                        .await?
                }
            }
        }

        progress.finish("Analysis complete");

        let mut modules: Vec<String> = self.touched.into_iter().collect();
        modules.sort();
        Ok(Analysis {
            list: self.list,
            warnings: self.warnings,
            modules,
        })
    }

    async fn process_local(
        &mut self,
        module: &Arc<CmsModule>,
        rfs: &Path,
        vfs: &str,
        mode: FolderSyncMode,
        stack: &mut Vec<Work>,
        progress: &dyn ProgressSink,
    ) -> Result<()> {
        if !self.visited.insert(vfs.to_string()) {
            return Ok(());
        }

        let metadata = match std::fs::metadata(rfs) {
            Ok(m) => m,
            Err(e) => {
                self.warn(format!("Cannot read {}: {}, skipped", rfs.display(), e));
                return Ok(());
            }
        };
        let is_dir = metadata.is_dir();

        if ignore::is_ignored(vfs_path::file_name(vfs), is_dir) {
            tracing::debug!("Ignoring {}", vfs);
            return Ok(());
        }
        if is_dir {
            progress.advance(vfs);
        }

        // Remote existence. `Push` mode means the caller already knows
        // this subtree is remote-absent; no adapter call.
        let remote = match mode {
            FolderSyncMode::Push => None,
            _ => match self.adapter.get_object(vfs).await {
                Ok(object) => object,
                Err(SyncError::PermissionDenied { path }) => {
                    self.warn(format!("Permission denied on {}, skipped", path));
                    return Ok(());
                }
                Err(e) => return Err(e),
            },
        };

        if let Some(object) = &remote {
            if object.is_folder() != is_dir {
                self.warn(format!(
                    "{} is a {} locally but a {} on the VFS, skipped",
                    vfs,
                    if is_dir { "folder" } else { "file" },
                    if object.is_folder() { "folder" } else { "file" },
                ));
                return Ok(());
            }
        }

        if is_dir {
            self.process_local_folder(module, rfs, vfs, remote, stack)
                .await
        } else {
            self.process_local_file(module, rfs, vfs, &metadata, remote)
        }
    }

    async fn process_local_folder(
        &mut self,
        module: &Arc<CmsModule>,
        rfs: &Path,
        vfs: &str,
        remote: Option<VfsObject>,
        stack: &mut Vec<Work>,
    ) -> Result<()> {
        if remote.is_none() {
            match module.sync_mode {
                // Local is not authoritative; the one-sided local tree
                // goes away as a single recursive delete.
                SyncMode::Pull => {
                    self.emit(SyncEntity {
                        kind: SyncKind::Folder,
                        vfs_path: vfs.to_string(),
                        rfs_path: rfs.to_path_buf(),
                        action: SyncAction::DeleteRfs,
                        replace_existing: true,
                        module: Arc::clone(module),
                        remote: None,
                    });
                }
                SyncMode::Push | SyncMode::Sync => {
                    self.emit(SyncEntity {
                        kind: SyncKind::Folder,
                        vfs_path: vfs.to_string(),
                        rfs_path: rfs.to_path_buf(),
                        action: SyncAction::Push,
                        replace_existing: false,
                        module: Arc::clone(module),
                        remote: None,
                    });
                    // The whole subtree is known remote-absent now; no
                    // further existence checks for it.
                    let children = self.local_children(rfs)?;
                    for (name, _) in children.into_iter().rev() {
                        stack.push(Work::Local {
                            module: Arc::clone(module),
                            rfs: rfs.join(&name),
                            vfs: vfs_path::join(vfs, &name),
                            mode: FolderSyncMode::Push,
                        });
                    }
                }
            }
            return Ok(());
        }

        // Both sides exist: reconcile children by name.
        let mut remote_children: BTreeMap<String, VfsObject> =
            match self.adapter.list_children(vfs).await {
                Ok(children) => children.into_iter().map(|c| (c.name().to_string(), c)).collect(),
                Err(SyncError::PermissionDenied { path }) => {
                    self.warn(format!("Permission denied on {}, skipped", path));
                    return Ok(());
                }
                Err(e) => return Err(e),
            };

        let local_children = self.local_children(rfs)?;
        let mut local_work: Vec<Work> = Vec::with_capacity(local_children.len());
        for (name, _) in local_children {
            let mode = if remote_children.remove(&name).is_some() {
                FolderSyncMode::Auto
            } else {
                FolderSyncMode::Push
            };
            local_work.push(Work::Local {
                module: Arc::clone(module),
                rfs: rfs.join(&name),
                vfs: vfs_path::join(vfs, &name),
                mode,
            });
        }

        // Names still in the map exist only on the VFS.
        let mut remote_work: Vec<Work> = Vec::new();
        for (name, object) in remote_children {
            if ignore::is_ignored(&name, object.is_folder()) {
                tracing::debug!("Ignoring remote-only {}", object.path);
                continue;
            }
            match module.sync_mode {
                // The VFS copy is obsolete. Deletion is recursive at
                // the adapter level; descendants are not itemized.
                SyncMode::Push => {
                    let kind = if object.is_folder() {
                        SyncKind::Folder
                    } else {
                        SyncKind::File
                    };
                    self.emit(SyncEntity {
                        kind,
                        vfs_path: object.path.clone(),
                        rfs_path: rfs.join(&name),
                        action: SyncAction::DeleteVfs,
                        replace_existing: true,
                        module: Arc::clone(module),
                        remote: Some(object),
                    });
                }
                SyncMode::Sync | SyncMode::Pull => {
                    remote_work.push(Work::Remote {
                        module: Arc::clone(module),
                        object,
                        rfs: rfs.join(&name),
                    });
                }
            }
        }

        for work in remote_work.into_iter().rev() {
            stack.push(work);
        }
        for work in local_work.into_iter().rev() {
            stack.push(work);
        }
        Ok(())
    }

    fn process_local_file(
        &mut self,
        module: &Arc<CmsModule>,
        rfs: &Path,
        vfs: &str,
        metadata: &std::fs::Metadata,
        remote: Option<VfsObject>,
    ) -> Result<()> {
        let Some(object) = remote else {
            match module.sync_mode {
                SyncMode::Pull => {
                    self.emit(SyncEntity {
                        kind: SyncKind::File,
                        vfs_path: vfs.to_string(),
                        rfs_path: rfs.to_path_buf(),
                        action: SyncAction::DeleteRfs,
                        replace_existing: true,
                        module: Arc::clone(module),
                        remote: None,
                    });
                }
                SyncMode::Push | SyncMode::Sync => {
                    self.emit(SyncEntity {
                        kind: SyncKind::File,
                        vfs_path: vfs.to_string(),
                        rfs_path: rfs.to_path_buf(),
                        action: SyncAction::Push,
                        replace_existing: false,
                        module: Arc::clone(module),
                        remote: None,
                    });
                }
            }
            return Ok(());
        };

        let local_mtime = match metadata.modified() {
            Ok(t) => t,
            Err(e) => {
                self.warn(format!("Cannot read mtime of {}: {}, skipped", rfs.display(), e));
                return Ok(());
            }
        };

        let action = match module.sync_mode {
            SyncMode::Sync => {
                if local_mtime > object.mtime {
                    Some(SyncAction::Push)
                } else if local_mtime < object.mtime {
                    Some(SyncAction::Pull)
                } else {
                    None
                }
            }
            SyncMode::Push => (local_mtime != object.mtime).then_some(SyncAction::Push),
            SyncMode::Pull => (local_mtime != object.mtime).then_some(SyncAction::Pull),
        };

        if let Some(action) = action {
            self.emit(SyncEntity {
                kind: SyncKind::File,
                vfs_path: vfs.to_string(),
                rfs_path: rfs.to_path_buf(),
                action,
                replace_existing: true,
                module: Arc::clone(module),
                remote: Some(object),
            });
        }
        Ok(())
    }

    /// A resource that exists only on the VFS, classified PULL. The
    /// entity for a folder is queued before its descendants.
    async fn process_remote_only(
        &mut self,
        module: &Arc<CmsModule>,
        object: VfsObject,
        rfs: PathBuf,
        stack: &mut Vec<Work>,
    ) -> Result<()> {
        if !self.visited.insert(object.path.clone()) {
            return Ok(());
        }
        if ignore::is_ignored(object.name(), object.is_folder()) {
            tracing::debug!("Ignoring remote-only {}", object.path);
            return Ok(());
        }

        let is_folder = object.is_folder();
        let vfs = object.path.clone();
        self.emit(SyncEntity {
            kind: if is_folder { SyncKind::Folder } else { SyncKind::File },
            vfs_path: vfs.clone(),
            rfs_path: rfs.clone(),
            action: SyncAction::Pull,
            replace_existing: false,
            module: Arc::clone(module),
            remote: Some(object),
        });

        if is_folder {
            let children = match self.adapter.list_children(&vfs).await {
                Ok(children) => children,
                Err(SyncError::PermissionDenied { path }) => {
                    self.warn(format!("Permission denied on {}, skipped", path));
                    return Ok(());
                }
                Err(e) => return Err(e),
            };
            for child in children.into_iter().rev() {
                let child_rfs = rfs.join(child.name());
                stack.push(Work::Remote {
                    module: Arc::clone(module),
                    object: child,
                    rfs: child_rfs,
                });
            }
        }
        Ok(())
    }

    /// Local child names with their directory flag, sorted by name for
    /// deterministic SyncList order.
    fn local_children(&mut self, rfs: &Path) -> Result<Vec<(String, bool)>> {
        let read_dir = std::fs::read_dir(rfs).map_err(|e| SyncError::ReadDirError {
            path: rfs.to_path_buf(),
            source: e,
        })?;
        let mut children = Vec::new();
        for entry in read_dir {
            let entry = entry.map_err(|e| SyncError::ReadDirError {
                path: rfs.to_path_buf(),
                source: e,
            })?;
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                self.warn(format!(
                    "Skipping non-UTF-8 file name in {}",
                    rfs.display()
                ));
                continue;
            };
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            children.push((name, is_dir));
        }
        children.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(children)
    }

    fn emit(&mut self, entity: SyncEntity) {
        tracing::debug!("{} {} ({})", entity.action, entity.vfs_path, entity.label());
        self.touched.insert(entity.module.name.clone());
        self.list.push(entity);
    }

    fn warn(&mut self, message: String) {
        tracing::warn!("{}", message);
        self.warnings.push(message);
    }
}
