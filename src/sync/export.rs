use crate::path as vfs_path;
use crate::sync::entity::{SyncAction, SyncEntity};
use crate::sync::output::SyncEvent;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Mirrors export-point subtrees onto the webapp's static-serving
/// directories. A best-effort side channel: failures are reported as
/// warnings and never abort the surrounding sync job.
pub struct ExportMirror {
    webapp_root: PathBuf,
    json: bool,
}

/// Outcome of mirroring one entity.
#[derive(Debug, Default)]
pub struct MirrorOutcome {
    pub lines: Vec<String>,
    pub warnings: Vec<String>,
    /// Whether any export point matched.
    pub touched: bool,
}

impl ExportMirror {
    pub fn new(webapp_root: impl Into<PathBuf>, json: bool) -> Self {
        Self {
            webapp_root: webapp_root.into(),
            json,
        }
    }

    /// Apply export-point mirroring for one successfully executed
    /// entity. DELETE_VFS leaves the local tree (and so the mirror)
    /// untouched.
    pub fn apply(&self, entity: &SyncEntity) -> MirrorOutcome {
        let mut outcome = MirrorOutcome::default();

        for export_point in &entity.module.export_points {
            let Some(relative) =
                vfs_path::relative_to(&entity.vfs_path, &export_point.vfs_source)
            else {
                continue;
            };

            let mut target = self.webapp_root.join(&export_point.rfs_target);
            for segment in relative.split('/').filter(|s| !s.is_empty()) {
                target.push(segment);
            }

            match entity.action {
                SyncAction::Push | SyncAction::Pull => {
                    outcome.touched = true;
                    match copy_tree(&entity.rfs_path, &target) {
                        Ok(()) => {
                            tracing::debug!(
                                "Export point: {} -> {}",
                                entity.vfs_path,
                                target.display()
                            );
                            if self.json {
                                SyncEvent::ExportCopy {
                                    source: entity.vfs_path.clone(),
                                    target: target.clone(),
                                }
                                .emit();
                            }
                            outcome
                                .lines
                                .push(format!("EXPORT {} -> {}", entity.vfs_path, target.display()));
                        }
                        Err(e) => outcome.warnings.push(format!(
                            "Export point copy failed for {}: {}",
                            entity.vfs_path, e
                        )),
                    }
                }
                SyncAction::DeleteRfs => {
                    outcome.touched = true;
                    match remove_tree(&target) {
                        Ok(removed) => {
                            if removed {
                                outcome
                                    .lines
                                    .push(format!("EXPORT DELETE {}", target.display()));
                            }
                        }
                        Err(e) => outcome.warnings.push(format!(
                            "Export point delete failed for {}: {}",
                            target.display(),
                            e
                        )),
                    }
                }
                SyncAction::DeleteVfs => {}
            }
        }
        outcome
    }
}

/// Copy a file, or a directory tree recursively, onto `target`.
fn copy_tree(source: &Path, target: &Path) -> std::io::Result<()> {
    let metadata = fs::metadata(source)?;
    if metadata.is_dir() {
        for entry in WalkDir::new(source) {
            let entry = entry.map_err(std::io::Error::other)?;
            let relative = entry
                .path()
                .strip_prefix(source)
                .map_err(std::io::Error::other)?;
            let dest = target.join(relative);
            if entry.file_type().is_dir() {
                fs::create_dir_all(&dest)?;
            } else {
                if let Some(parent) = dest.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::copy(entry.path(), &dest)?;
            }
        }
    } else {
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(source, target)?;
    }
    Ok(())
}

/// Remove a mirrored file or tree. Returns false when nothing existed.
fn remove_tree(target: &Path) -> std::io::Result<bool> {
    match fs::symlink_metadata(target) {
        Ok(metadata) => {
            if metadata.is_dir() {
                fs::remove_dir_all(target)?;
            } else {
                fs::remove_file(target)?;
            }
            Ok(true)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CmsModule, ExportPoint, SyncMode};
    use crate::sync::entity::SyncKind;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn module_with_export() -> Arc<CmsModule> {
        Arc::new(CmsModule {
            name: "m".into(),
            rfs_root: PathBuf::from("/unused"),
            vfs_root: "/system/modules/m".into(),
            sync_mode: SyncMode::Sync,
            export_points: vec![ExportPoint {
                vfs_source: "/system/modules/m/resources".into(),
                rfs_target: "resources/m".into(),
            }],
        })
    }

    fn entity(vfs: &str, rfs: PathBuf, action: SyncAction, kind: SyncKind) -> SyncEntity {
        SyncEntity {
            kind,
            vfs_path: vfs.into(),
            rfs_path: rfs,
            action,
            replace_existing: false,
            module: module_with_export(),
            remote: None,
        }
    }

    #[test]
    fn test_push_inside_export_point_copies_file() {
        let local = TempDir::new().unwrap();
        let webapp = TempDir::new().unwrap();
        let source = local.path().join("img.png");
        fs::write(&source, "png bytes").unwrap();

        let mirror = ExportMirror::new(webapp.path(), false);
        let outcome = mirror.apply(&entity(
            "/system/modules/m/resources/img.png",
            source,
            SyncAction::Push,
            SyncKind::File,
        ));

        assert!(outcome.touched);
        assert!(outcome.warnings.is_empty());
        let mirrored = webapp.path().join("resources/m/img.png");
        assert_eq!(fs::read_to_string(mirrored).unwrap(), "png bytes");
    }

    #[test]
    fn test_outside_export_point_is_untouched() {
        let local = TempDir::new().unwrap();
        let webapp = TempDir::new().unwrap();
        let source = local.path().join("page.jsp");
        fs::write(&source, "jsp").unwrap();

        let mirror = ExportMirror::new(webapp.path(), false);
        let outcome = mirror.apply(&entity(
            "/system/modules/m/pages/page.jsp",
            source,
            SyncAction::Push,
            SyncKind::File,
        ));

        assert!(!outcome.touched);
        assert!(outcome.lines.is_empty());
    }

    #[test]
    fn test_directory_trees_are_copied_recursively() {
        let local = TempDir::new().unwrap();
        let webapp = TempDir::new().unwrap();
        fs::create_dir_all(local.path().join("css/deep")).unwrap();
        fs::write(local.path().join("css/deep/site.css"), "body{}").unwrap();

        let mirror = ExportMirror::new(webapp.path(), false);
        let outcome = mirror.apply(&entity(
            "/system/modules/m/resources/css",
            local.path().join("css"),
            SyncAction::Pull,
            SyncKind::Folder,
        ));

        assert!(outcome.touched);
        let mirrored = webapp.path().join("resources/m/css/deep/site.css");
        assert_eq!(fs::read_to_string(mirrored).unwrap(), "body{}");
    }

    #[test]
    fn test_delete_rfs_removes_mirror_copy() {
        let webapp = TempDir::new().unwrap();
        fs::create_dir_all(webapp.path().join("resources/m")).unwrap();
        fs::write(webapp.path().join("resources/m/old.js"), "x").unwrap();

        let mirror = ExportMirror::new(webapp.path(), false);
        let outcome = mirror.apply(&entity(
            "/system/modules/m/resources/old.js",
            PathBuf::from("/gone/old.js"),
            SyncAction::DeleteRfs,
            SyncKind::File,
        ));

        assert!(outcome.touched);
        assert!(!webapp.path().join("resources/m/old.js").exists());
    }

    #[test]
    fn test_delete_vfs_is_not_mirrored() {
        let webapp = TempDir::new().unwrap();
        fs::create_dir_all(webapp.path().join("resources/m")).unwrap();
        fs::write(webapp.path().join("resources/m/keep.js"), "x").unwrap();

        let mirror = ExportMirror::new(webapp.path(), false);
        let outcome = mirror.apply(&entity(
            "/system/modules/m/resources/keep.js",
            PathBuf::from("/local/keep.js"),
            SyncAction::DeleteVfs,
            SyncKind::File,
        ));

        // The prefix matches, but DELETE_VFS leaves the mirror alone.
        assert!(!outcome.touched);
        assert!(webapp.path().join("resources/m/keep.js").exists());
    }

    #[test]
    fn test_copy_failure_is_warning_not_error() {
        let webapp = TempDir::new().unwrap();
        let mirror = ExportMirror::new(webapp.path(), false);
        let outcome = mirror.apply(&entity(
            "/system/modules/m/resources/missing.png",
            PathBuf::from("/does/not/exist.png"),
            SyncAction::Push,
            SyncKind::File,
        ));

        assert!(outcome.touched);
        assert_eq!(outcome.warnings.len(), 1);
    }
}
