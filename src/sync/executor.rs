use crate::error::Result;
use crate::sync::entity::{SyncAction, SyncEntity, SyncKind, SyncList};
use crate::sync::export::ExportMirror;
use crate::sync::output::SyncEvent;
use crate::sync::progress::{CancelFlag, ProgressSink};
use crate::vfs::{resource_type_for, VfsAdapter};
use filetime::FileTime;
use std::path::PathBuf;

/// What one execution pass did. Every consumed entity shows up either
/// as a normal report line or as a FAILED line; nothing is dropped.
#[derive(Debug, Default)]
pub struct ExecutionReport {
    pub lines: Vec<String>,
    pub warnings: Vec<String>,
    /// Local paths whose representation changed (PULL and DELETE_RFS
    /// entities) for the caller to invalidate.
    pub refresh: Vec<PathBuf>,
    pub pushed: usize,
    pub pulled: usize,
    pub deleted_local: usize,
    pub deleted_remote: usize,
    pub failed: usize,
    pub cancelled: bool,
    pub export_touched: bool,
}

/// Carries out a SyncList sequentially on a single worker. Cancellation
/// is polled before each entity; already-applied actions are not undone.
pub struct Executor<'a> {
    adapter: &'a dyn VfsAdapter,
    cancel: &'a CancelFlag,
    mirror: Option<ExportMirror>,
    dry_run: bool,
    json: bool,
}

impl<'a> Executor<'a> {
    pub fn new(
        adapter: &'a dyn VfsAdapter,
        cancel: &'a CancelFlag,
        mirror: Option<ExportMirror>,
        dry_run: bool,
        json: bool,
    ) -> Self {
        Self {
            adapter,
            cancel,
            mirror,
            dry_run,
            json,
        }
    }

    /// Consume the list exactly once. Per-entity failures are reported
    /// and execution continues; only connection loss aborts the pass.
    pub async fn execute(
        &self,
        list: SyncList,
        progress: &dyn ProgressSink,
    ) -> Result<ExecutionReport> {
        let total = list.len();
        progress.begin(total);
        if self.json {
            SyncEvent::Start {
                total,
                dry_run: self.dry_run,
            }
            .emit();
        }

        let mut report = ExecutionReport::default();
        for entity in list {
            if self.cancel.is_cancelled() {
                report.cancelled = true;
                tracing::info!("Sync cancelled after {} of {} actions", report.lines.len(), total);
                break;
            }
            progress.advance(&format!("{} {}", entity.action, entity.vfs_path));

            match self.apply(&entity, &mut report.warnings).await {
                Ok(()) => self.record_success(&entity, &mut report),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    let cause = e.to_string().replace('\n', " — ");
                    report
                        .lines
                        .push(format!("FAILED {} {}: {}", entity.action, entity.vfs_path, cause));
                    report.failed += 1;
                    tracing::error!("{} {} failed: {}", entity.action, entity.vfs_path, e);
                    if self.json {
                        SyncEvent::Error {
                            path: entity.vfs_path.clone(),
                            error: cause,
                        }
                        .emit();
                    }
                }
            }
        }

        progress.finish(if report.cancelled {
            "Sync cancelled"
        } else {
            "Sync finished"
        });
        Ok(report)
    }

    async fn apply(&self, entity: &SyncEntity, warnings: &mut Vec<String>) -> Result<()> {
        if self.dry_run {
            tracing::info!("Would {} {}", entity.action, entity.vfs_path);
            return Ok(());
        }

        match (entity.action, entity.kind) {
            (SyncAction::Push, SyncKind::Folder) => {
                self.adapter.create_folder(&entity.vfs_path).await?;
            }
            (SyncAction::Push, SyncKind::File) => {
                let resource_type = resource_type_for(&entity.rfs_path);
                let remote = self.adapter.push_file(entity, resource_type).await?;
                // Stamp the repository-assigned mtime onto the local
                // file; an unchanged file then compares equal on the
                // next analysis instead of being pushed again.
                if let Err(e) = filetime::set_file_mtime(
                    &entity.rfs_path,
                    FileTime::from_system_time(remote.mtime),
                ) {
                    warnings.push(format!(
                        "Pushed {} but could not update the local mtime: {}",
                        entity.vfs_path, e
                    ));
                }
            }
            (SyncAction::Pull, SyncKind::Folder) => {
                tokio::fs::create_dir_all(&entity.rfs_path).await?;
            }
            (SyncAction::Pull, SyncKind::File) => {
                self.adapter.pull_file(entity).await?;
                if let Some(remote) = &entity.remote {
                    if let Err(e) = filetime::set_file_mtime(
                        &entity.rfs_path,
                        FileTime::from_system_time(remote.mtime),
                    ) {
                        warnings.push(format!(
                            "Pulled {} but could not update the local mtime: {}",
                            entity.vfs_path, e
                        ));
                    }
                }
            }
            (SyncAction::DeleteRfs, SyncKind::Folder) => {
                tokio::fs::remove_dir_all(&entity.rfs_path).await?;
            }
            (SyncAction::DeleteRfs, SyncKind::File) => {
                tokio::fs::remove_file(&entity.rfs_path).await?;
            }
            (SyncAction::DeleteVfs, _) => {
                self.adapter.delete_resource(&entity.vfs_path).await?;
            }
        }
        Ok(())
    }

    fn record_success(&self, entity: &SyncEntity, report: &mut ExecutionReport) {
        report
            .lines
            .push(format!("{} {} ({})", entity.action, entity.vfs_path, entity.label()));

        match entity.action {
            SyncAction::Push => report.pushed += 1,
            SyncAction::Pull => report.pulled += 1,
            SyncAction::DeleteRfs => report.deleted_local += 1,
            SyncAction::DeleteVfs => report.deleted_remote += 1,
        }

        if self.json {
            match entity.action {
                SyncAction::Push => SyncEvent::Push {
                    path: entity.vfs_path.clone(),
                    replaced: entity.replace_existing,
                }
                .emit(),
                SyncAction::Pull => SyncEvent::Pull {
                    path: entity.vfs_path.clone(),
                    replaced: entity.replace_existing,
                }
                .emit(),
                SyncAction::DeleteRfs => SyncEvent::DeleteLocal {
                    path: entity.vfs_path.clone(),
                }
                .emit(),
                SyncAction::DeleteVfs => SyncEvent::DeleteRemote {
                    path: entity.vfs_path.clone(),
                }
                .emit(),
            }
        }

        if self.dry_run {
            return;
        }

        // The local representation changed: the caller must refresh it.
        // DELETE_VFS leaves the local tree untouched.
        if matches!(entity.action, SyncAction::Pull | SyncAction::DeleteRfs) {
            report.refresh.push(entity.rfs_path.clone());
        }

        if let Some(mirror) = &self.mirror {
            let outcome = mirror.apply(entity);
            report.lines.extend(outcome.lines);
            report.warnings.extend(outcome.warnings);
            report.export_touched |= outcome.touched;
        }
    }
}
