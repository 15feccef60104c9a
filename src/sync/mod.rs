pub mod analyzer;
pub mod entity;
pub mod executor;
pub mod export;
pub mod output;
pub mod progress;

use crate::error::Result;
use analyzer::{Analyzer, StartPoint};
use executor::Executor;
use export::ExportMirror;
use output::SyncEvent;
use progress::{CancelFlag, ProgressSink};
use std::path::PathBuf;

/// Aggregated outcome of one sync run: the plain-text report, the
/// warnings buffer, and the set of local paths the caller must refresh.
#[derive(Debug)]
pub struct RunReport {
    pub lines: Vec<String>,
    pub warnings: Vec<String>,
    pub refresh: Vec<PathBuf>,
    /// Modules with at least one queued action.
    pub modules: Vec<String>,
    /// Actions queued by the analysis.
    pub planned: usize,
    pub pushed: usize,
    pub pulled: usize,
    pub deleted_local: usize,
    pub deleted_remote: usize,
    pub failed: usize,
    pub cancelled: bool,
}

/// One full sync run: analysis, then execution. Both phases run on a
/// single worker against the same adapter session, never concurrently.
pub struct SyncJob<'a> {
    adapter: &'a dyn crate::vfs::VfsAdapter,
    webapp_root: Option<PathBuf>,
    dry_run: bool,
    json: bool,
}

impl<'a> SyncJob<'a> {
    pub fn new(
        adapter: &'a dyn crate::vfs::VfsAdapter,
        webapp_root: Option<PathBuf>,
        dry_run: bool,
        json: bool,
    ) -> Self {
        Self {
            adapter,
            webapp_root,
            dry_run,
            json,
        }
    }

    pub async fn run(
        &self,
        starts: &[StartPoint],
        progress: &dyn ProgressSink,
        cancel: &CancelFlag,
    ) -> Result<RunReport> {
        if !self.adapter.is_connected().await {
            tracing::info!("Repository session not connected, starting one");
            self.adapter.start_session().await?;
        }
        // A fresh analysis must observe current server state.
        self.adapter.clear_cache().await;

        let analysis = Analyzer::new(self.adapter, cancel)
            .analyze(starts, progress)
            .await?;
        let planned = analysis.list.len();
        tracing::info!(
            "Analysis queued {} actions across {} module(s)",
            planned,
            analysis.modules.len()
        );

        let mirror = self
            .webapp_root
            .as_deref()
            .map(|root| ExportMirror::new(root, self.json));
        let execution = Executor::new(self.adapter, cancel, mirror, self.dry_run, self.json)
            .execute(analysis.list, progress)
            .await?;

        let mut lines = execution.lines;
        lines.push("---- Sync finished ----".to_string());
        if execution.export_touched {
            lines.push("---- Copying of ExportPoints finished ----".to_string());
        }

        let mut warnings = analysis.warnings;
        warnings.extend(execution.warnings);

        if self.json {
            SyncEvent::Summary {
                pushed: execution.pushed,
                pulled: execution.pulled,
                deleted_local: execution.deleted_local,
                deleted_remote: execution.deleted_remote,
                failed: execution.failed,
                cancelled: execution.cancelled,
            }
            .emit();
        }

        Ok(RunReport {
            lines,
            warnings,
            refresh: execution.refresh,
            modules: analysis.modules,
            planned,
            pushed: execution.pushed,
            pulled: execution.pulled,
            deleted_local: execution.deleted_local,
            deleted_remote: execution.deleted_remote,
            failed: execution.failed,
            cancelled: execution.cancelled,
        })
    }
}
