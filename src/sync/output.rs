use serde::Serialize;
use std::path::PathBuf;

/// JSON output mode for machine-readable sync events.
/// Uses NDJSON format (newline-delimited JSON).
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncEvent {
    Start {
        total: usize,
        dry_run: bool,
    },
    Push {
        path: String,
        replaced: bool,
    },
    Pull {
        path: String,
        replaced: bool,
    },
    DeleteLocal {
        path: String,
    },
    DeleteRemote {
        path: String,
    },
    ExportCopy {
        source: String,
        target: PathBuf,
    },
    Error {
        path: String,
        error: String,
    },
    Summary {
        pushed: usize,
        pulled: usize,
        deleted_local: usize,
        deleted_remote: usize,
        failed: usize,
        cancelled: bool,
    },
}

impl SyncEvent {
    /// Emit this event as JSON to stdout.
    pub fn emit(&self) {
        if let Ok(json) = serde_json::to_string(self) {
            println!("{}", json);
        }
    }
}
