use crate::config::SyncMode;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "ocsync")]
#[command(about = "Synchronize local CMS module trees with the server VFS", long_about = None)]
#[command(version)]
#[command(after_help = "EXAMPLES:
    # Sync every configured module
    ocsync

    # Sync selected modules only
    ocsync com.example.site com.example.blog

    # Preview changes without applying
    ocsync --dry-run

    # Override the configured authority policy for this run
    ocsync --mode push com.example.site

    # Fetch a VFS resource that does not exist locally yet
    ocsync --pull /system/modules/com.example.site/new-content

    # Machine-readable NDJSON events
    ocsync --json

Configuration is read from ./ocsync.toml (or --config).")]
pub struct Cli {
    /// Modules to sync (default: all configured modules)
    pub modules: Vec<String>,

    /// Path to the configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override every selected module's sync mode for this run
    #[arg(long, value_enum)]
    pub mode: Option<SyncMode>,

    /// VFS paths to fetch that do not exist locally yet (repeatable)
    #[arg(long = "pull", value_name = "VFS_PATH")]
    pub pull_resources: Vec<String>,

    /// Show changes without applying them (dry-run)
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Quiet mode (only show errors)
    #[arg(short, long)]
    pub quiet: bool,

    /// Emit NDJSON events instead of the plain-text report
    #[arg(long)]
    pub json: bool,

    /// Verbosity level (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// List configured modules and exit
    #[arg(long)]
    pub list_modules: bool,
}

impl Cli {
    pub fn log_level(&self) -> &'static str {
        if self.quiet {
            return "error";
        }
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        for path in &self.pull_resources {
            if !path.starts_with('/') {
                return Err(format!(
                    "--pull expects an absolute VFS path, got '{}'",
                    path
                ));
            }
        }
        if self.quiet && self.json {
            return Err("--quiet and --json are mutually exclusive".to_string());
        }
        Ok(())
    }
}
