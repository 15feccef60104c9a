mod cli;
mod config;
mod error;
mod ignore;
mod path;
mod sync;
mod vfs;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use colored::Colorize;
use config::{CmsModule, Config};
use std::sync::Arc;
use sync::analyzer::StartPoint;
use sync::progress::{CancelFlag, NullProgress, ProgressSink, TerminalProgress};
use sync::SyncJob;
use tracing_subscriber::{fmt, EnvFilter};
use vfs::fs::FsVfsAdapter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.log_level()));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    if let Err(message) = cli.validate() {
        anyhow::bail!(message);
    }

    let config = Config::load(cli.config.as_deref())?;

    if cli.list_modules {
        if config.modules.is_empty() {
            println!("No modules configured");
        } else {
            println!("Configured modules:");
            for module in &config.modules {
                println!(
                    "  {} ({:?}) {} <-> {}",
                    module.name,
                    module.sync_mode,
                    module.rfs_root.display(),
                    module.vfs_root
                );
            }
        }
        return Ok(());
    }

    // Select modules, applying the per-run mode override.
    let selected: Vec<Arc<CmsModule>> = if cli.modules.is_empty() {
        config.modules.iter().cloned().map(override_mode(&cli)).collect()
    } else {
        let mut selected = Vec::with_capacity(cli.modules.len());
        for name in &cli.modules {
            let module = config
                .module(name)
                .ok_or_else(|| anyhow::anyhow!("Module '{}' is not configured", name))?;
            selected.push(override_mode(&cli)(module.clone()));
        }
        selected
    };

    let mut starts: Vec<StartPoint> = selected.iter().map(StartPoint::module_root).collect();
    for vfs_path in &cli.pull_resources {
        let module = config
            .module_for_vfs_path(vfs_path)
            .ok_or_else(|| anyhow::anyhow!("No configured module owns VFS path {}", vfs_path))?;
        starts.push(StartPoint::Remote {
            module: Arc::new(module.clone()),
            vfs_path: vfs_path.clone(),
        });
    }
    if starts.is_empty() {
        anyhow::bail!("Nothing to sync: no modules configured and no --pull paths given");
    }

    if !cli.quiet && !cli.json {
        println!("ocsync v{}", env!("CARGO_PKG_VERSION"));
        if cli.dry_run {
            println!("Mode: Dry-run (no changes will be made)\n");
        }
    }

    // Cooperative cancellation on Ctrl-C.
    let cancel = CancelFlag::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Cancellation requested, finishing current action");
                cancel.cancel();
            }
        });
    }

    let progress: Box<dyn ProgressSink> = if cli.quiet || cli.json {
        Box::new(NullProgress)
    } else {
        Box::new(TerminalProgress::new())
    };

    let adapter = FsVfsAdapter::new(&config.server.vfs_root);
    let job = SyncJob::new(&adapter, config.webapp_root.clone(), cli.dry_run, cli.json);
    let report = job.run(&starts, progress.as_ref(), &cancel).await?;

    if !cli.json {
        if !cli.quiet {
            for line in &report.lines {
                println!("{}", line);
            }
        }
        for warning in &report.warnings {
            eprintln!("{} {}", "warning:".yellow().bold(), warning);
        }
    }

    if !cli.quiet && !cli.json {
        println!();
        if report.cancelled {
            println!("{}\n", "! Sync cancelled (partial result)".yellow().bold());
        } else if cli.dry_run {
            println!("{}\n", "✓ Dry-run complete (no changes made)".green().bold());
        } else {
            println!("{}\n", "✓ Sync complete".green().bold());
        }

        println!("  Actions planned:   {}", report.planned.to_string().blue());
        println!("  Pushed:            {}", report.pushed.to_string().green());
        println!("  Pulled:            {}", report.pulled.to_string().cyan());
        println!("  Deleted (local):   {}", report.deleted_local.to_string().red());
        println!("  Deleted (VFS):     {}", report.deleted_remote.to_string().red());
        if report.failed > 0 {
            println!("  Failed:            {}", report.failed.to_string().red().bold());
        }
        if !report.modules.is_empty() {
            println!("  Modules touched:   {}", report.modules.join(", "));
        }
    }

    if report.failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn override_mode(cli: &Cli) -> impl Fn(CmsModule) -> Arc<CmsModule> + '_ {
    move |mut module: CmsModule| {
        if let Some(mode) = cli.mode {
            module.sync_mode = mode;
        }
        Arc::new(module)
    }
}
