//! Top-level CLI definition and dispatch.
//!
//! Thin glue only: every subcommand resolves a [`Config`], builds a
//! [`ReaperManager`], and calls into the core's registration and lifecycle
//! API. No deletion logic lives here.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use stale_file_reaper::core::config::Config;
use stale_file_reaper::core::errors::Result;
use stale_file_reaper::daemon::signals::SignalHandler;
use stale_file_reaper::logger::activity::spawn_logger;
use stale_file_reaper::platform::pal::StdFilesystem;
use stale_file_reaper::sweep::manager::{PassSummary, ReaperManager};

/// How often the foreground loop polls the signal flags.
const SIGNAL_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Stale File Reaper — age-based pruning and free-space eviction.
#[derive(Debug, Parser)]
#[command(
    name = "sfr",
    author,
    version,
    about = "Stale File Reaper - disk housekeeping daemon",
    long_about = None,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Override config file path (beats SFR_CONFIG and the default path).
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Run the deletion scheduler in the foreground until SIGTERM/SIGINT.
    Run(RunArgs),
    /// Run a single synchronous deletion pass and exit.
    Once,
    /// Load and validate the configuration, then print a summary.
    CheckConfig,
}

#[derive(Debug, Clone, Args, Default)]
struct RunArgs {
    /// Skip the activity log (stderr error reporting only).
    #[arg(long)]
    no_log: bool,
}

/// Dispatch a parsed CLI invocation.
pub fn run(cli: &Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref())?;
    match &cli.command {
        Command::Run(args) => run_foreground(&config, args),
        Command::Once => run_once(&config),
        Command::CheckConfig => check_config(&config),
    }
}

fn build_manager(config: &Config, with_log: bool) -> Result<ReaperManager> {
    let manager = ReaperManager::from_config(config, Arc::new(StdFilesystem::new()))?;
    if with_log {
        let logger = spawn_logger(config.jsonl_config())?;
        Ok(manager.with_logger(logger))
    } else {
        Ok(manager)
    }
}

fn run_foreground(config: &Config, args: &RunArgs) -> Result<()> {
    let manager = build_manager(config, !args.no_log)?;
    manager.start()?;
    eprintln!(
        "sfr: scheduler started ({} volume(s), trigger every {}h)",
        manager.volume_set().volume_count(),
        config.trigger_hours
    );

    let signals = SignalHandler::new();
    while !signals.should_shutdown() {
        if signals.should_run_pass() {
            let summary = manager.run_pass_now();
            print_summary(&summary);
        }
        thread::sleep(SIGNAL_POLL_INTERVAL);
    }

    eprintln!("sfr: shutdown requested, waiting for current pass");
    manager.stop()?;
    manager.wait();
    Ok(())
}

fn run_once(config: &Config) -> Result<()> {
    let manager = build_manager(config, true)?;
    let summary = manager.run_pass_now();
    print_summary(&summary);
    Ok(())
}

fn check_config(config: &Config) -> Result<()> {
    // Replay registration to surface duplicate keys and missing parents
    // exactly as a real start would.
    let manager = ReaperManager::from_config(config, Arc::new(StdFilesystem::new()))?;
    let volumes = manager.volume_set();
    println!("config ok: {} volume(s)", volumes.volume_count());
    for volume in volumes.volumes() {
        println!(
            "  {} min_free={}GB max_used={}GB ({} folder rule(s))",
            volume.root().display(),
            volume.min_free_space_gb(),
            volume.max_used_space_gb(),
            volume.folder_rule_count()
        );
        for rule in volume.folder_rules() {
            let window = rule.depth_window();
            println!(
                "    {} depth {}..={} ({} file rule(s))",
                rule.path().display(),
                window.first(),
                window.last(),
                rule.file_rule_count()
            );
        }
    }
    Ok(())
}

fn print_summary(summary: &PassSummary) {
    println!(
        "pass complete: {} file(s) pruned, {} folder(s) pruned, {} byte(s) freed, \
         {} file(s) evicted ({} byte(s)), {} error(s)",
        summary.files_deleted,
        summary.folders_deleted,
        summary.bytes_freed,
        summary.evicted_files,
        summary.evicted_bytes,
        summary.errors
    );
}
