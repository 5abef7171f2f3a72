//! Command-line interface module for desktidy.
//!
//! This module handles all CLI-related functionality including:
//! - Argument parsing and validation
//! - Configuration and category table loading
//! - Single-pass orchestration with live phase reporting
//! - Handing off to the background daemon loop

use clap::Parser;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::classifier::CategoryTable;
use crate::config::Settings;
use crate::daemon::{self, DaemonOptions};
use crate::organizer::{Organizer, PassPhase};
use crate::output::OutputFormatter;

/// desktidy - keeps Downloads and Desktop tidy
///
/// Without `--once` it runs as a daemon, organizing every root at a fixed
/// interval until stopped.
#[derive(Parser)]
#[command(name = "desktidy")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Organizes Downloads and Desktop by category, group, and age")]
pub struct Cli {
    /// Run a single pass with an interactive summary, then exit
    #[arg(long)]
    pub once: bool,

    /// Plan and report moves without touching the filesystem
    #[arg(long)]
    pub dry_run: bool,

    /// Minutes between daemon passes (overrides the configured interval)
    #[arg(long, value_name = "MINUTES")]
    pub interval: Option<u64>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Use alternate config file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// JSON category table overriding the configured and built-in tables
    #[arg(long, value_name = "PATH")]
    pub categories: Option<PathBuf>,

    /// Organize this directory instead of the configured roots (repeatable)
    #[arg(long = "root", value_name = "DIR")]
    pub roots: Vec<PathBuf>,
}

impl Cli {
    fn interval_override(&self) -> Option<Duration> {
        self.interval.map(|minutes| Duration::from_secs(minutes * 60))
    }
}

/// Runs the CLI application with parsed arguments.
///
/// This is the main entry point for CLI operations: one pass with `--once`,
/// the daemon loop otherwise.
///
/// # Examples
///
/// ```no_run
/// use clap::Parser;
/// use desktidy::cli::{run, Cli};
///
/// let cli = Cli::parse();
/// if let Err(e) = run(cli) {
///     eprintln!("Error: {}", e);
/// }
/// ```
pub fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    if cli.once {
        return run_once(&cli);
    }

    let interval_override = cli.interval_override();
    daemon::run(&DaemonOptions {
        config_path: cli.config,
        categories_path: cli.categories,
        roots: cli.roots,
        interval_override,
        dry_run: cli.dry_run,
    });
    Ok(())
}

/// Runs one pass over every root, with a spinner tracking the phases, and
/// prints a summary table per root.
fn run_once(cli: &Cli) -> Result<(), Box<dyn Error>> {
    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(interval) = cli.interval_override() {
        settings.organizer.scan_interval_secs = interval.as_secs();
    }

    let categories_path = cli
        .categories
        .as_ref()
        .or(settings.organizer.categories_file.as_ref());
    let table = match categories_path {
        Some(path) => CategoryTable::load(path)?,
        None => CategoryTable::default(),
    };

    let roots = if cli.roots.is_empty() {
        settings.organized_roots()
    } else {
        cli.roots.clone()
    };
    if roots.is_empty() {
        return Err("no organized roots configured and none given with --root".into());
    }

    if cli.dry_run {
        OutputFormatter::dry_run_notice("No files will be moved.");
    }

    let organizer = Organizer::new(&settings, &table)?.with_dry_run(cli.dry_run);

    let spinner = OutputFormatter::create_phase_spinner("starting");
    let on_phase = |root: &Path, phase: PassPhase| {
        spinner.set_message(format!("{}: {}", root.display(), phase));
    };
    let results = organizer.organize_all(&roots, Some(&on_phase));
    spinner.finish_and_clear();

    let mut failed = false;
    for (root, result) in results {
        match result {
            Ok(report) => OutputFormatter::pass_summary(&report),
            Err(e) => {
                OutputFormatter::error(&format!("{}: {}", root.display(), e));
                failed = true;
            }
        }
    }

    if failed {
        return Err("some roots could not be organized".into());
    }
    OutputFormatter::success("All roots organized.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults_to_daemon_mode() {
        let cli = Cli::parse_from(["desktidy"]);
        assert!(!cli.once);
        assert!(!cli.dry_run);
        assert!(cli.interval.is_none());
        assert!(cli.roots.is_empty());
    }

    #[test]
    fn test_parses_once_with_overrides() {
        let cli = Cli::parse_from([
            "desktidy",
            "--once",
            "--dry-run",
            "--interval",
            "30",
            "--root",
            "/tmp/a",
            "--root",
            "/tmp/b",
        ]);
        assert!(cli.once);
        assert!(cli.dry_run);
        assert_eq!(cli.interval_override(), Some(Duration::from_secs(30 * 60)));
        assert_eq!(cli.roots.len(), 2);
    }
}
