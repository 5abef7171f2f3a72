//! Fixed-interval background loop.
//!
//! Runs a full organization pass over every configured root, then sleeps out
//! the configured interval before the next pass. Passes never overlap: the
//! next one starts only after the previous one finished and the interval
//! elapsed. The wait sleeps in one-second slices so a stop request is
//! honored within about a second.
//!
//! Configuration and the category table are reloaded before every pass, so
//! edits to the config file take effect on the next tick without a restart.
//! A configuration error aborts only that pass; the daemon logs it and waits
//! for the next tick.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::classifier::CategoryTable;
use crate::config::{ConfigError, Settings};
use crate::organizer::Organizer;

/// Set by the signal handler; polled by the wait loop and between per-file
/// operations inside a running pass. The one piece of process-wide state the
/// C signal handler forces on us.
static STOP_REQUESTED: AtomicBool = AtomicBool::new(false);

const SLEEP_SLICE: Duration = Duration::from_secs(1);

extern "C" fn handle_stop_signal(_signal: libc::c_int) {
    STOP_REQUESTED.store(true, Ordering::SeqCst);
}

/// Route SIGINT and SIGTERM to the stop flag so an in-flight move can finish
/// before the daemon exits.
pub fn install_signal_handlers() {
    let handler: extern "C" fn(libc::c_int) = handle_stop_signal;
    unsafe {
        libc::signal(libc::SIGINT, handler as libc::sighandler_t);
        libc::signal(libc::SIGTERM, handler as libc::sighandler_t);
    }
}

/// Whether a stop has been requested via signal (or [`request_stop`]).
pub fn stop_requested() -> bool {
    STOP_REQUESTED.load(Ordering::SeqCst)
}

/// Request a graceful stop from inside the process.
pub fn request_stop() {
    STOP_REQUESTED.store(true, Ordering::SeqCst);
}

/// How the daemon loop should run, assembled from CLI arguments.
#[derive(Debug, Clone, Default)]
pub struct DaemonOptions {
    /// Explicit config file; `None` follows the normal lookup order.
    pub config_path: Option<PathBuf>,
    /// Category table override; `None` defers to config, then built-ins.
    pub categories_path: Option<PathBuf>,
    /// Roots to organize; empty means the configured Downloads/Desktop.
    pub roots: Vec<PathBuf>,
    /// Overrides the configured scan interval when set.
    pub interval_override: Option<Duration>,
    /// Plan and log moves without executing them.
    pub dry_run: bool,
}

/// Run passes forever at the configured interval until a stop is requested.
///
/// The first pass starts immediately. Per-root failures and configuration
/// errors are logged and the loop continues with the next tick.
pub fn run(options: &DaemonOptions) {
    STOP_REQUESTED.store(false, Ordering::SeqCst);
    install_signal_handlers();
    info!(dry_run = options.dry_run, "daemon started");

    loop {
        let started = Instant::now();

        let interval = match execute_pass(options) {
            Ok(interval) => {
                info!(elapsed_ms = started.elapsed().as_millis() as u64, "pass complete");
                interval
            }
            Err(e) => {
                warn!(error = %e, "pass aborted by configuration error");
                options
                    .interval_override
                    .unwrap_or_else(|| Settings::default().scan_interval())
            }
        };

        if !wait_for_next_pass(interval) {
            break;
        }
    }

    STOP_REQUESTED.store(false, Ordering::SeqCst);
    info!("daemon stopped");
}

/// Load fresh configuration, run one pass over every root, and return the
/// interval to wait before the next pass.
fn execute_pass(options: &DaemonOptions) -> Result<Duration, ConfigError> {
    let mut settings = Settings::load(options.config_path.as_deref())?;
    if let Some(interval) = options.interval_override {
        settings.organizer.scan_interval_secs = interval.as_secs();
    }

    let categories_path = options
        .categories_path
        .as_ref()
        .or(settings.organizer.categories_file.as_ref());
    let table = match categories_path {
        Some(path) => CategoryTable::load(path)?,
        None => CategoryTable::default(),
    };

    let roots = if options.roots.is_empty() {
        settings.organized_roots()
    } else {
        options.roots.clone()
    };

    let organizer = Organizer::new(&settings, &table)?
        .with_dry_run(options.dry_run)
        .with_cancel_flag(&STOP_REQUESTED);

    for (root, result) in organizer.organize_all(&roots, None) {
        match result {
            Ok(report) if report.cancelled => {
                info!(root = %root.display(), "pass interrupted by stop request");
            }
            Ok(_) => {}
            Err(e) => {
                warn!(root = %root.display(), error = %e, "pass failed");
            }
        }
    }

    Ok(settings.scan_interval())
}

/// Sleep out the interval in short slices. Returns false when a stop request
/// arrived during the wait (or before it).
fn wait_for_next_pass(interval: Duration) -> bool {
    let deadline = Instant::now() + interval;

    loop {
        if stop_requested() {
            return false;
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return true;
        }
        thread::sleep(remaining.min(SLEEP_SLICE));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // The stop flag is process-wide, so every assertion that touches it
    // lives in this single test body.
    #[test]
    fn test_stop_flag_lifecycle() {
        assert!(!stop_requested());

        let interval = Duration::from_millis(20);
        let before = Instant::now();
        assert!(wait_for_next_pass(interval));
        assert!(before.elapsed() >= interval);

        request_stop();
        assert!(stop_requested());
        assert!(!wait_for_next_pass(Duration::from_secs(3600)));
        STOP_REQUESTED.store(false, Ordering::SeqCst);

        handle_stop_signal(libc::SIGTERM);
        assert!(stop_requested());
        STOP_REQUESTED.store(false, Ordering::SeqCst);
    }

    #[test]
    fn test_pass_with_bad_categories_file_is_a_config_error() {
        let temp = tempfile::TempDir::new().expect("temp dir");
        let bad_table = temp.path().join("categories.json");
        std::fs::write(&bad_table, "{ not json").expect("write");

        let options = DaemonOptions {
            categories_path: Some(bad_table),
            roots: vec![temp.path().to_path_buf()],
            ..Default::default()
        };
        assert!(execute_pass(&options).is_err());
    }

    #[test]
    fn test_execute_pass_returns_overridden_interval() {
        let temp = tempfile::TempDir::new().expect("temp dir");
        let options = DaemonOptions {
            roots: vec![temp.path().to_path_buf()],
            interval_override: Some(Duration::from_secs(120)),
            dry_run: true,
            ..Default::default()
        };

        let interval = execute_pass(&options).expect("pass succeeds");
        assert_eq!(interval, Duration::from_secs(120));
    }
}
