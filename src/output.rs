//! Output formatting and styling module.
//!
//! Provides a centralized interface for all CLI output, including colored output,
//! progress spinners, and the per-root pass summary table. This module abstracts
//! away output details, making it easy to change formatting globally.
//!
//! Interactive runs print through this module; the background daemon reports
//! through `tracing` instead and never draws spinners.

use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use crate::organizer::PassReport;

/// Manages all CLI output with consistent styling and formatting.
///
/// This struct provides methods for:
/// - Success messages (green with ✓)
/// - Error messages (red with ✗)
/// - Warning messages (yellow with ⚠)
/// - Info messages (cyan)
/// - Phase spinners for in-flight passes
/// - Summary tables with pass statistics
pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use desktidy::output::OutputFormatter;
    /// OutputFormatter::success("Downloads organized");
    /// ```
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Prints an error message in red with an X mark.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use desktidy::output::OutputFormatter;
    /// OutputFormatter::error("Failed to organize Downloads");
    /// ```
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Prints a warning message in yellow with a warning symbol.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use desktidy::output::OutputFormatter;
    /// OutputFormatter::warning("Some files could not be moved");
    /// ```
    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow(), message);
    }

    /// Prints an info message in cyan.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use desktidy::output::OutputFormatter;
    /// OutputFormatter::info("Organizing: /home/user/Downloads");
    /// ```
    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    /// Prints a regular message without styling.
    pub fn plain(message: &str) {
        println!("{}", message);
    }

    /// Prints a section header.
    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    /// Creates a spinner that tracks the current phase of a pass.
    ///
    /// The caller updates the message as the pass moves between phases and
    /// finishes the spinner when the pass completes.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use desktidy::output::OutputFormatter;
    /// let spinner = OutputFormatter::create_phase_spinner("scanning");
    /// spinner.set_message("moving");
    /// spinner.finish_and_clear();
    /// ```
    pub fn create_phase_spinner(initial: &str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .expect("Invalid spinner template"),
        );
        pb.set_message(initial.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }

    /// Prints the summary table for one root's finished pass.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use desktidy::output::OutputFormatter;
    /// # let report = unimplemented!();
    /// OutputFormatter::pass_summary(&report);
    /// ```
    pub fn pass_summary(report: &PassReport) {
        Self::header(&format!("SUMMARY: {}", report.root.display()));

        let rows = [
            ("Moved", report.moved),
            ("Grouped", report.grouped),
            ("Sent to Review", report.reviewed),
            ("Empty folders removed", report.removed_dirs),
            ("Skipped", report.skipped),
        ];

        let width = rows
            .iter()
            .map(|(label, _)| label.len())
            .max()
            .unwrap_or(0);

        println!("{}", "-".repeat(width + 10));
        for (label, count) in rows {
            println!("{:<width$} | {}", label, count.to_string().green());
        }
        println!("{}", "-".repeat(width + 10));

        if report.cancelled {
            Self::warning("Pass was interrupted before finishing");
        }
    }

    /// Prints a dry-run notice message.
    pub fn dry_run_notice(message: &str) {
        println!("{}", format!("[DRY RUN] {}", message).yellow());
    }
}
