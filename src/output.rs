//! Output formatting and styling.
//!
//! The engine itself only produces values (`PassReport`, `LoopEvent`); this
//! module renders them. Keeping rendering out of the core means the move and
//! scan logic stays testable without capturing stdout.

use crate::watcher::{LoopEvent, PassReport};
use colored::*;

/// Renders engine events and messages with consistent styling.
///
/// Log lines carry a local timestamp (`YYYY-MM-DD HH:MM:SS`) so a long-running
/// session can be correlated with the files that appeared.
pub struct OutputFormatter;

impl OutputFormatter {
    fn timestamp() -> String {
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
    }

    /// Prints a success line in green with a checkmark.
    pub fn success(message: &str) {
        println!("{} {} {}", Self::timestamp().dimmed(), "✓".green(), message);
    }

    /// Prints an error line in red with an X mark.
    pub fn error(message: &str) {
        eprintln!("{} {} {}", Self::timestamp().dimmed(), "✗".red(), message);
    }

    /// Prints a warning line in yellow.
    pub fn warning(message: &str) {
        println!("{} {} {}", Self::timestamp().dimmed(), "⚠".yellow(), message);
    }

    /// Prints an info line in cyan.
    pub fn info(message: &str) {
        println!("{} {}", Self::timestamp().dimmed(), message.cyan());
    }

    /// Prints a regular line without styling.
    pub fn plain(message: &str) {
        println!("{}", message);
    }

    /// Prints a dry-run notice.
    pub fn dry_run_notice(message: &str) {
        println!("{}", format!("[DRY RUN] {}", message).yellow());
    }

    /// Renders one pass: a line per move, a line per failure. Quiet passes
    /// print nothing so an idle watch session does not fill the terminal.
    pub fn render_report(report: &PassReport) {
        for outcome in &report.moved {
            Self::success(&format!(
                "Moved: {} -> {}",
                outcome.file_name, outcome.dest_folder
            ));
        }
        for (file_name, error) in &report.failed {
            Self::error(&format!("Error moving {}: {}", file_name, error));
        }
    }

    /// Renders a loop event.
    pub fn render_event(event: &LoopEvent) {
        match event {
            LoopEvent::PassCompleted(report) => Self::render_report(report),
            LoopEvent::ScanFailed(e) => Self::error(&format!("Scan failed: {}", e)),
        }
    }
}
