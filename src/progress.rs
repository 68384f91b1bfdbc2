//! Progress reporting for a database run
//!
//! Live spinner plus the start header and end-of-run summary. Per-directory
//! report lines are printed by the action sets, not here.

use crate::pipeline::{PipelineProgress, RunStatus, RunSummary};
use console::style;
use humansize::{format_size, BINARY};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Spinner showing pipeline status
pub struct ProgressReporter {
    bar: ProgressBar,
}

impl ProgressReporter {
    pub fn new() -> Self {
        let bar = ProgressBar::new_spinner();

        let style = ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
        bar.set_style(style);
        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// Update the progress display
    pub fn update(&self, progress: &PipelineProgress) {
        let mut msg = format!(
            "Dirs: {}/{} | Files: {} | Moves: {} | Rate: {:.0}/s | Workers: {}/{}",
            format_number(progress.completed),
            format_number(progress.dispatched),
            format_number(progress.files),
            format_number(progress.moves),
            progress.files_per_second(),
            progress.in_flight,
            progress.max_concurrent,
        );
        if progress.errors > 0 {
            msg.push_str(&format!(" | Errors: {}", format_number(progress.errors)));
        }

        self.bar.set_message(msg);
    }

    pub fn set_status(&self, status: &str) {
        self.bar.set_message(status.to_string());
    }

    /// Finish the progress display with a final message
    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Format a number with thousands separators
pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let bytes: Vec<_> = s.bytes().rev().collect();

    let chunks: Vec<String> = bytes
        .chunks(3)
        .map(|chunk| chunk.iter().rev().map(|&b| b as char).collect::<String>())
        .collect();

    chunks.into_iter().rev().collect::<Vec<_>>().join(",")
}

fn status_label(status: RunStatus) -> console::StyledObject<&'static str> {
    match status {
        RunStatus::Success => style("Run Complete").green().bold(),
        RunStatus::CompletedWithErrors => style("Run Complete (with errors)").yellow().bold(),
        RunStatus::RootUnreadable => style("Index Root Unreadable").red().bold(),
        RunStatus::Interrupted => style("Run Interrupted").yellow().bold(),
    }
}

/// Print a summary of the run
pub fn print_summary(summary: &RunSummary) {
    let totals = &summary.totals;
    let duration_secs = summary.duration.as_secs_f64();
    let rate = if duration_secs > 0.0 {
        totals.stats.files as f64 / duration_secs
    } else {
        0.0
    };

    println!();
    println!("{}", status_label(summary.status));
    println!("{}", style("─".repeat(50)).dim());
    println!(
        "  {} {}",
        style("Started:").bold(),
        summary.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!(
        "  {} {}",
        style("Directories:").bold(),
        format_number(totals.directories)
    );
    println!("  {} {}", style("Files:").bold(), format_number(totals.stats.files));
    println!("  {} {}", style("Moves:").bold(), format_number(totals.stats.moves));
    println!(
        "  {} {}",
        style("Bytes Read:").bold(),
        format_size(totals.stats.bytes_read, BINARY)
    );
    println!(
        "  {} {:.1}s ({:.0} files/sec)",
        style("Duration:").bold(),
        duration_secs,
        rate
    );
    println!(
        "  {} {} of {}",
        style("Peak Workers:").bold(),
        summary.peak_in_flight,
        summary.max_concurrent
    );
    if totals.stats.errors > 0 || totals.failed_directories > 0 {
        println!(
            "  {} {} in files, {} directories",
            style("Errors:").yellow().bold(),
            format_number(totals.stats.errors),
            format_number(totals.failed_directories)
        );
    }
    if summary.cancelled > 0 || summary.withheld > 0 {
        println!(
            "  {} {}",
            style("Not Processed:").yellow().bold(),
            format_number((summary.cancelled + summary.withheld) as u64)
        );
    }
    if summary.accounting_mismatch {
        println!(
            "  {} declared {} jobs, dispatched {}",
            style("Accounting:").red().bold(),
            summary.declared,
            summary.dispatched
        );
    }
    println!();
}

/// Print a header at the start of the run
pub fn print_header(action: &str, root: &str, max_concurrent: usize, output: Option<&str>) {
    println!();
    println!(
        "{} {}",
        style("sgfdb").cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!("{}", style("─".repeat(50)).dim());
    println!("  {} {}", style("Action:").bold(), action);
    println!("  {} {}", style("Index Root:").bold(), root);
    println!("  {} {}", style("Max Concurrency:").bold(), max_concurrent);
    if let Some(output) = output {
        println!("  {} {}", style("Output:").bold(), output);
    }
    println!();
}
