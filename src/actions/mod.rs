//! Action sets applied by the pipeline
//!
//! An action set supplies three hooks:
//! - `on_file`: called by a worker for every non-empty record file
//! - `on_directory_end`: called once by the worker when a directory is done
//! - `on_database_end`: called once by the aggregator when the run is done
//!
//! The set is closed ([`ActionSet`]); per-file hooks only touch the job they
//! are given, and database totals are only ever touched by the aggregator.

mod count;
mod report;
mod rewrite;

pub use count::count_moves;

use crate::error::SgfDbError;
use crate::pipeline::{DatabaseTotals, DirectoryJob, DirectoryReport};
use crate::storage::Storage;

/// Built-in action sets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionSet {
    /// Count record files and separator markers
    Count,
    /// Parse records and report their structure
    Report,
    /// Parse records and write them under the output root
    Rewrite,
}

/// What a per-file hook wants the worker to do next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    /// Go on with the next file
    Continue,
    /// Stop this directory (the directory-end hook still runs)
    StopDirectory,
}

/// Reaction to a parse or write error inside a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum ErrorPolicy {
    /// Record the error, stop this file, go on with the directory
    SkipFile,
    /// Record the error and stop the whole directory
    AbortDirectory,
    /// Record the error and finish the file anyway
    Continue,
}

impl ErrorPolicy {
    /// Apply the policy to an error found in a file
    ///
    /// Returns `Some(outcome)` when the file must stop here, `None` when the
    /// caller should go on with it.
    pub fn apply(
        self,
        job: &mut DirectoryJob,
        action: String,
        error: SgfDbError,
    ) -> Option<FileOutcome> {
        match self {
            ErrorPolicy::SkipFile => Some(FileOutcome::Continue),
            ErrorPolicy::AbortDirectory => {
                job.fail(action, error);
                Some(FileOutcome::StopDirectory)
            }
            ErrorPolicy::Continue => None,
        }
    }
}

impl ActionSet {
    pub fn name(&self) -> &'static str {
        match self {
            ActionSet::Count => "count",
            ActionSet::Report => "report",
            ActionSet::Rewrite => "rewrite",
        }
    }

    /// Per-file hook
    pub fn on_file(
        &self,
        job: &mut DirectoryJob,
        storage: &dyn Storage,
        file_name: &str,
        content: &[u8],
    ) -> FileOutcome {
        match self {
            ActionSet::Count => count::on_file(job, content),
            ActionSet::Report => report::on_file(job, file_name, content),
            ActionSet::Rewrite => rewrite::on_file(job, storage, file_name, content),
        }
    }

    /// Per-directory hook: prints the directory's report line
    pub fn on_directory_end(&self, job: &DirectoryJob) {
        println!("{}", self.directory_line(&DirectoryReport::from(job)));
    }

    /// Per-database hook: prints the totals
    pub fn on_database_end(&self, totals: &DatabaseTotals) {
        for line in self.database_lines(totals) {
            println!("{}", line);
        }
    }

    /// `ordinal:name, files: F, moves: M[, errors: E]`
    pub fn directory_line(&self, report: &DirectoryReport) -> String {
        if let Some(failure) = &report.failure {
            return format!("{:3}:{}", report.ordinal, failure);
        }

        let stats = &report.stats;
        let mut line = format!(
            "{:3}:{}, files: {}, moves: {}",
            report.ordinal, report.name, stats.files, stats.moves
        );
        if *self == ActionSet::Report {
            line.push_str(&format!(", variations: {}", stats.variations));
        }
        if stats.truncated > 0 {
            line.push_str(&format!(", truncated: {}", stats.truncated));
        }
        if stats.errors > 0 {
            line.push_str(&format!(", errors: {}", stats.errors));
        }
        line
    }

    pub fn database_lines(&self, totals: &DatabaseTotals) -> Vec<String> {
        let stats = &totals.stats;
        let mut lines = Vec::new();

        let mut total = format!(
            "Total SGF files = {}, total moves = {}",
            stats.files, stats.moves
        );
        if stats.errors > 0 {
            total.push_str(&format!(", errors = {}", stats.errors));
        }
        lines.push(total);

        if totals.failed_directories > 0 {
            lines.push(format!(
                "Directories with errors = {} of {}",
                totals.failed_directories, totals.directories
            ));
        }

        match self {
            ActionSet::Count => {}
            ActionSet::Report => {
                lines.push(format!("Total variations = {}", stats.variations));
                for ((cols, rows), games) in &stats.board_sizes {
                    lines.push(format!("Board {}x{}: {} games", cols, rows, games));
                }
            }
            ActionSet::Rewrite => {
                lines.push(format!("Records written = {}", stats.written));
            }
        }
        lines
    }
}
