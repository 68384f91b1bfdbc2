//! Directory jobs and the statistics they carry

use crate::config::RunConfig;
use crate::error::SgfDbError;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Counters accumulated for one directory, or for a whole database
///
/// Merging is commutative, so totals do not depend on completion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryStats {
    /// Record files processed
    pub files: u64,

    /// Moves (or separator markers, for the count action)
    pub moves: u64,

    /// Parse/write errors
    pub errors: u64,

    /// Variations found by the parser
    pub variations: u64,

    /// Records written by the rewrite action
    pub written: u64,

    /// Records cut short by the move limit
    pub truncated: u64,

    /// Bytes read from record files
    pub bytes_read: u64,

    /// Games per board size (columns, rows)
    pub board_sizes: BTreeMap<(u8, u8), u64>,
}

impl DirectoryStats {
    pub fn merge(&mut self, other: &DirectoryStats) {
        self.files += other.files;
        self.moves += other.moves;
        self.errors += other.errors;
        self.variations += other.variations;
        self.written += other.written;
        self.truncated += other.truncated;
        self.bytes_read += other.bytes_read;
        for (size, count) in &other.board_sizes {
            *self.board_sizes.entry(*size).or_insert(0) += count;
        }
    }
}

/// Why a directory stopped early
#[derive(Debug)]
pub struct JobFailure {
    /// What was being done, e.g. `reading file: /db/1980/a.sgf`
    pub action: String,

    /// The error
    pub error: SgfDbError,
}

impl fmt::Display for JobFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.action, self.error)
    }
}

/// One sub-directory's worth of work
///
/// Built by the JobBuilder, processed exactly once by a worker, and consumed
/// by the aggregator as the completion record.
#[derive(Debug)]
pub struct DirectoryJob {
    /// Position of the sub-directory in the index listing
    pub ordinal: usize,

    /// Sub-directory name
    pub name: String,

    /// Full path of the sub-directory
    pub path: PathBuf,

    /// Counters for this directory only (owned by the worker)
    pub stats: DirectoryStats,

    /// Set when processing stopped on an error
    pub failure: Option<JobFailure>,

    config: Arc<RunConfig>,
}

impl DirectoryJob {
    pub fn new(ordinal: usize, name: impl Into<String>, config: Arc<RunConfig>) -> Self {
        let name = name.into();
        let path = config.index_root.join(&name);
        Self {
            ordinal,
            name,
            path,
            stats: DirectoryStats::default(),
            failure: None,
            config,
        }
    }

    /// The run configuration this job belongs to
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Record the error that stopped this directory
    pub fn fail(&mut self, action: impl Into<String>, error: impl Into<SgfDbError>) {
        self.failure = Some(JobFailure {
            action: action.into(),
            error: error.into(),
        });
    }

    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }

    /// Whether the configured file limit has been reached
    pub fn file_limit_reached(&self) -> bool {
        let limit = self.config.file_limit as u64;
        limit > 0 && self.stats.files >= limit
    }
}

/// What the aggregator keeps of a finished job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryReport {
    pub ordinal: usize,
    pub name: String,
    pub stats: DirectoryStats,

    /// Failure text, if the directory stopped on an error
    pub failure: Option<String>,
}

impl From<&DirectoryJob> for DirectoryReport {
    fn from(job: &DirectoryJob) -> Self {
        Self {
            ordinal: job.ordinal,
            name: job.name.clone(),
            stats: job.stats.clone(),
            failure: job.failure.as_ref().map(ToString::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::ActionSet;
    use crate::error::StorageError;

    #[test]
    fn test_merge_is_commutative() {
        let mut a = DirectoryStats {
            files: 2,
            moves: 8,
            ..Default::default()
        };
        a.board_sizes.insert((19, 19), 2);
        let mut b = DirectoryStats {
            files: 1,
            errors: 1,
            ..Default::default()
        };
        b.board_sizes.insert((9, 9), 1);
        b.board_sizes.insert((19, 19), 1);

        let mut ab = DirectoryStats::default();
        ab.merge(&a);
        ab.merge(&b);
        let mut ba = DirectoryStats::default();
        ba.merge(&b);
        ba.merge(&a);

        assert_eq!(ab, ba);
        assert_eq!(ab.files, 3);
        assert_eq!(ab.board_sizes[&(19, 19)], 3);
    }

    #[test]
    fn test_job_failure_and_limit() {
        let mut config = RunConfig::new("/db", ActionSet::Count);
        config.file_limit = 2;
        let mut job = DirectoryJob::new(4, "1980", Arc::new(config));
        assert_eq!(job.path, PathBuf::from("/db/1980"));
        assert!(!job.file_limit_reached());

        job.stats.files = 2;
        assert!(job.file_limit_reached());

        job.fail(
            "reading directory: /db/1980",
            StorageError::NotFound {
                path: "/db/1980".into(),
            },
        );
        let report = DirectoryReport::from(&job);
        assert_eq!(report.ordinal, 4);
        assert!(report
            .failure
            .unwrap()
            .starts_with("reading directory: /db/1980: "));
    }
}
