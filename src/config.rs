//! Configuration types for sgfdb
//!
//! This module defines:
//! - CLI argument parsing using clap derive macros
//! - The validated run configuration shared by every job of a run
//! - Concurrency-limit derivation

use crate::actions::{ActionSet, ErrorPolicy};
use crate::error::ConfigError;
use crate::record::ParseMode;
use clap::{Args, Parser, Subcommand};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Record files are matched by this substring of their name
pub const RECORD_SUFFIX: &str = ".sgf";

/// Entries starting with this marker are skipped
pub const HIDDEN_MARKER: char = '.';

/// Marker counted as one move by the count action
pub const RECORD_SEPARATOR: u8 = b';';

/// Nodes per line in rewritten files
pub const DEFAULT_LINE_WIDTH: usize = 12;

/// Maximum reasonable concurrency
pub const MAX_CONCURRENCY: usize = 512;

/// Batch processor for SGF game-record databases
#[derive(Parser, Debug, Clone)]
#[command(
    name = "sgfdb",
    version,
    about = "Batch processor for SGF game-record databases",
    long_about = "Processes an index directory of sub-directories of .sgf record files.\n\n\
                  Each sub-directory is handled by its own worker; the number of workers in\n\
                  flight never exceeds the configured concurrency.",
    after_help = "EXAMPLES:\n    \
        sgfdb count /data/GoGoD/Database/\n    \
        sgfdb report /data/GoGoD/Database/ -j 1 --file-limit 10\n    \
        sgfdb rewrite /data/GoGoD/Database/ -o /tmp/rewritten --line-width 16 -p\n    \
        sgfdb count /data/db --exclude '^Go(Library|Seigen)' --timeout 600"
)]
pub struct CliArgs {
    /// Action to run over the database
    #[command(subcommand)]
    pub command: Command,

    /// Verbose output (debug logging)
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,
}

/// Built-in action sets
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Count record files and move markers
    Count(RunArgs),

    /// Parse every record and report structure (moves, variations, board sizes)
    Report(RunArgs),

    /// Parse every record and write it back under the output directory
    Rewrite(RunArgs),
}

impl Command {
    pub fn action(&self) -> ActionSet {
        match self {
            Command::Count(_) => ActionSet::Count,
            Command::Report(_) => ActionSet::Report,
            Command::Rewrite(_) => ActionSet::Rewrite,
        }
    }

    pub fn run_args(&self) -> &RunArgs {
        match self {
            Command::Count(args) | Command::Report(args) | Command::Rewrite(args) => args,
        }
    }
}

/// Run parameters shared by all actions
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Index directory containing one sub-directory per partition
    #[arg(value_name = "INDEX_ROOT")]
    pub index_root: PathBuf,

    /// Output root for rewritten records (mirrors the index layout)
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Process one sub-directory at a time
    #[arg(long)]
    pub no_parallel: bool,

    /// Log the concurrency decision and every change of in-flight workers
    #[arg(long)]
    pub report_concurrency: bool,

    /// Maximum sub-directories in flight (0 = number of CPUs)
    #[arg(short = 'j', long, default_value = "0", value_name = "NUM")]
    pub max_concurrent: usize,

    /// Skip the first N record files of each sub-directory
    #[arg(long, default_value = "0", value_name = "NUM")]
    pub skip_files: usize,

    /// Stop each sub-directory after N record files (0 = unlimited)
    #[arg(long, default_value = "0", value_name = "NUM")]
    pub file_limit: usize,

    /// Stop parsing a record after N moves (0 = unlimited)
    #[arg(long, default_value = "0", value_name = "NUM")]
    pub move_limit: usize,

    /// Parser mode bitmask: 1=comments 2=trace 4=play 8=gogod
    #[arg(long, default_value_t = ParseMode::standard().bits(), value_name = "BITS")]
    pub parse_mode: u32,

    /// Nodes per line in rewritten records
    #[arg(long, default_value_t = DEFAULT_LINE_WIDTH, value_name = "NUM")]
    pub line_width: usize,

    /// What a parse or write error does to the rest of the sub-directory
    #[arg(long, value_enum, default_value = "skip-file")]
    pub on_error: ErrorPolicy,

    /// Skip sub-directories whose name matches (can be repeated)
    #[arg(long = "exclude", value_name = "PATTERN", action = clap::ArgAction::Append)]
    pub exclude_patterns: Vec<String>,

    /// Stop enqueuing sub-directories after this many seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Show a progress spinner and a summary
    #[arg(short = 'p', long)]
    pub progress: bool,
}

/// Effective concurrency: forced to 1 without parallelism, CPUs when 0 is requested
pub fn effective_concurrency(enable_parallel: bool, requested: usize, cpus: usize) -> usize {
    if !enable_parallel {
        return 1;
    }
    if requested == 0 {
        cpus.clamp(1, MAX_CONCURRENCY)
    } else {
        requested
    }
}

/// Validated run configuration
///
/// Created once per database run and shared read-only by every job.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Who asked for this run (shows up in logs)
    pub requester: String,

    /// Index directory
    pub index_root: PathBuf,

    /// Output root for rewritten records
    pub output_root: Option<PathBuf>,

    /// Parallel execution enabled
    pub enable_parallel: bool,

    /// Effective maximum sub-directories in flight
    pub max_concurrent: usize,

    /// Log concurrency changes
    pub report_concurrency: bool,

    /// Record files skipped at the start of each sub-directory
    pub skip_files: usize,

    /// Record files processed per sub-directory (0 = unlimited)
    pub file_limit: usize,

    /// Moves parsed per record (0 = unlimited)
    pub move_limit: usize,

    /// Parser mode
    pub parse_mode: ParseMode,

    /// Nodes per line in rewritten records
    pub line_width: usize,

    /// Action set applied per file, per directory and per database
    pub action: ActionSet,

    /// Reaction to parse/write errors
    pub error_policy: ErrorPolicy,

    /// Compiled sub-directory exclude patterns
    pub exclude_patterns: Vec<Regex>,

    /// Enqueue deadline
    pub timeout: Option<Duration>,

    /// Show progress
    pub show_progress: bool,

    /// Verbose logging
    pub verbose: bool,
}

impl RunConfig {
    /// Configuration with defaults for the given index root and action
    pub fn new(index_root: impl Into<PathBuf>, action: ActionSet) -> Self {
        Self {
            requester: action.name().to_string(),
            index_root: index_root.into(),
            output_root: None,
            enable_parallel: true,
            max_concurrent: effective_concurrency(true, 0, num_cpus::get()),
            report_concurrency: false,
            skip_files: 0,
            file_limit: 0,
            move_limit: 0,
            parse_mode: ParseMode::standard(),
            line_width: DEFAULT_LINE_WIDTH,
            action,
            error_policy: ErrorPolicy::SkipFile,
            exclude_patterns: Vec::new(),
            timeout: None,
            show_progress: false,
            verbose: false,
        }
    }

    /// Create and validate configuration from CLI arguments
    pub fn from_args(args: CliArgs) -> Result<Self, ConfigError> {
        let action = args.command.action();
        let run = args.command.run_args().clone();

        let max_concurrent =
            effective_concurrency(!run.no_parallel, run.max_concurrent, num_cpus::get());
        if max_concurrent == 0 || max_concurrent > MAX_CONCURRENCY {
            return Err(ConfigError::InvalidConcurrency {
                count: max_concurrent,
                max: MAX_CONCURRENCY,
            });
        }

        if run.line_width == 0 {
            return Err(ConfigError::InvalidLineWidth {
                width: run.line_width,
            });
        }

        let exclude_patterns = run
            .exclude_patterns
            .iter()
            .map(|p| {
                Regex::new(p).map_err(|e| ConfigError::InvalidExcludePattern {
                    pattern: p.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        if action == ActionSet::Rewrite {
            let output = run.output.as_ref().ok_or(ConfigError::MissingOutputRoot {
                action: action.name(),
            })?;
            validate_output_root(output)?;
        }

        Ok(Self {
            requester: action.name().to_string(),
            index_root: run.index_root,
            output_root: run.output,
            enable_parallel: !run.no_parallel,
            max_concurrent,
            report_concurrency: run.report_concurrency,
            skip_files: run.skip_files,
            file_limit: run.file_limit,
            move_limit: run.move_limit,
            parse_mode: ParseMode::from_bits(run.parse_mode),
            line_width: run.line_width,
            action,
            error_policy: run.on_error,
            exclude_patterns,
            timeout: run.timeout.map(Duration::from_secs),
            show_progress: run.progress,
            verbose: args.verbose,
        })
    }

    /// Check if a sub-directory name should be excluded
    pub fn is_excluded(&self, name: &str) -> bool {
        self.exclude_patterns.iter().any(|re| re.is_match(name))
    }
}

fn validate_output_root(output: &Path) -> Result<(), ConfigError> {
    if output.exists() && !output.is_dir() {
        return Err(ConfigError::InvalidOutputPath {
            path: output.to_path_buf(),
            reason: "exists and is not a directory".to_string(),
        });
    }
    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            return Err(ConfigError::InvalidOutputPath {
                path: output.to_path_buf(),
                reason: format!("Parent directory '{}' does not exist", parent.display()),
            });
        }
    }
    Ok(())
}
