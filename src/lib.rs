//! sgfdb - Bounded-concurrency processing of game-record databases
//!
//! A database is an index directory holding one sub-directory per partition
//! (a year, a tournament, ...), each holding SGF record files. A run applies
//! one action set to every record file, reports each directory as it
//! finishes, and reports database totals at the end.
//!
//! # Features
//!
//! - **Bounded Concurrency**: one worker per in-flight sub-directory, capped
//!   by a semaphore primed with the configured limit.
//!
//! - **Order-Independent Totals**: workers report per-directory deltas; only
//!   the aggregator owns the database totals.
//!
//! - **Action Sets**: count separators, report game structure, or rewrite
//!   records under an output root.
//!
//! # Architecture
//!
//! ```text
//!   index root ──▶ JobBuilder ──▶ Dispatcher ──▶ DirectoryWorker × N ──▶ Aggregator
//!                      ▲                                                    │
//!                      └──────────────────── done ◀─────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```bash
//! # Count records and moves, one directory at a time
//! sgfdb count /data/gogod --no-parallel
//!
//! # Structural report with 8 workers and a progress spinner
//! sgfdb report /data/gogod -j 8 -p
//!
//! # Rewrite every record, 10 nodes per line
//! sgfdb rewrite /data/gogod -o /tmp/rewritten --line-width 10
//! ```

pub mod actions;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod progress;
pub mod record;
pub mod storage;

pub use actions::{ActionSet, ErrorPolicy, FileOutcome};
pub use config::{CliArgs, RunConfig};
pub use error::{Result, SgfDbError};
pub use pipeline::{JobBuilder, RunStatus, RunSummary};
pub use storage::{LocalStorage, Storage};
