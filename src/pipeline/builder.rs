//! Job builder - drives one database run
//!
//! Enumerates the index root, starts the dispatcher and aggregator, enqueues
//! one job per qualifying sub-directory, declares the count, and waits for
//! the aggregator to signal completion.

use super::aggregator::{Aggregation, Aggregator, DatabaseTotals};
use super::dispatcher::{DispatchReport, Dispatcher};
use super::job::{DirectoryJob, DirectoryReport};
use super::worker::DirectoryWorker;
use super::PipelineCounters;
use crate::config::RunConfig;
use crate::error::{PipelineError, Result};
use crate::storage::Storage;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot, Semaphore};
use tracing::{debug, error, info, warn};

/// Where a run is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Enumerating,
    Dispatching,
    AwaitingCompletion,
    Done,
}

/// Outcome of a run, mapped to the process exit status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Every directory and file was processed cleanly
    Success,
    /// The run finished but some directory or file reported an error
    CompletedWithErrors,
    /// The index root could not be enumerated; no jobs were built
    RootUnreadable,
    /// Shutdown was requested before every directory was dispatched
    Interrupted,
}

impl RunStatus {
    pub fn code(self) -> u8 {
        match self {
            RunStatus::Success => 0,
            RunStatus::CompletedWithErrors => 1,
            RunStatus::RootUnreadable => 2,
            RunStatus::Interrupted => 3,
        }
    }
}

/// Everything a caller gets back from a run
#[derive(Debug)]
pub struct RunSummary {
    pub status: RunStatus,
    pub totals: DatabaseTotals,

    /// Per-directory reports in completion order
    pub reports: Vec<DirectoryReport>,

    /// Jobs the builder enqueued
    pub declared: usize,
    pub dispatched: usize,
    pub cancelled: usize,

    /// Qualifying directories never enqueued because of shutdown
    pub withheld: usize,

    /// The dispatcher saw a different job count than was declared
    pub accounting_mismatch: bool,

    pub max_concurrent: usize,
    pub peak_in_flight: usize,
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
}

impl RunSummary {
    fn root_unreadable(
        max_concurrent: usize,
        started_at: DateTime<Utc>,
        duration: Duration,
    ) -> Self {
        Self {
            status: RunStatus::RootUnreadable,
            totals: DatabaseTotals::default(),
            reports: Vec::new(),
            declared: 0,
            dispatched: 0,
            cancelled: 0,
            withheld: 0,
            accounting_mismatch: false,
            max_concurrent,
            peak_in_flight: 0,
            started_at,
            duration,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Success
    }
}

/// Builds and runs the jobs for one index root
pub struct JobBuilder {
    config: Arc<RunConfig>,
    storage: Arc<dyn Storage>,
    shutdown: Arc<AtomicBool>,
    counters: Arc<PipelineCounters>,
    phase: RunPhase,
}

impl JobBuilder {
    pub fn new(config: RunConfig, storage: Arc<dyn Storage>) -> Self {
        let max_concurrent = config.max_concurrent.max(1);
        let counters = Arc::new(PipelineCounters::new(
            max_concurrent,
            config.report_concurrency,
        ));
        Self {
            config: Arc::new(config),
            storage,
            shutdown: Arc::new(AtomicBool::new(false)),
            counters,
            phase: RunPhase::Idle,
        }
    }

    /// Get shutdown flag for signal handlers
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Live counters, for progress display
    pub fn counters(&self) -> Arc<PipelineCounters> {
        Arc::clone(&self.counters)
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    fn advance(&mut self, phase: RunPhase) {
        debug!(from = ?self.phase, to = ?phase, "Run phase");
        self.phase = phase;
    }

    /// Run the database
    pub async fn run(mut self) -> Result<RunSummary> {
        let start_time = Instant::now();
        let started_at: DateTime<Utc> = Utc::now();
        let max_concurrent = self.counters.max_concurrent();
        let root = self.config.index_root.clone();

        info!(
            root = %root.display(),
            action = self.config.action.name(),
            parse_mode = %self.config.parse_mode,
            requester = %self.config.requester,
            "Starting database run"
        );
        if self.config.report_concurrency {
            info!(
                max_concurrent = max_concurrent,
                parallel = self.config.enable_parallel,
                cpus = num_cpus::get(),
                "Concurrency limit"
            );
        }

        self.advance(RunPhase::Enumerating);
        let entries = match self.storage.list_entries(&root) {
            Ok(entries) => entries,
            Err(e) => {
                println!("Error reading sgfdb directory: {}, {}", root.display(), e);
                error!(root = %root.display(), error = %e, "Cannot enumerate index root");
                self.advance(RunPhase::Done);
                return Ok(RunSummary::root_unreadable(
                    max_concurrent,
                    started_at,
                    start_time.elapsed(),
                ));
            }
        };

        let (jobs_tx, jobs_rx) = mpsc::unbounded_channel::<DirectoryJob>();
        let (declared_tx, declared_rx) = oneshot::channel();
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        let (expected_tx, expected_rx) = oneshot::channel();
        let (done_tx, done_rx) = oneshot::channel::<Aggregation>();

        let aggregator = Aggregator::new(self.config.action, Arc::clone(&self.counters));
        tokio::spawn(aggregator.run(completions_rx, expected_rx, done_tx));

        let dispatcher = Dispatcher::new(
            DirectoryWorker::new(Arc::clone(&self.storage)),
            Arc::new(Semaphore::new(max_concurrent)),
            Arc::clone(&self.counters),
            Arc::clone(&self.shutdown),
        );
        let dispatch_handle =
            tokio::spawn(dispatcher.run(jobs_rx, declared_rx, completions_tx, expected_tx));

        let timer = self.config.timeout.map(|timeout| {
            let shutdown = Arc::clone(&self.shutdown);
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                warn!(timeout_secs = timeout.as_secs(), "Run timed out, stopping");
                shutdown.store(true, Ordering::SeqCst);
            })
        });

        self.advance(RunPhase::Dispatching);
        let mut declared = 0usize;
        let mut withheld = 0usize;
        for (ordinal, entry) in entries.iter().enumerate() {
            if !entry.is_dir || entry.is_hidden() {
                continue;
            }
            if self.config.is_excluded(&entry.name) {
                debug!(dir = %entry.name, "Excluded directory");
                continue;
            }
            if self.shutdown.load(Ordering::Relaxed) {
                withheld += 1;
                continue;
            }

            let job = DirectoryJob::new(ordinal, &entry.name, Arc::clone(&self.config));
            jobs_tx.send(job).map_err(|_| PipelineError::QueueClosed)?;
            declared += 1;
        }
        if withheld > 0 {
            warn!(withheld = withheld, "Shutdown requested, directories not enqueued");
        }

        drop(jobs_tx);
        if declared_tx.send(declared).is_err() {
            warn!("Dispatcher stopped before the job count was declared");
        }

        self.advance(RunPhase::AwaitingCompletion);
        let dispatch: DispatchReport = dispatch_handle
            .await
            .map_err(|e| PipelineError::TaskFailed {
                task: "dispatcher",
                message: e.to_string(),
            })??;
        let aggregation = done_rx.await.map_err(|_| PipelineError::AggregatorStopped)?;

        if let Some(timer) = timer {
            timer.abort();
        }
        self.advance(RunPhase::Done);

        let totals = aggregation.totals;
        let status = if withheld > 0 || dispatch.cancelled > 0 {
            RunStatus::Interrupted
        } else if totals.failed_directories > 0 || totals.stats.errors > 0 {
            RunStatus::CompletedWithErrors
        } else {
            RunStatus::Success
        };

        let summary = RunSummary {
            status,
            totals,
            reports: aggregation.reports,
            declared,
            dispatched: dispatch.dispatched,
            cancelled: dispatch.cancelled,
            withheld,
            accounting_mismatch: dispatch.mismatch,
            max_concurrent,
            peak_in_flight: self.counters.peak_in_flight(),
            started_at,
            duration: start_time.elapsed(),
        };

        info!(
            status = ?summary.status,
            directories = summary.totals.directories,
            files = summary.totals.stats.files,
            moves = summary.totals.stats.moves,
            errors = summary.totals.stats.errors,
            peak_in_flight = summary.peak_in_flight,
            duration_secs = summary.duration.as_secs_f64(),
            "Database run complete"
        );

        Ok(summary)
    }
}
