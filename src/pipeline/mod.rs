//! Bounded-concurrency directory pipeline
//!
//! # Architecture
//!
//! ```text
//!   JobBuilder ── jobs (unbounded mpsc) ──▶ Dispatcher ── spawn ──▶ DirectoryWorker × N
//!       │                                      ▲   │                      │
//!       └── declared count (oneshot) ──────────┘   │                      │ completions
//!                                                  │ sealed count         ▼ (unbounded mpsc)
//!                                                  └──(oneshot)──────▶ Aggregator
//!                                                                         │
//!   JobBuilder ◀──────────────── done (oneshot) ──────────────────────────┘
//! ```
//!
//! - The availability semaphore is primed with `max_concurrent` permits. The
//!   dispatcher takes a permit before taking a job, and moves it into the
//!   worker task; the permit returns when that task ends, whichever way it
//!   ends, so at most `max_concurrent` workers are ever in flight.
//! - The end of input is a two-phase protocol instead of an in-band sentinel:
//!   the builder closes the job queue and sends the number of jobs it built;
//!   the dispatcher checks that number against what it dispatched and seals
//!   the run by telling the aggregator how many completions to expect.
//! - Only the aggregator touches database totals. Workers report per-job
//!   deltas through their completion record.

pub mod aggregator;
pub mod builder;
pub mod dispatcher;
pub mod job;
pub mod worker;

pub use aggregator::{Aggregation, Aggregator, DatabaseTotals};
pub use builder::{JobBuilder, RunPhase, RunStatus, RunSummary};
pub use dispatcher::{Completion, DispatchReport, Dispatcher};
pub use job::{DirectoryJob, DirectoryReport, DirectoryStats, JobFailure};
pub use worker::DirectoryWorker;

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Live counters for progress display and concurrency accounting
#[derive(Debug)]
pub struct PipelineCounters {
    /// Jobs handed to workers
    pub dispatched: AtomicU64,

    /// Completion records folded in by the aggregator
    pub completed: AtomicU64,

    /// Files processed by completed directories
    pub files: AtomicU64,

    /// Moves counted by completed directories
    pub moves: AtomicU64,

    /// Errors counted by completed directories
    pub errors: AtomicU64,

    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    max_concurrent: usize,
    report_changes: bool,
}

impl PipelineCounters {
    pub fn new(max_concurrent: usize, report_changes: bool) -> Self {
        Self {
            dispatched: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            files: AtomicU64::new(0),
            moves: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
            max_concurrent,
            report_changes,
        }
    }

    /// Mark a worker as in flight until the guard drops
    pub fn enter_worker(self: &Arc<Self>, ordinal: usize) -> InFlightGuard {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        if self.report_changes {
            info!(
                ordinal = ordinal,
                in_flight = now,
                max = self.max_concurrent,
                "Worker started"
            );
        }
        InFlightGuard {
            counters: Arc::clone(self),
            ordinal,
        }
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of workers in flight at once so far
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    pub(crate) fn record_dispatch(&self) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_completion(&self, stats: &DirectoryStats) {
        self.completed.fetch_add(1, Ordering::Relaxed);
        self.files.fetch_add(stats.files, Ordering::Relaxed);
        self.moves.fetch_add(stats.moves, Ordering::Relaxed);
        self.errors.fetch_add(stats.errors, Ordering::Relaxed);
    }

    pub fn snapshot(&self, elapsed: Duration) -> PipelineProgress {
        PipelineProgress {
            dispatched: self.dispatched.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            files: self.files.load(Ordering::Relaxed),
            moves: self.moves.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            in_flight: self.in_flight(),
            max_concurrent: self.max_concurrent,
            elapsed,
        }
    }
}

/// RAII guard for an in-flight worker
pub struct InFlightGuard {
    counters: Arc<PipelineCounters>,
    ordinal: usize,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let now = self.counters.in_flight.fetch_sub(1, Ordering::SeqCst) - 1;
        if self.counters.report_changes {
            info!(
                ordinal = self.ordinal,
                in_flight = now,
                max = self.counters.max_concurrent,
                "Worker finished"
            );
        }
    }
}

/// Progress information for display
#[derive(Debug, Clone, Default)]
pub struct PipelineProgress {
    pub dispatched: u64,
    pub completed: u64,
    pub files: u64,
    pub moves: u64,
    pub errors: u64,
    pub in_flight: usize,
    pub max_concurrent: usize,
    pub elapsed: Duration,
}

impl PipelineProgress {
    /// Files per second over the whole run
    pub fn files_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.files as f64 / secs
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_flight_guard_tracks_peak() {
        let counters = Arc::new(PipelineCounters::new(4, false));
        let a = counters.enter_worker(0);
        let b = counters.enter_worker(1);
        assert_eq!(counters.in_flight(), 2);
        drop(a);
        let c = counters.enter_worker(2);
        assert_eq!(counters.in_flight(), 2);
        drop(b);
        drop(c);
        assert_eq!(counters.in_flight(), 0);
        assert_eq!(counters.peak_in_flight(), 2);
    }

    #[test]
    fn test_progress_rate() {
        let progress = PipelineProgress {
            files: 10_000,
            elapsed: Duration::from_secs(10),
            ..Default::default()
        };
        assert!((progress.files_per_second() - 1000.0).abs() < 0.1);
        assert_eq!(PipelineProgress::default().files_per_second(), 0.0);
    }
}
