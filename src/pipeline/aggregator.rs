//! Aggregator - the only owner of database totals
//!
//! Counts completion records until the dispatcher has sealed the run and the
//! count is reached, folding each job's statistics into the totals. Then runs
//! the database-end hook once and hands everything back to the builder.

use super::dispatcher::Completion;
use super::job::{DirectoryReport, DirectoryStats};
use super::PipelineCounters;
use crate::actions::ActionSet;
use crate::error::PipelineError;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// Whole-database accumulator
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatabaseTotals {
    /// Directories whose completion was counted
    pub directories: u64,

    /// Directories that stopped on an error
    pub failed_directories: u64,

    /// Directories whose worker died (also counted as failed)
    pub lost_directories: u64,

    pub stats: DirectoryStats,
}

impl DatabaseTotals {
    pub fn record(&mut self, report: &DirectoryReport) {
        self.directories += 1;
        if report.failure.is_some() {
            self.failed_directories += 1;
        }
        self.stats.merge(&report.stats);
    }
}

/// What the aggregator hands back when it stops
#[derive(Debug, Default)]
pub struct Aggregation {
    pub totals: DatabaseTotals,

    /// Per-directory reports in completion order
    pub reports: Vec<DirectoryReport>,

    /// Sealed expected count, if the run was sealed
    pub expected: Option<usize>,

    /// Completion records received
    pub counted: usize,
}

pub struct Aggregator {
    action: ActionSet,
    counters: Arc<PipelineCounters>,
}

impl Aggregator {
    pub fn new(action: ActionSet, counters: Arc<PipelineCounters>) -> Self {
        Self { action, counters }
    }

    pub async fn run(
        self,
        mut completions_rx: mpsc::UnboundedReceiver<Completion>,
        mut expected_rx: oneshot::Receiver<usize>,
        done_tx: oneshot::Sender<Aggregation>,
    ) {
        let mut aggregation = Aggregation::default();
        let mut sealed = false;

        loop {
            if let Some(expected) = aggregation.expected {
                if aggregation.counted >= expected {
                    break;
                }
            }

            tokio::select! {
                biased;

                expected = &mut expected_rx, if !sealed => {
                    sealed = true;
                    match expected {
                        Ok(expected) => {
                            debug!(
                                expected = expected,
                                counted = aggregation.counted,
                                "Run sealed"
                            );
                            aggregation.expected = Some(expected);
                        }
                        Err(_) => warn!("Dispatcher stopped without sealing the run"),
                    }
                }

                completion = completions_rx.recv() => match completion {
                    Some(completion) => {
                        aggregation.counted += 1;
                        self.record(&mut aggregation, completion);
                    }
                    None => {
                        // Every sender is gone, nothing more can arrive
                        if aggregation.expected.map_or(true, |e| aggregation.counted < e) {
                            warn!(
                                counted = aggregation.counted,
                                expected = ?aggregation.expected,
                                "Completion queue closed before the run was complete"
                            );
                        }
                        break;
                    }
                },
            }
        }

        info!(
            directories = aggregation.totals.directories,
            files = aggregation.totals.stats.files,
            moves = aggregation.totals.stats.moves,
            "Database finished"
        );
        self.action.on_database_end(&aggregation.totals);

        if done_tx.send(aggregation).is_err() {
            debug!("Job builder no longer waiting for completion");
        }
    }

    fn record(&self, aggregation: &mut Aggregation, completion: Completion) {
        let report = match completion {
            Completion::Finished(job) => DirectoryReport::from(&job),
            Completion::Lost {
                ordinal,
                name,
                message,
            } => {
                let error = PipelineError::WorkerPanicked { ordinal, message };
                let report = DirectoryReport {
                    ordinal,
                    failure: Some(format!("processing directory: {}: {}", name, error)),
                    name,
                    stats: DirectoryStats::default(),
                };
                // The worker never reached its directory-end hook
                println!("{}", self.action.directory_line(&report));
                aggregation.totals.lost_directories += 1;
                report
            }
        };

        self.counters.record_completion(&report.stats);
        aggregation.totals.record(&report);
        aggregation.reports.push(report);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunConfig;
    use crate::pipeline::DirectoryJob;

    fn finished(ordinal: usize, files: u64, moves: u64) -> Completion {
        let config = Arc::new(RunConfig::new("/db", ActionSet::Count));
        let mut job = DirectoryJob::new(ordinal, format!("d{}", ordinal), config);
        job.stats.files = files;
        job.stats.moves = moves;
        Completion::Finished(job)
    }

    fn aggregator() -> Aggregator {
        Aggregator::new(ActionSet::Count, Arc::new(PipelineCounters::new(2, false)))
    }

    #[tokio::test]
    async fn test_waits_for_all_completions_after_seal() {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        let (expected_tx, expected_rx) = oneshot::channel();
        let (done_tx, mut done_rx) = oneshot::channel();

        let handle = tokio::spawn(aggregator().run(completions_rx, expected_rx, done_tx));

        // Sealed before any completion arrived
        expected_tx.send(2).unwrap();
        completions_tx.send(finished(1, 1, 0)).unwrap();
        tokio::task::yield_now().await;
        assert!(done_rx.try_recv().is_err());

        completions_tx.send(finished(0, 2, 8)).unwrap();
        let aggregation = done_rx.await.unwrap();
        handle.await.unwrap();

        assert_eq!(aggregation.counted, 2);
        assert_eq!(aggregation.expected, Some(2));
        assert_eq!(aggregation.totals.directories, 2);
        assert_eq!(aggregation.totals.stats.files, 3);
        assert_eq!(aggregation.totals.stats.moves, 8);
    }

    #[tokio::test]
    async fn test_lost_worker_counts_as_failed() {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        let (expected_tx, expected_rx) = oneshot::channel();
        let (done_tx, done_rx) = oneshot::channel();

        completions_tx
            .send(Completion::Lost {
                ordinal: 3,
                name: "1980".into(),
                message: "task panicked".into(),
            })
            .unwrap();
        expected_tx.send(1).unwrap();

        aggregator().run(completions_rx, expected_rx, done_tx).await;
        let aggregation = done_rx.await.unwrap();

        assert_eq!(aggregation.totals.failed_directories, 1);
        assert_eq!(aggregation.totals.lost_directories, 1);
        let failure = aggregation.reports[0].failure.as_deref().unwrap();
        assert!(failure.starts_with("processing directory: 1980: "));
    }

    #[tokio::test]
    async fn test_stops_when_senders_vanish_unsealed() {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        let (expected_tx, expected_rx) = oneshot::channel::<usize>();
        let (done_tx, done_rx) = oneshot::channel();

        completions_tx.send(finished(0, 1, 1)).unwrap();
        drop(completions_tx);
        drop(expected_tx);

        aggregator().run(completions_rx, expected_rx, done_tx).await;
        let aggregation = done_rx.await.unwrap();
        assert_eq!(aggregation.expected, None);
        assert_eq!(aggregation.counted, 1);
    }
}
