//! Dispatcher - gates directory jobs on the availability semaphore
//!
//! The dispatcher takes a permit, then the next job, and spawns a worker task
//! that owns the permit until it has pushed its completion record. Once the
//! job queue closes it checks the builder's declared count against what it
//! saw and seals the run for the aggregator.

use super::job::DirectoryJob;
use super::worker::DirectoryWorker;
use super::PipelineCounters;
use crate::error::PipelineError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Semaphore};
use tracing::{debug, error, info, warn};

/// What a worker task hands to the aggregator
#[derive(Debug)]
pub enum Completion {
    /// The worker ran to the end (possibly with a failure recorded on the job)
    Finished(DirectoryJob),

    /// The worker task died; the job went with it
    Lost {
        ordinal: usize,
        name: String,
        message: String,
    },
}

impl Completion {
    pub fn ordinal(&self) -> usize {
        match self {
            Completion::Finished(job) => job.ordinal,
            Completion::Lost { ordinal, .. } => *ordinal,
        }
    }
}

/// Dispatch accounting for one run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReport {
    /// Jobs handed to workers
    pub dispatched: usize,

    /// Jobs withdrawn from the queue after shutdown was requested
    pub cancelled: usize,

    /// Count declared by the builder, if it declared one
    pub declared: Option<usize>,

    /// Declared count disagreed with what was observed
    pub mismatch: bool,
}

pub struct Dispatcher {
    worker: DirectoryWorker,
    semaphore: Arc<Semaphore>,
    counters: Arc<PipelineCounters>,
    shutdown: Arc<AtomicBool>,
}

impl Dispatcher {
    pub fn new(
        worker: DirectoryWorker,
        semaphore: Arc<Semaphore>,
        counters: Arc<PipelineCounters>,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        Self {
            worker,
            semaphore,
            counters,
            shutdown,
        }
    }

    /// Dispatch jobs until the queue closes, then seal the run
    ///
    /// `expected_tx` receives the number of jobs actually dispatched; the
    /// aggregator stops once it has counted that many completions.
    pub async fn run(
        self,
        mut jobs_rx: mpsc::UnboundedReceiver<DirectoryJob>,
        declared_rx: oneshot::Receiver<usize>,
        completions_tx: mpsc::UnboundedSender<Completion>,
        expected_tx: oneshot::Sender<usize>,
    ) -> Result<DispatchReport, PipelineError> {
        let mut dispatched = 0usize;
        let mut cancelled = 0usize;

        loop {
            let permit = Arc::clone(&self.semaphore)
                .acquire_owned()
                .await
                .map_err(|_| PipelineError::SemaphoreClosed)?;

            let job = match jobs_rx.recv().await {
                Some(job) => job,
                None => break,
            };

            if self.shutdown.load(Ordering::Relaxed) {
                debug!(ordinal = job.ordinal, dir = %job.name, "Withdrawing queued job");
                cancelled += 1;
                continue;
            }

            dispatched += 1;
            self.counters.record_dispatch();
            debug!(ordinal = job.ordinal, dir = %job.name, "Dispatching directory");

            let worker = self.worker.clone();
            let counters = Arc::clone(&self.counters);
            let completions = completions_tx.clone();

            tokio::spawn(async move {
                let ordinal = job.ordinal;
                let name = job.name.clone();
                let in_flight = counters.enter_worker(ordinal);

                let completion = match tokio::task::spawn_blocking(move || worker.run(job)).await {
                    Ok(job) => Completion::Finished(job),
                    Err(e) => {
                        error!(ordinal = ordinal, dir = %name, error = %e, "Directory worker died");
                        Completion::Lost {
                            ordinal,
                            name,
                            message: e.to_string(),
                        }
                    }
                };

                if completions.send(completion).is_err() {
                    warn!(ordinal = ordinal, "Aggregator gone, completion dropped");
                }

                // In-flight count must fall before the permit frees a slot
                drop(in_flight);
                drop(permit);
            });
        }

        let observed = dispatched + cancelled;
        let declared = declared_rx.await.ok();
        let mismatch = match declared {
            Some(declared) if declared != observed => {
                warn!(
                    declared = declared,
                    observed = observed,
                    "Job count mismatch, trusting observed count"
                );
                true
            }
            Some(_) => false,
            None => {
                warn!(observed = observed, "Job builder did not declare a job count");
                false
            }
        };

        info!(
            dispatched = dispatched,
            cancelled = cancelled,
            "All jobs dispatched"
        );

        expected_tx
            .send(dispatched)
            .map_err(|_| PipelineError::AggregatorStopped)?;

        Ok(DispatchReport {
            dispatched,
            cancelled,
            declared,
            mismatch,
        })
    }
}
