//! Directory worker
//!
//! Each worker:
//! - Lists its sub-directory through the storage capability
//! - Reads every matching record file, in listing order
//! - Hands non-empty content to the per-file hook of the action set
//! - Runs the per-directory hook once, whatever way the directory ended
//!
//! A worker runs on a blocking thread; files within one directory are
//! processed strictly one after the other.

use super::job::DirectoryJob;
use crate::actions::FileOutcome;
use crate::config::RECORD_SUFFIX;
use crate::storage::Storage;
use std::sync::Arc;
use tracing::{debug, error, trace, warn};

/// Processes one directory job at a time
#[derive(Clone)]
pub struct DirectoryWorker {
    storage: Arc<dyn Storage>,
}

impl DirectoryWorker {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Process a job and return it as the completion record
    pub fn run(&self, mut job: DirectoryJob) -> DirectoryJob {
        self.process_files(&mut job);
        let action = job.config().action;
        action.on_directory_end(&job);
        job
    }

    fn process_files(&self, job: &mut DirectoryJob) {
        let entries = match self.storage.list_entries(&job.path) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(
                    ordinal = job.ordinal,
                    path = %job.path.display(),
                    error = %e,
                    "Failed to read directory"
                );
                let action = format!("reading directory: {}", job.path.display());
                job.fail(action, e);
                return;
            }
        };

        let (action, mut skip) = {
            let config = job.config();
            (config.action, config.skip_files)
        };

        let records = entries
            .iter()
            .filter(|entry| !entry.is_dir && entry.name.contains(RECORD_SUFFIX));

        for entry in records {
            if skip > 0 {
                skip -= 1;
                trace!(ordinal = job.ordinal, file = %entry.name, "Skipping record");
                continue;
            }

            let file_path = job.path.join(&entry.name);
            let content = match self.storage.read_file(&file_path) {
                Ok(content) => content,
                Err(e) => {
                    if e.is_recoverable() {
                        warn!(
                            ordinal = job.ordinal,
                            file = %file_path.display(),
                            error = %e,
                            "Failed to read record"
                        );
                    } else {
                        error!(
                            ordinal = job.ordinal,
                            file = %file_path.display(),
                            error = %e,
                            "Record read failed"
                        );
                    }
                    let action = format!("reading file: {}", file_path.display());
                    job.fail(action, e);
                    return;
                }
            };

            job.stats.bytes_read += content.len() as u64;
            if content.is_empty() {
                continue;
            }

            if action.on_file(job, self.storage.as_ref(), &entry.name, &content)
                == FileOutcome::StopDirectory
            {
                debug!(ordinal = job.ordinal, file = %entry.name, "Directory stopped by action");
                break;
            }

            if job.file_limit_reached() {
                debug!(ordinal = job.ordinal, files = job.stats.files, "File limit reached");
                break;
            }
        }
    }
}
