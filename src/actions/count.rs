//! Count action: files and separator markers, no parsing

use super::FileOutcome;
use crate::config::RECORD_SEPARATOR;
use crate::pipeline::DirectoryJob;

pub(super) fn on_file(job: &mut DirectoryJob, content: &[u8]) -> FileOutcome {
    job.stats.files += 1;
    job.stats.moves += count_moves(content);
    FileOutcome::Continue
}

/// Number of record-separator markers in a file
pub fn count_moves(content: &[u8]) -> u64 {
    content.iter().filter(|&&b| b == RECORD_SEPARATOR).count() as u64
}
