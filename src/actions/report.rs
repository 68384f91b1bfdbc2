//! Report action: parse each record and tally its structure

use super::FileOutcome;
use crate::error::RecordError;
use crate::pipeline::DirectoryJob;
use crate::record::{parse_file, Document, ParseError};
use std::path::Path;
use tracing::{debug, warn};

pub(super) fn on_file(job: &mut DirectoryJob, file_name: &str, content: &[u8]) -> FileOutcome {
    match parse_and_tally(job, file_name, content) {
        Ok(_) => FileOutcome::Continue,
        Err(outcome) => outcome,
    }
}

/// Parse a record and add it to the job's counters
///
/// `Err` carries the outcome when the error policy says the file stops here.
pub(super) fn parse_and_tally(
    job: &mut DirectoryJob,
    file_name: &str,
    content: &[u8],
) -> Result<Document, FileOutcome> {
    let (mode, move_limit, policy) = {
        let config = job.config();
        (config.parse_mode, config.move_limit, config.error_policy)
    };
    let path = job.path.join(file_name);

    let (document, errors) = parse_file(file_name, content, mode, move_limit);

    job.stats.files += 1;
    job.stats.moves += document.move_count() as u64;
    job.stats.variations += document.variation_count() as u64;
    if !document.collection.is_empty() {
        *job.stats.board_sizes.entry(document.board_size()).or_insert(0) += 1;
    }
    if document.truncated {
        job.stats.truncated += 1;
        debug!(
            file = %path.display(),
            nodes_kept = document.node_count(),
            move_limit = move_limit,
            "Record truncated at move limit"
        );
    }

    if errors.is_empty() {
        return Ok(document);
    }

    job.stats.errors += errors.len() as u64;
    // One write per file so blocks from concurrent workers do not interleave
    println!("{}", parse_error_block(&path, &errors));
    warn!(file = %path.display(), errors = errors.len(), "Record has parse errors");

    let error = RecordError::Parse {
        file: path.display().to_string(),
        count: errors.len(),
        first: errors[0].to_string(),
    };
    match policy.apply(job, format!("parsing file: {}", path.display()), error.into()) {
        Some(outcome) => Err(outcome),
        None => Ok(document),
    }
}

/// Header line plus one indented line per parse error
fn parse_error_block(path: &Path, errors: &[ParseError]) -> String {
    let mut block = format!("Error(s) during parsing: {}", path.display());
    for error in errors {
        block.push_str(&format!("\n    {}", error));
    }
    block
}
