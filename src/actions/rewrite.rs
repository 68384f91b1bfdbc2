//! Rewrite action: parse each record and write it under the output root

use super::{report, FileOutcome};
use crate::error::RecordError;
use crate::pipeline::DirectoryJob;
use crate::record::write_document;
use crate::storage::Storage;
use tracing::{trace, warn};

pub(super) fn on_file(
    job: &mut DirectoryJob,
    storage: &dyn Storage,
    file_name: &str,
    content: &[u8],
) -> FileOutcome {
    let document = match report::parse_and_tally(job, file_name, content) {
        Ok(document) => document,
        Err(outcome) => return outcome,
    };

    let (output_root, line_width, policy) = {
        let config = job.config();
        (config.output_root.clone(), config.line_width, config.error_policy)
    };
    let Some(output_root) = output_root else {
        return FileOutcome::Continue;
    };

    let out_dir = output_root.join(&job.name);
    let out_path = out_dir.join(file_name);
    let bytes = write_document(&document, line_width);

    let written = storage
        .create_dir_all(&out_dir)
        .and_then(|()| storage.write_file(&out_path, &bytes));

    match written {
        Ok(()) => {
            job.stats.written += 1;
            trace!(file = %out_path.display(), bytes = bytes.len(), "Record rewritten");
            FileOutcome::Continue
        }
        Err(e) => {
            job.stats.errors += 1;
            // The failing path is the output directory when it could not be created
            println!("Error writing: {}, {}", e.path().display(), e);
            warn!(
                file = %out_path.display(),
                failed_path = %e.path().display(),
                error = %e,
                "Failed to write record"
            );
            let error = RecordError::Write {
                file: out_path.display().to_string(),
                source: e,
            };
            policy
                .apply(job, format!("writing file: {}", out_path.display()), error.into())
                .unwrap_or(FileOutcome::Continue)
        }
    }
}
