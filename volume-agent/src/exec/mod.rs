//! Interpretation of backup-exec subprocess output.
//!
//! The command manager that runs the backup tool hands over the captured
//! stdout/stderr bytes; nothing in here spawns processes. All functions are
//! pure and safe to call concurrently on independent outputs.

pub mod lines;
pub mod listing;
pub mod summary;

pub use lines::{last_line, last_line_lossy, split_lines};
pub use listing::{parse_entries, parse_listing, ListingEntry, NodeEntry, NodeKind, SnapshotEntry};
pub use summary::{extract_summary, latest_status, StatusRecord, SummaryRecord};

use crate::utils::errors::{AgentError, Result};
use tracing::warn;

/// Result of a finished backup run.
#[derive(Debug, Clone)]
pub struct BackupOutcome {
    pub summary: SummaryRecord,
    /// The summary line exactly as the tool printed it.
    pub raw_summary: String,
}

/// Interpret the captured output of a backup run.
///
/// Fails with [`AgentError::BackupIncomplete`] when no single summary can be
/// found; the last line of stderr (or stdout when stderr is empty) is attached
/// for diagnostics. That line never implies success.
pub fn interpret_backup(stdout: &[u8], stderr: &[u8]) -> Result<BackupOutcome> {
    let line = match extract_summary(stdout) {
        Ok(line) => line,
        Err(cause) => {
            let diagnostic = if last_line(stderr).is_empty() {
                last_line_lossy(stdout)
            } else {
                last_line_lossy(stderr)
            };
            warn!(error = %cause, last_line = %diagnostic, "backup-exec output has no usable summary");
            return Err(AgentError::BackupIncomplete {
                cause: Box::new(cause),
                last_line: diagnostic,
            });
        }
    };

    Ok(BackupOutcome {
        summary: SummaryRecord::decode(line)?,
        raw_summary: String::from_utf8_lossy(line).into_owned(),
    })
}
