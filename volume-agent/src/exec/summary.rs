//! Completion and progress records from the backup-exec JSON stream.
//!
//! Each stdout line of a backup run is an independent JSON object tagged by
//! `message_type`: `status` while the run progresses and a single `summary`
//! once it is done. The tool may keep printing `status` lines after the
//! summary while it tears down, so the summary is not required to be last.

use super::lines::{last_line, split_lines};
use crate::utils::errors::{AgentError, Result};
use serde::{Deserialize, Serialize};

/// Substring every summary line must contain. Lines without it are never
/// decoded.
const SUMMARY_PROBE: &[u8] = b"\"summary\"";

const SUMMARY: &str = "summary";
const STATUS: &str = "status";

#[derive(Deserialize)]
struct Discriminator {
    #[serde(default)]
    message_type: Option<String>,
}

/// Terminal record of a backup run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRecord {
    pub message_type: String,
    #[serde(default)]
    pub files_new: u64,
    #[serde(default)]
    pub files_changed: u64,
    #[serde(default)]
    pub files_unmodified: u64,
    #[serde(default)]
    pub dirs_new: u64,
    #[serde(default)]
    pub dirs_changed: u64,
    #[serde(default)]
    pub dirs_unmodified: u64,
    #[serde(default)]
    pub data_blobs: u64,
    #[serde(default)]
    pub tree_blobs: u64,
    #[serde(default)]
    pub data_added: u64,
    #[serde(default)]
    pub total_files_processed: u64,
    #[serde(default)]
    pub total_bytes_processed: u64,
    /// Seconds
    #[serde(default)]
    pub total_duration: f64,
    #[serde(default)]
    pub snapshot_id: String,
}

impl SummaryRecord {
    /// Decode a summary line returned by [`extract_summary`].
    pub fn decode(line: &[u8]) -> Result<Self> {
        let record: SummaryRecord = serde_json::from_slice(line)
            .map_err(|e| AgentError::MalformedOutput(format!("summary line: {e}")))?;

        if record.message_type != SUMMARY {
            return Err(AgentError::MalformedOutput(format!(
                "expected message_type {SUMMARY:?}, got {:?}",
                record.message_type
            )));
        }

        Ok(record)
    }
}

/// Progress record emitted while a backup is running.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub message_type: String,
    #[serde(default)]
    pub percent_done: f64,
    #[serde(default)]
    pub total_files: u64,
    #[serde(default)]
    pub files_done: u64,
    #[serde(default)]
    pub total_bytes: u64,
    #[serde(default)]
    pub bytes_done: u64,
}

impl StatusRecord {
    /// `(bytes_done, total_bytes)`
    pub fn progress(&self) -> (u64, u64) {
        (self.bytes_done, self.total_bytes)
    }
}

/// Whether `line` is a complete summary record.
pub fn is_summary(line: &[u8]) -> bool {
    if !line.windows(SUMMARY_PROBE.len()).any(|w| w == SUMMARY_PROBE) {
        return false;
    }

    // Truncated or otherwise undecodable lines are not summaries.
    matches!(
        serde_json::from_slice::<Discriminator>(line),
        Ok(Discriminator { message_type: Some(t) }) if t == SUMMARY
    )
}

/// Find the single summary line in a backup run's stdout.
///
/// The line is returned byte-for-byte. No summary means the run has not
/// finished (or printed something unexpected); more than one means the
/// output is corrupted and none of them can be trusted.
pub fn extract_summary(output: &[u8]) -> Result<&[u8]> {
    let mut summaries = split_lines(output).into_iter().filter(|line| is_summary(line));
    let first = summaries.next();
    let rest = summaries.count();

    match (first, rest) {
        (None, _) => Err(AgentError::NoSummaryFound),
        (Some(line), 0) => Ok(line),
        (Some(_), rest) => Err(AgentError::MultipleSummariesFound { count: rest + 1 }),
    }
}

/// Decode the most recent progress record, if the last line is one.
pub fn latest_status(output: &[u8]) -> Option<StatusRecord> {
    let line = last_line(output);
    if line.is_empty() {
        return None;
    }

    match serde_json::from_slice::<StatusRecord>(line) {
        Ok(status) if status.message_type == STATUS => Some(status),
        Ok(_) => None,
        Err(e) => {
            tracing::debug!(error = %e, "last backup-exec line is not a status record");
            None
        }
    }
}
