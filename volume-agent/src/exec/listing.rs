//! Parser for the JSON output of a single-path snapshot listing.
//!
//! The listing starts with one `snapshot` record followed by `node` records.
//! The tool may print informational lines (cache notices, repository
//! banners) before the first record; those are skipped.

use super::lines::split_lines;
use crate::utils::errors::{AgentError, Result};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "struct_type", rename_all = "lowercase")]
pub enum ListingEntry {
    Snapshot(SnapshotEntry),
    Node(NodeEntry),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub id: String,
    #[serde(default)]
    pub short_id: String,
    #[serde(default)]
    pub time: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    pub tree: Option<String>,
    #[serde(default)]
    pub paths: Vec<String>,
    #[serde(default)]
    pub hostname: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub uid: u32,
    #[serde(default)]
    pub gid: u32,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    File,
    Dir,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub path: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub uid: u32,
    #[serde(default)]
    pub gid: u32,
    #[serde(default)]
    pub mode: u32,
    #[serde(default)]
    pub permissions: Option<String>,
    #[serde(default)]
    pub mtime: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    pub atime: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    pub ctime: Option<DateTime<FixedOffset>>,
}

fn is_record(line: &[u8]) -> bool {
    line.trim_ascii_start().starts_with(b"{")
}

fn decode_entry(index: usize, line: &[u8]) -> Result<ListingEntry> {
    serde_json::from_slice(line).map_err(|e| {
        AgentError::MalformedOutput(format!(
            "listing line {}: {e}: {}",
            index + 1,
            String::from_utf8_lossy(line)
        ))
    })
}

/// Decode every record of a listing, skipping the preamble.
///
/// Once the first record has been seen, every non-blank line must be a
/// record and the first one must describe the snapshot.
pub fn parse_entries(output: &[u8]) -> Result<Vec<ListingEntry>> {
    let lines = split_lines(output);
    let Some(start) = lines.iter().position(|line| is_record(line)) else {
        return Ok(Vec::new());
    };

    let mut entries = Vec::new();
    for (index, line) in lines.iter().enumerate().skip(start) {
        if line.trim_ascii().is_empty() {
            continue;
        }
        entries.push(decode_entry(index, line)?);
    }

    match entries.first() {
        Some(ListingEntry::Snapshot(_)) | None => Ok(entries),
        Some(ListingEntry::Node(node)) => Err(AgentError::MalformedOutput(format!(
            "listing starts with node {:?} instead of a snapshot record",
            node.path
        ))),
    }
}

/// Resolve the name of the single file a listing was asked for.
pub fn parse_listing(output: &[u8]) -> Result<String> {
    let entries = parse_entries(output)?;

    let mut files = entries.into_iter().filter_map(|entry| match entry {
        ListingEntry::Node(node) if node.kind == NodeKind::File => Some(node),
        _ => None,
    });

    let Some(file) = files.next() else {
        return Err(AgentError::NotFound(
            "no file node in snapshot listing".to_string(),
        ));
    };

    let extra = files.count();
    if extra > 0 {
        return Err(AgentError::MalformedOutput(format!(
            "expected a single file node in snapshot listing, found {}",
            extra + 1
        )));
    }

    Ok(file.name)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PREAMBLE: &str = "found 8 old cache directories in /root/.cache/backup-exec, run 'cache --cleanup' to remove them";
    const SNAPSHOT: &str = r#"{"time":"2022-10-27T16:52:24.843831+08:00","tree":"a46d6d682f5b5795ff4e2cbb15a1f35bce82de2f147a2fe1f05f64231c65fa75","paths":["/tmp/123123"],"hostname":"node-1","username":"backup","uid":501,"gid":20,"tags":["volume=data"],"id":"7be14766b57eae6c75d3a747a35622756b2a3437f24fd0d355283c2e621a311d","short_id":"7be14766","struct_type":"snapshot"}"#;
    const FILE_NODE: &str = r#"{"name":"Package.swift","type":"file","path":"/123123.swiftpm/Package.swift","uid":501,"gid":20,"size":1074,"mode":420,"permissions":"-rw-r--r--","mtime":"2022-05-16T11:36:02.068797131+08:00","atime":"2022-05-16T11:36:02.068797131+08:00","ctime":"2022-05-16T11:36:02.069074195+08:00","struct_type":"node"}"#;
    const DIR_NODE: &str = r#"{"name":"123123.swiftpm","type":"dir","path":"/123123.swiftpm","uid":501,"gid":20,"mode":2147484141,"permissions":"drwxr-xr-x","mtime":"2022-05-16T11:36:02.068797131+08:00","struct_type":"node"}"#;

    #[test]
    fn test_single_file_with_preamble() {
        let output = format!("{PREAMBLE}\n{SNAPSHOT}\n{FILE_NODE}\n");
        assert_eq!(parse_listing(output.as_bytes()).unwrap(), "Package.swift");
    }

    #[test]
    fn test_only_snapshot_is_not_found() {
        let output = format!("{PREAMBLE}\n{SNAPSHOT}\n");
        assert!(matches!(
            parse_listing(output.as_bytes()),
            Err(AgentError::NotFound(_))
        ));
    }

    #[test]
    fn test_only_preamble_is_not_found() {
        let output = "repository 498109fb opened successfully, password is correct\n\
                      Ignoring \"17be14766\": no matching ID found for prefix \"17be14766\"\n";
        assert!(matches!(
            parse_listing(output.as_bytes()),
            Err(AgentError::NotFound(_))
        ));
    }

    #[test]
    fn test_directory_is_not_found() {
        let output = format!("{SNAPSHOT}\n{DIR_NODE}\n");
        assert!(matches!(
            parse_listing(output.as_bytes()),
            Err(AgentError::NotFound(_))
        ));
    }

    #[test]
    fn test_file_below_directory() {
        let output = format!("{SNAPSHOT}\n{DIR_NODE}\n{FILE_NODE}");
        assert_eq!(parse_listing(output.as_bytes()).unwrap(), "Package.swift");
    }

    #[test]
    fn test_malformed_record() {
        let output = format!("{SNAPSHOT}\n{{\"name\":\"Package.swift\",\"type\":\n");
        assert!(matches!(
            parse_listing(output.as_bytes()),
            Err(AgentError::MalformedOutput(_))
        ));
    }

    #[test]
    fn test_text_after_records_is_malformed() {
        let output = format!("{SNAPSHOT}\n{FILE_NODE}\nunexpected trailer\n");
        assert!(matches!(
            parse_listing(output.as_bytes()),
            Err(AgentError::MalformedOutput(_))
        ));
    }

    #[test]
    fn test_node_before_snapshot_is_malformed() {
        let output = format!("{FILE_NODE}\n{SNAPSHOT}\n");
        assert!(matches!(
            parse_listing(output.as_bytes()),
            Err(AgentError::MalformedOutput(_))
        ));
    }

    #[test]
    fn test_two_files_is_malformed() {
        let output = format!("{SNAPSHOT}\n{FILE_NODE}\n{FILE_NODE}\n");
        assert!(matches!(
            parse_listing(output.as_bytes()),
            Err(AgentError::MalformedOutput(_))
        ));
    }

    #[test]
    fn test_entries_are_typed() {
        let output = format!("{SNAPSHOT}\n{FILE_NODE}\n");
        let entries = parse_entries(output.as_bytes()).unwrap();
        assert_eq!(entries.len(), 2);

        match &entries[0] {
            ListingEntry::Snapshot(snapshot) => {
                assert_eq!(snapshot.short_id, "7be14766");
                assert_eq!(snapshot.paths, vec!["/tmp/123123".to_string()]);
            }
            other => panic!("expected snapshot, got {other:?}"),
        }
        match &entries[1] {
            ListingEntry::Node(node) => {
                assert_eq!(node.kind, NodeKind::File);
                assert_eq!(node.size, 1074);
                assert!(node.mtime.is_some());
            }
            other => panic!("expected node, got {other:?}"),
        }
    }
}
