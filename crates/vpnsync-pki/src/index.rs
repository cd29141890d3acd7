//! easy-rsa `index.txt` parsing and change detection.
//!
//! Each line of the index is
//! `state expiry revocation-date serial filename distinguished-name`, with
//! empty columns collapsing when split on whitespace. A line matters only
//! when it splits into exactly five fields; everything else is ignored.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::error::PkiError;

/// Names reserved for the authority and server certificates.
pub const RESERVED_NAMES: [&str; 2] = ["server", "client"];

/// `server` and `client` belong to the authority and server, never to a user.
pub fn is_reserved_name(name: &str) -> bool {
    RESERVED_NAMES.contains(&name)
}

const CN_PREFIX: &str = "/CN=";

/// Certificate state marker from column 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertState {
    Valid,
    Revoked,
    Other,
}

impl CertState {
    fn from_marker(marker: &str) -> Self {
        match marker {
            "V" => Self::Valid,
            "R" => Self::Revoked,
            _ => Self::Other,
        }
    }
}

/// One parsed index entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateRecord {
    pub state: CertState,
    pub issued_until: String,
    pub serial_or_hash: String,
    pub name: String,
}

impl CertificateRecord {
    /// A record counts toward the live set only when valid and not reserved.
    pub fn is_live(&self) -> bool {
        self.state == CertState::Valid && !is_reserved_name(&self.name)
    }
}

/// Parse any five-field index line, whatever its state.
pub fn parse_record(line: &str) -> Option<CertificateRecord> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    let [state, issued_until, serial_or_hash, _, dn] = fields[..] else {
        return None;
    };

    let name = dn.strip_prefix(CN_PREFIX).unwrap_or(dn);

    Some(CertificateRecord {
        state: CertState::from_marker(state),
        issued_until: issued_until.to_string(),
        serial_or_hash: serial_or_hash.to_string(),
        name: name.to_string(),
    })
}

/// Parse a line into a live client certificate record.
///
/// Returns `None` for malformed lines, non-valid states, and the reserved
/// `server`/`client` identities.
pub fn parse_line(line: &str) -> Option<CertificateRecord> {
    parse_record(line).filter(CertificateRecord::is_live)
}

/// The live records found in one read of the index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexSnapshot {
    records: Vec<CertificateRecord>,
}

impl IndexSnapshot {
    pub fn parse(content: &str) -> Self {
        let records = content.lines().filter_map(parse_line).collect();
        Self { records }
    }

    pub fn records(&self) -> &[CertificateRecord] {
        &self.records
    }

    /// Set of live certificate names.
    pub fn names(&self) -> BTreeSet<String> {
        self.records.iter().map(|r| r.name.clone()).collect()
    }

    /// Names that appear in more than one live record.
    ///
    /// The index is an append-style log and the snapshot is taken literally,
    /// so a name issued twice shows up twice. These are reported, not merged.
    pub fn duplicate_names(&self) -> Vec<&str> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for record in &self.records {
            *counts.entry(record.name.as_str()).or_default() += 1;
        }
        counts
            .into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|(name, _)| name)
            .collect()
    }
}

/// Re-reads the index only when its modification time changes.
#[derive(Debug)]
pub struct IndexWatcher {
    path: PathBuf,
    last_modified: Option<SystemTime>,
    snapshot: IndexSnapshot,
}

impl IndexWatcher {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last_modified: None,
            snapshot: IndexSnapshot::default(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Return the current snapshot, re-parsing only if the file changed.
    ///
    /// The saved modification time is only updated after a successful read,
    /// so a failed read is retried on the next call.
    pub fn refresh(&mut self) -> Result<&IndexSnapshot, PkiError> {
        let modified = std::fs::metadata(&self.path)
            .and_then(|m| m.modified())
            .map_err(|source| PkiError::Index {
                path: self.path.clone(),
                source,
            })?;

        if self.last_modified == Some(modified) {
            tracing::debug!(path = %self.path.display(), "No change detected in index file");
            return Ok(&self.snapshot);
        }

        let content = std::fs::read_to_string(&self.path).map_err(|source| PkiError::Index {
            path: self.path.clone(),
            source,
        })?;
        let snapshot = IndexSnapshot::parse(&content);

        for name in snapshot.duplicate_names() {
            tracing::warn!(
                name,
                "Certificate name appears in several valid index entries"
            );
        }
        tracing::debug!(
            path = %self.path.display(),
            valid = snapshot.records.len(),
            "Index file parsed"
        );

        self.snapshot = snapshot;
        self.last_modified = Some(modified);
        Ok(&self.snapshot)
    }

    /// Forget the saved modification time so the next refresh re-parses.
    pub fn invalidate(&mut self) {
        self.last_modified = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_TEST: &str =
        "V       330729111815Z                   612D9DE2717A9D139908E09C243F9ADA        unknown /CN=test";

    #[test]
    fn valid_line_yields_record() {
        let record = parse_line(VALID_TEST).unwrap();
        assert_eq!(
            record,
            CertificateRecord {
                state: CertState::Valid,
                issued_until: "330729111815Z".to_string(),
                serial_or_hash: "612D9DE2717A9D139908E09C243F9ADA".to_string(),
                name: "test".to_string(),
            }
        );
    }

    #[test]
    fn server_and_client_are_never_live() {
        let server = VALID_TEST.replace("/CN=test", "/CN=server");
        let client = VALID_TEST.replace("/CN=test", "/CN=client");
        assert!(parse_line(&server).is_none());
        assert!(parse_line(&client).is_none());
    }

    #[test]
    fn revoked_line_is_not_live() {
        // Revoked entries carry a revocation date, so they split into six fields.
        let line = "R       290429132915Z   200525133920Z   0C                                      unknown /CN=test";
        assert!(parse_line(line).is_none());

        // A five-field line with a non-V marker is parsed but not live.
        let line = "R 290429132915Z 0C unknown /CN=test";
        let record = parse_record(line).unwrap();
        assert_eq!(record.state, CertState::Revoked);
        assert!(parse_line(line).is_none());

        let line = "E 290429132915Z 0C unknown /CN=test";
        assert_eq!(parse_record(line).unwrap().state, CertState::Other);
        assert!(parse_line(line).is_none());
    }

    #[test]
    fn wrong_field_count_is_dropped() {
        assert!(parse_line("").is_none());
        assert!(parse_line("V 330729111815Z 612D unknown").is_none());
        assert!(parse_line("V 330729111815Z 612D unknown /CN=test extra").is_none());
    }

    #[test]
    fn dn_without_cn_prefix_is_kept_verbatim() {
        let record = parse_line("V 330729111815Z 01 unknown /O=corp").unwrap();
        assert_eq!(record.name, "/O=corp");
    }

    #[test]
    fn snapshot_collects_live_names_and_flags_duplicates() {
        let content = "\
V 330729111815Z 01 unknown /CN=server
V 330729111815Z 02 unknown /CN=alice
V 330729111815Z 03 unknown /CN=bob
R 290429132915Z 200525133920Z 04 unknown /CN=carol
V 330729111815Z 05 unknown /CN=alice
garbage
";
        let snapshot = IndexSnapshot::parse(content);
        assert_eq!(snapshot.records().len(), 3);
        let names: Vec<String> = snapshot.names().into_iter().collect();
        assert_eq!(names, vec!["alice".to_string(), "bob".to_string()]);
        assert_eq!(snapshot.duplicate_names(), vec!["alice"]);
    }

    #[test]
    fn watcher_skips_reparse_until_modified() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.txt");
        std::fs::write(&path, "V 330729111815Z 01 unknown /CN=alice\n").unwrap();

        let mut watcher = IndexWatcher::new(&path);
        assert_eq!(watcher.refresh().unwrap().names().len(), 1);

        // Same mtime: rewrite the content but restore the old timestamp.
        let mtime = std::fs::metadata(&path).unwrap().modified().unwrap();
        std::fs::write(
            &path,
            "V 330729111815Z 01 unknown /CN=alice\nV 330729111815Z 02 unknown /CN=bob\n",
        )
        .unwrap();
        let file = std::fs::File::options().write(true).open(&path).unwrap();
        file.set_modified(mtime).unwrap();
        drop(file);
        assert_eq!(watcher.refresh().unwrap().names().len(), 1);

        watcher.invalidate();
        assert_eq!(watcher.refresh().unwrap().names().len(), 2);
    }

    #[test]
    fn watcher_reports_missing_index() {
        let dir = tempfile::tempdir().unwrap();
        let mut watcher = IndexWatcher::new(dir.path().join("missing.txt"));
        assert!(matches!(watcher.refresh(), Err(PkiError::Index { .. })));
    }
}
