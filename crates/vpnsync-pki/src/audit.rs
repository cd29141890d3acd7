//! Append-only audit log of certificate lifecycle events.
//!
//! Format: `2026-02-11T10:30:00Z | cert_issued | name=alice`

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;

/// Audit sink; disabled when no path is configured.
#[derive(Debug, Clone, Default)]
pub struct AuditLog {
    path: Option<PathBuf>,
}

impl AuditLog {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Record an event. Failures are logged and never propagate.
    pub fn record(&self, event: &str, fields: &[(&str, &str)]) {
        let Some(path) = &self.path else {
            return;
        };
        if let Err(e) = append_entry_to(path, event, fields) {
            tracing::warn!(error = %e, event, path = %path.display(), "Failed to write audit entry");
        }
    }
}

/// Append an audit entry to `path`.
pub fn append_entry_to(
    path: &Path,
    event: &str,
    fields: &[(&str, &str)],
) -> Result<(), std::io::Error> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let timestamp = Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
    let mut line = format!("{timestamp} | {event}");
    for (key, value) in fields {
        line.push_str(&format!(" | {key}={value}"));
    }
    line.push('\n');

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    file.write_all(line.as_bytes())?;

    tracing::debug!(event, "Audit log entry written");
    Ok(())
}
