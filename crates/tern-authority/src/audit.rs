//! Append-only audit trail for authority changes.
//!
//! One line per event: `2026-02-11T10:30:00Z | authority_created | name=root | creator=alice`.

use std::io::Write;
use std::path::Path;

use chrono::Utc;

/// Append an entry with the given event name and key=value fields.
pub fn append_entry(path: &Path, event: &str, fields: &[(&str, &str)]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut line = format!("{} | {event}", Utc::now().format("%Y-%m-%dT%H:%M:%SZ"));
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

/// Record an event if auditing is configured. Write failures are logged,
/// never surfaced: the change being audited has already committed.
///
/// The append runs on the calling thread, including async callers.
pub(crate) fn record(path: Option<&Path>, event: &str, fields: &[(&str, &str)]) {
    let Some(path) = path else { return };
    if let Err(e) = append_entry(path, event, fields) {
        tracing::warn!(error = %e, event, path = %path.display(), "Audit write failed");
    }
}

/// Full audit log contents; empty when the file does not exist yet.
pub fn read_log(path: &Path) -> std::io::Result<String> {
    match std::fs::read_to_string(path) {
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
        other => other,
    }
}
