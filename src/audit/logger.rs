//! Decision log writer: append-only JSONL.
//!
//! Writes to `~/.approvalgate/logs/{execution_id}.jsonl` by default, one JSON
//! object per line, flushed after every write.

use crate::audit::types::LogEntry;
use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Append-only decision logger.
pub struct AuditLogger {
    log_path: PathBuf,
    file: File,
    entry_count: usize,
}

impl AuditLogger {
    /// Create a logger for an execution in the default log directory.
    pub fn new(execution_id: &str) -> Result<Self> {
        let log_dir = Self::log_directory()?;
        Self::with_path(log_dir.join(format!("{}.jsonl", execution_id)))
    }

    /// Create a logger writing to a specific path.
    pub fn with_path(path: impl AsRef<Path>) -> Result<Self> {
        let log_path = path.as_ref().to_path_buf();
        if let Some(parent) = log_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create log directory: {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .with_context(|| format!("Failed to open log file: {}", log_path.display()))?;

        Ok(Self {
            log_path,
            file,
            entry_count: 0,
        })
    }

    pub fn log(&mut self, entry: &LogEntry) -> Result<()> {
        let json = serde_json::to_string(entry).context("Failed to serialize log entry")?;
        writeln!(self.file, "{}", json).context("Failed to write log entry")?;
        self.file.flush().context("Failed to flush log file")?;
        self.entry_count += 1;
        Ok(())
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Entries written by this logger instance.
    pub fn entry_count(&self) -> usize {
        self.entry_count
    }

    /// Default log directory (~/.approvalgate/logs/).
    pub fn log_directory() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not determine home directory")?;
        Ok(home.join(".approvalgate").join("logs"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::types::AuditOutcome;
    use crate::config::GateVariant;
    use chrono::Utc;
    use tempfile::TempDir;

    fn entry(index: usize, outcome: AuditOutcome) -> LogEntry {
        LogEntry {
            timestamp: Utc::now(),
            gate: GateVariant::RouteV1,
            workflow_id: "wf".to_string(),
            execution_id: "exec-1".to_string(),
            node_id: "node".to_string(),
            item_index: index,
            request_id: Some(format!("rt-{}", index)),
            outcome,
            attempts: 2,
            error: None,
        }
    }

    #[test]
    fn test_write_and_read_back() {
        let tmp = TempDir::new().unwrap();
        let log_path = tmp.path().join("nested").join("exec.jsonl");
        let mut logger = AuditLogger::with_path(&log_path).unwrap();

        logger.log(&entry(0, AuditOutcome::Approved)).unwrap();
        assert_eq!(logger.entry_count(), 1);

        let content = fs::read_to_string(&log_path).unwrap();
        let parsed: LogEntry = serde_json::from_str(content.trim()).unwrap();
        assert_eq!(parsed.request_id.as_deref(), Some("rt-0"));
        assert_eq!(parsed.outcome, AuditOutcome::Approved);
    }

    #[test]
    fn test_append_only_across_loggers() {
        let tmp = TempDir::new().unwrap();
        let log_path = tmp.path().join("exec.jsonl");

        let mut first = AuditLogger::with_path(&log_path).unwrap();
        first.log(&entry(0, AuditOutcome::Suspended)).unwrap();
        drop(first);

        // A resumed execution reopens the same file
        let mut second = AuditLogger::with_path(&log_path).unwrap();
        second.log(&entry(0, AuditOutcome::Resumed)).unwrap();
        second.log(&entry(1, AuditOutcome::Declined)).unwrap();
        assert_eq!(second.entry_count(), 2);

        let content = fs::read_to_string(&log_path).unwrap();
        assert_eq!(content.trim().lines().count(), 3);
    }
}
