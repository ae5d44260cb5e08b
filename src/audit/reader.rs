//! Decision log reader: filter, summarize and pretty-print for the
//! `approvalgate log` command.

use crate::audit::types::*;
use anyhow::{Context, Result};
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};

pub struct AuditReader {
    log_dir: PathBuf,
}

impl AuditReader {
    /// Create a reader using the default log directory.
    pub fn new() -> Result<Self> {
        let log_dir = crate::audit::logger::AuditLogger::log_directory()?;
        Ok(Self { log_dir })
    }

    /// Create a reader for a specific directory.
    pub fn with_dir(dir: impl AsRef<Path>) -> Self {
        Self {
            log_dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn read_execution(&self, execution_id: &str) -> Result<Vec<LogEntry>> {
        let path = self.log_dir.join(format!("{}.jsonl", execution_id));
        Self::read_file(&path)
    }

    /// Read every entry from one log file.
    pub fn read_file(path: &Path) -> Result<Vec<LogEntry>> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read log file: {}", path.display()))?;

        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .enumerate()
            .map(|(i, line)| {
                serde_json::from_str(line)
                    .with_context(|| format!("Failed to parse log entry at line {}", i + 1))
            })
            .collect()
    }

    /// Read entries from the most recently written log.
    pub fn read_latest(&self) -> Result<Vec<LogEntry>> {
        match self.find_latest()? {
            Some(path) => Self::read_file(&path),
            None => Ok(Vec::new()),
        }
    }

    fn find_latest(&self) -> Result<Option<PathBuf>> {
        if !self.log_dir.exists() {
            return Ok(None);
        }

        let mut entries: Vec<PathBuf> = fs::read_dir(&self.log_dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|e| e == "jsonl"))
            .collect();

        // Most recent first
        entries.sort_by(|a, b| {
            let a_time = fs::metadata(a).and_then(|m| m.modified()).ok();
            let b_time = fs::metadata(b).and_then(|m| m.modified()).ok();
            b_time.cmp(&a_time)
        });

        Ok(entries.into_iter().next())
    }

    /// List the execution ids that have a log.
    pub fn list_executions(&self) -> Result<Vec<String>> {
        if !self.log_dir.exists() {
            return Ok(Vec::new());
        }

        let mut executions: Vec<String> = fs::read_dir(&self.log_dir)?
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "jsonl"))
            .filter_map(|e| {
                e.path()
                    .file_stem()
                    .map(|s| s.to_string_lossy().to_string())
            })
            .collect();

        executions.sort();
        Ok(executions)
    }

    pub fn filter_entries(entries: &[LogEntry], filter: &LogFilter) -> Vec<LogEntry> {
        entries
            .iter()
            .filter(|e| filter.outcome.map_or(true, |outcome| e.outcome == outcome))
            .take(filter.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }

    pub fn summarize(entries: &[LogEntry]) -> ExecutionSummary {
        let mut summary = ExecutionSummary::default();

        if let Some(first) = entries.first() {
            summary.execution_id = first.execution_id.clone();
            summary.start_time = Some(first.timestamp);
        }
        if let Some(last) = entries.last() {
            summary.end_time = Some(last.timestamp);
        }

        summary.total_items = entries.len();
        for entry in entries {
            summary.total_polls += u64::from(entry.attempts);
            match entry.outcome {
                AuditOutcome::Approved => summary.approved += 1,
                AuditOutcome::Declined => summary.declined += 1,
                AuditOutcome::ChangeRequested => summary.change_requested += 1,
                AuditOutcome::Suspended => summary.suspended += 1,
                AuditOutcome::Failed => summary.failed += 1,
                AuditOutcome::Resumed => {}
            }
        }

        summary
    }

    /// Pretty-print an entry for terminal display.
    pub fn format_entry(entry: &LogEntry) -> String {
        let timestamp = entry.timestamp.format("%H:%M:%S").to_string();
        let outcome = match entry.outcome {
            AuditOutcome::Approved => "APPROVED".green().to_string(),
            AuditOutcome::Declined => "DECLINED".red().to_string(),
            AuditOutcome::ChangeRequested => "CHANGE".yellow().to_string(),
            AuditOutcome::Suspended => "SUSPENDED".cyan().to_string(),
            AuditOutcome::Resumed => "RESUMED".cyan().to_string(),
            AuditOutcome::Failed => "FAILED".red().bold().to_string(),
        };

        let mut line = format!(
            "[{}] {} {} item {}",
            timestamp.dimmed(),
            outcome,
            entry.gate.to_string().bold(),
            entry.item_index
        );

        if let Some(ref id) = entry.request_id {
            line.push_str(&format!(" ({})", id.dimmed()));
        }
        if let Some(ref error) = entry.error {
            line.push_str(&format!(": {}", error));
        }

        line
    }
}
