//! `approvalgate log`: browse the decision log.
//!
//! Shows what the gate did in an execution: which items were approved,
//! declined, parked for review or failed, and how many polls each took.

use crate::audit::{AuditOutcome, AuditReader, LogFilter};
use anyhow::{bail, Context, Result};
use colored::Colorize;
use std::path::Path;

#[derive(Debug, Default)]
pub struct LogOptions<'a> {
    pub execution_id: Option<&'a str>,
    /// Read this file instead of the default log directory
    pub path: Option<&'a Path>,
    pub outcome: Option<&'a str>,
    pub limit: Option<usize>,
    pub summary_only: bool,
}

pub fn run_log(options: LogOptions<'_>) -> Result<()> {
    let entries = match (options.path, options.execution_id) {
        (Some(path), _) => AuditReader::read_file(path)?,
        (None, Some(id)) => AuditReader::new()
            .context("Failed to initialize log reader")?
            .read_execution(id)
            .with_context(|| format!("Failed to read execution: {}", id))?,
        (None, None) => AuditReader::new()
            .context("Failed to initialize log reader")?
            .read_latest()?,
    };

    if entries.is_empty() {
        println!();
        println!("  {} No decision logs found.", "ℹ".blue());
        println!("  Run a gate first:");
        println!(
            "    {}",
            "approvalgate run --config gate.yaml --input items.json".dimmed()
        );
        println!();
        return Ok(());
    }

    let outcome = match options.outcome {
        Some(raw) => match AuditOutcome::from_str_loose(raw) {
            Some(outcome) => Some(outcome),
            None => bail!(
                "Unknown outcome '{}'. Valid: approved, declined, change_requested, suspended, resumed, failed",
                raw
            ),
        },
        None => None,
    };

    let summary = AuditReader::summarize(&entries);

    if options.summary_only {
        println!();
        println!("  Execution: {}", summary.execution_id.cyan());
        println!();
        println!(
            "  {} items | {} approved | {} declined | {} change requested | {} failed | {} polls",
            summary.total_items.to_string().bold(),
            summary.approved.to_string().green().bold(),
            summary.declined.to_string().red().bold(),
            summary.change_requested.to_string().yellow().bold(),
            summary.failed.to_string().red(),
            summary.total_polls,
        );
        if let (Some(start), Some(end)) = (summary.start_time, summary.end_time) {
            println!("  Duration: {}", format_duration((end - start).num_seconds()));
        }
        println!();
        return Ok(());
    }

    let filter = LogFilter {
        outcome,
        limit: options.limit,
    };
    let filtered = AuditReader::filter_entries(&entries, &filter);

    println!();
    println!("  Execution: {}", summary.execution_id.cyan());
    println!();
    for entry in &filtered {
        println!("  {}", AuditReader::format_entry(entry));
    }
    println!();
    println!(
        "  {} {}",
        "─".repeat(40).dimmed(),
        summary.one_line().dimmed()
    );
    println!();

    Ok(())
}

/// List executions that have a decision log.
pub fn run_log_list() -> Result<()> {
    let reader = AuditReader::new()?;
    let executions = reader.list_executions()?;

    if executions.is_empty() {
        println!();
        println!("  {} No executions found.", "ℹ".blue());
        println!();
        return Ok(());
    }

    println!();
    println!("  Logged executions:");
    println!();
    for execution in &executions {
        println!("  • {}", execution);
    }
    println!();
    println!(
        "  View one: {}",
        "approvalgate log --execution <id>".dimmed()
    );
    println!();

    Ok(())
}

fn format_duration(seconds: i64) -> String {
    if seconds < 60 {
        format!("{}s", seconds)
    } else if seconds < 3600 {
        format!("{}m {}s", seconds / 60, seconds % 60)
    } else {
        format!("{}h {}m", seconds / 3600, (seconds % 3600) / 60)
    }
}
