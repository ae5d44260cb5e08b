//! Types for the gate decision log.
//!
//! One entry per item that went through the gate, whatever happened to it.
//! Operators match `request_id` against the approval service's own records.

use crate::config::GateVariant;
use crate::decision::Decision;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What happened to one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Approved,
    Declined,
    ChangeRequested,
    /// Waiting for a callback when the execution was parked
    Suspended,
    /// Passed through on resume
    Resumed,
    /// Unrecognized state, timeout, transport or response error
    Failed,
}

impl AuditOutcome {
    pub fn from_decision(decision: &Decision) -> Self {
        match decision {
            Decision::Approved => AuditOutcome::Approved,
            Decision::Declined => AuditOutcome::Declined,
            Decision::ChangeRequested => AuditOutcome::ChangeRequested,
            Decision::Error(_) => AuditOutcome::Failed,
        }
    }

    pub fn from_str_loose(s: &str) -> Option<AuditOutcome> {
        match s.to_lowercase().trim() {
            "approved" | "approve" => Some(AuditOutcome::Approved),
            "declined" | "denied" | "rejected" => Some(AuditOutcome::Declined),
            "change_requested" | "changerequested" | "change" => {
                Some(AuditOutcome::ChangeRequested)
            }
            "suspended" | "pending" => Some(AuditOutcome::Suspended),
            "resumed" => Some(AuditOutcome::Resumed),
            "failed" | "error" => Some(AuditOutcome::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for AuditOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditOutcome::Approved => write!(f, "approved"),
            AuditOutcome::Declined => write!(f, "declined"),
            AuditOutcome::ChangeRequested => write!(f, "change_requested"),
            AuditOutcome::Suspended => write!(f, "suspended"),
            AuditOutcome::Resumed => write!(f, "resumed"),
            AuditOutcome::Failed => write!(f, "failed"),
        }
    }
}

/// A single entry in the decision log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,

    pub gate: GateVariant,

    pub workflow_id: String,

    /// Host execution this item belonged to
    pub execution_id: String,

    pub node_id: String,

    pub item_index: usize,

    /// Service-assigned id, once one exists
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,

    pub outcome: AuditOutcome,

    /// Status fetches performed while waiting
    #[serde(default)]
    pub attempts: u32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Summary statistics for one execution's log.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionSummary {
    pub execution_id: String,
    pub total_items: usize,
    pub approved: usize,
    pub declined: usize,
    pub change_requested: usize,
    pub suspended: usize,
    pub failed: usize,
    pub total_polls: u64,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

impl ExecutionSummary {
    /// Format as a human-readable one-liner for terminal output.
    pub fn one_line(&self) -> String {
        format!(
            "{} items | {} approved | {} declined | {} change requested | {} suspended | {} failed | {} polls",
            self.total_items,
            self.approved,
            self.declined,
            self.change_requested,
            self.suspended,
            self.failed,
            self.total_polls
        )
    }
}

/// Filter criteria for querying the log.
#[derive(Debug, Clone, Default)]
pub struct LogFilter {
    pub outcome: Option<AuditOutcome>,
    pub limit: Option<usize>,
}
