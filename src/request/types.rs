//! Types for the approval request lifecycle.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Where in the workflow the data being reviewed is flowing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Incoming request/data
    #[default]
    Inlet,
    /// Outgoing response
    Response,
    /// Internal signal/event
    Signal,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Inlet => write!(f, "inlet"),
            Direction::Response => write!(f, "response"),
            Direction::Signal => write!(f, "signal"),
        }
    }
}

impl Direction {
    pub fn from_str_loose(s: &str) -> Option<Direction> {
        match s.to_lowercase().trim() {
            "inlet" => Some(Direction::Inlet),
            "response" => Some(Direction::Response),
            "signal" => Some(Direction::Signal),
            _ => None,
        }
    }
}

/// One reviewable unit of work, built fresh per item and never mutated
/// after submission.
#[derive(Debug, Clone, PartialEq)]
pub struct ApprovalRequest {
    /// Label shown to approvers
    pub function_name: String,
    /// Data under review
    pub arguments: Value,
    /// Free text context for the approver
    pub documentation: Option<String>,
    pub title: Option<String>,
    /// Groups related requests; defaults to the host execution id
    pub session_id: String,
    pub direction: Direction,
    /// Caller metadata with host identity fields layered on top
    pub metadata: Map<String, Value>,
    pub tool_calls: Option<Vec<String>>,
    /// Where the service should POST the decision (suspend/resume only)
    pub callback_url: Option<String>,
}

/// The service's view of a request at one point in time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApprovalOutcome {
    /// Opaque, service-assigned, stable for the request's lifetime
    pub request_id: String,
    /// Raw state as reported, before classification
    pub state: Option<String>,
    pub requested_change: Option<String>,
    /// Reviewer's reason, when the protocol reports one
    pub reason: Option<String>,
    /// Accepted without human review; counts as approval where supported
    pub processed_async: bool,
    /// Secondary id of the human review task (trace protocol)
    pub review_task_id: Option<String>,
}

impl ApprovalOutcome {
    pub fn new(request_id: impl Into<String>, state: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            state: Some(state.into()),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_accepts_only_known_names() {
        assert_eq!(Direction::from_str_loose("Inlet"), Some(Direction::Inlet));
        assert_eq!(Direction::from_str_loose(" response "), Some(Direction::Response));
        assert_eq!(Direction::from_str_loose("SIGNAL"), Some(Direction::Signal));
        for alias in ["in", "input", "out", "output", "event"] {
            assert_eq!(Direction::from_str_loose(alias), None, "{}", alias);
        }
    }
}
