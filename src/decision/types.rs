//! Core types for decision classification.
//!
//! The service reports a free-form state string. These types are what that
//! string means to the gate once it has been normalized.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A final decision on an approval request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approved,
    Declined,
    ChangeRequested,
    /// The service reported a state nobody recognises. The raw value is kept
    /// for diagnostics and is never mapped onto approve or decline.
    Error(String),
}

impl Decision {
    /// The normalized state name written onto output items.
    pub fn as_state(&self) -> &'static str {
        match self {
            Decision::Approved => "approved",
            Decision::Declined => "declined",
            Decision::ChangeRequested => "change_requested",
            Decision::Error(_) => "error",
        }
    }

    pub fn is_approved(&self) -> bool {
        matches!(self, Decision::Approved)
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Error(raw) => write!(f, "error ({})", raw),
            other => write!(f, "{}", other.as_state()),
        }
    }
}

/// A point-in-time classification of a request's state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Still waiting on a reviewer (pending, processing, requires intervention).
    Pending,
    Approved,
    Declined,
    ChangeRequested,
    /// Non-empty state that matched no synonym.
    Error(String),
}

impl Classification {
    /// Terminal classifications end the wait. `Error` is not terminal on its
    /// own: the polling resolver decides when to give up on it.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Classification::Approved | Classification::Declined | Classification::ChangeRequested
        )
    }

    /// Convert into a final decision. `Pending` has none.
    pub fn into_decision(self) -> Option<Decision> {
        match self {
            Classification::Pending => None,
            Classification::Approved => Some(Decision::Approved),
            Classification::Declined => Some(Decision::Declined),
            Classification::ChangeRequested => Some(Decision::ChangeRequested),
            Classification::Error(raw) => Some(Decision::Error(raw)),
        }
    }
}
