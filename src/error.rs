//! Error types for the approval gate core.

use thiserror::Error;

/// Result alias used throughout the gate core.
pub type Result<T> = std::result::Result<T, GateError>;

/// Everything that can go wrong while taking one item through the gate.
///
/// Variants that concern a submitted request carry the service-assigned id
/// and the key the protocol uses for it, so the message lines up with the
/// service's own audit trail.
#[derive(Debug, Error)]
pub enum GateError {
    /// The service answered, but without the fields we need.
    #[error("Invalid API response: {body}")]
    InvalidResponse { body: String },

    #[error("Request was declined by approver (reason: {reason}, {id_key}: {id})")]
    Declined {
        id_key: &'static str,
        id: String,
        reason: String,
    },

    #[error("Approver requested a change: {change} ({id_key}: {id})")]
    ChangeRequested {
        id_key: &'static str,
        id: String,
        change: String,
    },

    #[error("Approval timeout after {minutes} minutes ({id_key}: {id})")]
    Timeout {
        minutes: i64,
        id_key: &'static str,
        id: String,
    },

    #[error("Unexpected state: {state} ({id_key}: {id})")]
    UnexpectedState {
        state: String,
        id_key: &'static str,
        id: String,
    },

    #[error("Wait was cancelled by the host ({id_key}: {id})")]
    Cancelled { id_key: &'static str, id: String },

    /// Transport failure talking to the service.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-2xx answer from the service.
    #[error("Approval service returned {status}: {body}")]
    Service { status: u16, body: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    /// A per-item failure that aborted the batch.
    #[error("item {index}: {source}")]
    Item {
        index: usize,
        #[source]
        source: Box<GateError>,
    },
}

impl GateError {
    /// The request id this failure refers to, if one was assigned.
    pub fn request_id(&self) -> Option<&str> {
        match self {
            GateError::Declined { id, .. }
            | GateError::ChangeRequested { id, .. }
            | GateError::Timeout { id, .. }
            | GateError::UnexpectedState { id, .. }
            | GateError::Cancelled { id, .. } => Some(id),
            GateError::Item { source, .. } => source.request_id(),
            _ => None,
        }
    }

    /// Wrap a per-item failure with the index of the item it belongs to.
    pub fn for_item(self, index: usize) -> Self {
        GateError::Item {
            index,
            source: Box::new(self),
        }
    }
}
