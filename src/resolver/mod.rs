//! Outcome resolvers: take a freshly created request to a final decision.
//!
//! Two strategies exist side by side. [`polling`] keeps the execution alive
//! and re-fetches the state on a fixed interval. [`suspend`] decides whether
//! the whole execution has to be parked until the service calls back.

pub mod clock;
pub mod polling;
pub mod suspend;

use crate::decision::Decision;
use crate::request::types::ApprovalOutcome;

pub use clock::{Clock, ManualClock, TokioClock};
pub use polling::{PollPolicy, PollingResolver};
pub use suspend::{SuspendStep, DEFAULT_SUSPEND_MINUTES};

/// A request that reached a final decision.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub request_id: String,
    pub decision: Decision,
    pub requested_change: Option<String>,
    pub reason: Option<String>,
    pub processed_async: bool,
    pub review_task_id: Option<String>,
    /// Status fetches performed after creation.
    pub attempts: u32,
}

impl Resolution {
    pub fn from_outcome(outcome: ApprovalOutcome, decision: Decision, attempts: u32) -> Self {
        Self {
            request_id: outcome.request_id,
            decision,
            requested_change: outcome.requested_change,
            reason: outcome.reason,
            processed_async: outcome.processed_async,
            review_task_id: outcome.review_task_id,
            attempts,
        }
    }
}
