//! Passive wait: decide whether a freshly created trace can be resolved now
//! or whether the execution must be parked until the service calls back.
//!
//! Nothing here survives the suspension. On resume the host re-enters the
//! gate with the callback payload as its input, which already carries the
//! decision.

use crate::decision::{Classification, Decision};
use crate::error::{GateError, Result};
use crate::gate::types::Item;
use crate::request::types::ApprovalOutcome;
use crate::resolver::Resolution;
use crate::service::Protocol;
use chrono::{DateTime, TimeDelta, Utc};

/// Default suspension window: 14 days.
pub const DEFAULT_SUSPEND_MINUTES: i64 = 14 * 24 * 60;

#[derive(Debug, Clone, PartialEq)]
pub enum SuspendStep {
    /// Decided at creation time; no suspension needed.
    Resolved(Resolution),
    /// A human has to look at it; wait for the callback.
    Suspend {
        request_id: String,
        review_task_id: String,
    },
}

/// Evaluate the create response of a trace.
pub fn evaluate(protocol: Protocol, outcome: ApprovalOutcome) -> Result<SuspendStep> {
    let classification = protocol
        .vocabulary()
        .classify(outcome.state.as_deref(), outcome.processed_async);

    let decision = match classification {
        Classification::Approved => Decision::Approved,
        Classification::Declined => Decision::Declined,
        Classification::ChangeRequested => Decision::ChangeRequested,
        // An unknown state with a review task still has a reviewer behind it.
        Classification::Error(raw) => match outcome.review_task_id {
            Some(review_task_id) => {
                tracing::warn!(
                    "Unrecognized state '{}' for {} {}, waiting on reviewTaskId {}",
                    raw,
                    protocol.id_key(),
                    outcome.request_id,
                    review_task_id
                );
                return Ok(SuspendStep::Suspend {
                    request_id: outcome.request_id,
                    review_task_id,
                });
            }
            None => Decision::Error(raw),
        },
        Classification::Pending => {
            return match outcome.review_task_id {
                Some(review_task_id) => Ok(SuspendStep::Suspend {
                    request_id: outcome.request_id,
                    review_task_id,
                }),
                // Nothing would ever call us back for this one.
                None => Err(GateError::InvalidResponse {
                    body: format!(
                        "{} {} awaits review ({}) but no reviewTaskId was returned",
                        protocol.id_key(),
                        outcome.request_id,
                        outcome.state.as_deref().unwrap_or("no state")
                    ),
                }),
            };
        }
    };

    Ok(SuspendStep::Resolved(Resolution::from_outcome(
        outcome, decision, 0,
    )))
}

/// When a suspended execution gives up waiting. Non-positive timeouts fall
/// back to the 14 day default.
pub fn suspend_until(now: DateTime<Utc>, timeout_minutes: i64) -> Result<DateTime<Utc>> {
    let minutes = if timeout_minutes > 0 {
        timeout_minutes
    } else {
        DEFAULT_SUSPEND_MINUTES
    };
    TimeDelta::try_minutes(minutes)
        .and_then(|window| now.checked_add_signed(window))
        .ok_or_else(|| {
            GateError::Config(format!("timeout_minutes {} is out of range", timeout_minutes))
        })
}

/// Whether this batch is the re-entry after a callback rather than a fresh
/// run. Only the first item is inspected.
pub fn is_resume(items: &[Item]) -> bool {
    items.first().is_some_and(Item::has_decision_marker)
}
