//! Active wait loop.
//!
//! ```text
//! Created ──terminal──────────────▶ Terminal   (zero polls)
//!    │
//!    └─pending──▶ Waiting ──terminal──▶ Terminal
//!                   │  ▲
//!                   │  └─sleep, fetch, classify
//!                   ├─budget spent──▶ TimedOut
//!                   └─error/cancel──▶ Failed
//! ```
//!
//! Every sleep races the host's cancellation token, so a cancelled
//! execution leaves the loop on the next wake instead of after the timeout.
//! With an unlimited timeout and a service that never decides, the loop
//! holds its task forever; each run is its own unit, so that is accepted.

use crate::decision::{Classification, Decision};
use crate::error::{GateError, Result};
use crate::request::types::ApprovalOutcome;
use crate::resolver::clock::Clock;
use crate::resolver::Resolution;
use crate::service::{ApprovalService, Protocol};
use std::fmt;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Consecutive unrecognized states tolerated before giving up with `Error`.
pub const MAX_UNRECOGNIZED_POLLS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Created,
    Waiting,
    Terminal,
    TimedOut,
    Failed,
}

impl fmt::Display for PollState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PollState::Created => write!(f, "created"),
            PollState::Waiting => write!(f, "waiting"),
            PollState::Terminal => write!(f, "terminal"),
            PollState::TimedOut => write!(f, "timed_out"),
            PollState::Failed => write!(f, "failed"),
        }
    }
}

/// Interval and budget for one polling gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    interval_secs: u64,
    timeout_minutes: i64,
}

impl PollPolicy {
    pub const MIN_INTERVAL_SECS: u64 = 1;
    pub const MAX_INTERVAL_SECS: u64 = 300;

    /// The interval is clamped to 1..=300 seconds. A timeout of zero or
    /// less means wait forever.
    pub fn new(interval_secs: u64, timeout_minutes: i64) -> Self {
        Self {
            interval_secs: interval_secs.clamp(Self::MIN_INTERVAL_SECS, Self::MAX_INTERVAL_SECS),
            timeout_minutes,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn timeout_minutes(&self) -> i64 {
        self.timeout_minutes
    }

    /// `ceil(timeout * 60 / interval)`, or `None` when unlimited.
    pub fn max_attempts(&self) -> Option<u64> {
        if self.timeout_minutes <= 0 {
            return None;
        }
        let budget = (self.timeout_minutes as u64).saturating_mul(60);
        Some(budget.div_ceil(self.interval_secs))
    }
}

/// Drives one request from creation to a final decision by polling.
pub struct PollingResolver<'a> {
    service: &'a dyn ApprovalService,
    clock: &'a dyn Clock,
    protocol: Protocol,
    policy: PollPolicy,
    cancel: &'a CancellationToken,
}

impl<'a> PollingResolver<'a> {
    pub fn new(
        service: &'a dyn ApprovalService,
        clock: &'a dyn Clock,
        protocol: Protocol,
        policy: PollPolicy,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            service,
            clock,
            protocol,
            policy,
            cancel,
        }
    }

    /// Wait until `initial` reaches a final decision.
    ///
    /// Already-final outcomes return without a single fetch.
    pub async fn resolve(&self, initial: ApprovalOutcome) -> Result<Resolution> {
        let id_key = self.protocol.id_key();
        let vocabulary = self.protocol.vocabulary();
        let max_attempts = self.policy.max_attempts();

        let mut outcome = initial;
        let mut attempts: u32 = 0;
        let mut unrecognized: u32 = 0;
        let mut state = PollState::Created;

        loop {
            let classification =
                vocabulary.classify(outcome.state.as_deref(), outcome.processed_async);
            let decision = match classification {
                Classification::Approved => Some(Decision::Approved),
                Classification::Declined => Some(Decision::Declined),
                Classification::ChangeRequested => Some(Decision::ChangeRequested),
                Classification::Pending => {
                    unrecognized = 0;
                    None
                }
                Classification::Error(raw) => {
                    unrecognized += 1;
                    tracing::warn!(
                        "Unrecognized state '{}' for {} {} ({}/{})",
                        raw,
                        id_key,
                        outcome.request_id,
                        unrecognized,
                        MAX_UNRECOGNIZED_POLLS
                    );
                    (unrecognized >= MAX_UNRECOGNIZED_POLLS).then(|| Decision::Error(raw))
                }
            };

            if let Some(decision) = decision {
                tracing::info!(
                    "{} {} {} -> {} after {} poll(s): {}",
                    id_key,
                    outcome.request_id,
                    state,
                    PollState::Terminal,
                    attempts,
                    decision
                );
                return Ok(Resolution::from_outcome(outcome, decision, attempts));
            }

            if let Some(max) = max_attempts {
                if u64::from(attempts) >= max {
                    tracing::warn!(
                        "{} {} {} -> {} after {} poll(s)",
                        id_key,
                        outcome.request_id,
                        state,
                        PollState::TimedOut,
                        attempts
                    );
                    return Err(GateError::Timeout {
                        minutes: self.policy.timeout_minutes(),
                        id_key,
                        id: outcome.request_id,
                    });
                }
            }

            if state == PollState::Created {
                tracing::debug!(
                    "{} {} {} -> {}",
                    id_key,
                    outcome.request_id,
                    state,
                    PollState::Waiting
                );
                state = PollState::Waiting;
            }

            let Some(path) = self.protocol.status_path(&outcome.request_id) else {
                return Err(GateError::Config(format!(
                    "the {} protocol has no status endpoint to poll",
                    vocabulary.name
                )));
            };

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    tracing::debug!("{} {} {} -> {}", id_key, outcome.request_id, state, PollState::Failed);
                    return Err(GateError::Cancelled { id_key, id: outcome.request_id });
                }
                _ = self.clock.sleep(self.policy.interval()) => {}
            }
            if self.cancel.is_cancelled() {
                return Err(GateError::Cancelled {
                    id_key,
                    id: outcome.request_id,
                });
            }

            attempts += 1;
            tracing::debug!("Polling {} {} (attempt {})", id_key, outcome.request_id, attempts);
            let body = self.service.get_json(&path).await?;
            outcome = self.protocol.parse_status(&outcome.request_id, body)?;
        }
    }
}
