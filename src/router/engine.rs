//! Maps a resolved decision onto an output channel.
//!
//! Every emitted item is the original payload with a decision record merged
//! on top: `approved`, `state`, the protocol's id key, and whatever of
//! `requestedChange`, `reason`, `reviewTaskId`, `processedAsync` and
//! `behaviorMode` apply.

use crate::decision::Decision;
use crate::error::{GateError, Result};
use crate::gate::types::Item;
use crate::resolver::Resolution;
use crate::router::types::{BehaviorMode, Channel};
use crate::service::Protocol;
use serde_json::{json, Map, Value};

#[derive(Debug, Clone, Copy)]
pub struct OutputRouter {
    mode: BehaviorMode,
    id_key: &'static str,
    /// Whether `behaviorMode` is written onto output items.
    record_mode: bool,
}

impl OutputRouter {
    pub fn new(mode: BehaviorMode, protocol: Protocol) -> Self {
        Self {
            mode,
            id_key: protocol.id_key(),
            record_mode: true,
        }
    }

    /// For gates whose behavior is fixed rather than configured.
    pub fn without_mode_field(mut self) -> Self {
        self.record_mode = false;
        self
    }

    pub fn mode(&self) -> BehaviorMode {
        self.mode
    }

    /// Route a resolved item.
    ///
    /// In fail mode anything but approval is an error for the caller to
    /// either propagate or turn into an error item.
    pub fn route(&self, item: &Item, index: usize, resolution: &Resolution) -> Result<(Channel, Item)> {
        let fields = self.decision_record(resolution);
        let id = resolution.request_id.clone();

        match (self.mode, &resolution.decision) {
            (_, Decision::Approved) => Ok((Channel::Approved, item.merged(index, fields))),

            (BehaviorMode::FailOnNonApproval, Decision::Declined) => Err(GateError::Declined {
                id_key: self.id_key,
                id,
                reason: resolution
                    .reason
                    .clone()
                    .or_else(|| non_empty(&resolution.requested_change))
                    .unwrap_or_else(|| "No reason provided".to_string()),
            }),
            (BehaviorMode::FailOnNonApproval, Decision::ChangeRequested) => {
                Err(GateError::ChangeRequested {
                    id_key: self.id_key,
                    id,
                    change: non_empty(&resolution.requested_change)
                        .unwrap_or_else(|| "no details given".to_string()),
                })
            }
            (BehaviorMode::FailOnNonApproval, Decision::Error(raw)) => {
                Err(GateError::UnexpectedState {
                    state: raw.clone(),
                    id_key: self.id_key,
                    id,
                })
            }

            (BehaviorMode::RouteByDecision, Decision::Declined) => {
                Ok((Channel::Declined, item.merged(index, fields)))
            }
            (BehaviorMode::RouteByDecision, Decision::ChangeRequested) => {
                Ok((Channel::ChangeRequested, item.merged(index, fields)))
            }
            (BehaviorMode::RouteByDecision, Decision::Error(raw)) => {
                let error = GateError::UnexpectedState {
                    state: raw.clone(),
                    id_key: self.id_key,
                    id,
                };
                let mut fields = fields;
                fields.insert("error".to_string(), json!(error.to_string()));
                Ok((Channel::Declined, item.merged(index, fields)))
            }
        }
    }

    /// Turn a failure into an error-tagged item (continue-on-failure).
    /// Fail mode keeps it on the single output; route mode sends it to the
    /// declined channel so it still lands exactly once.
    pub fn route_failure(&self, item: &Item, index: usize, error: &GateError) -> (Channel, Item) {
        let mut fields = Map::new();
        fields.insert("approved".to_string(), json!(false));
        fields.insert("state".to_string(), json!("error"));
        fields.insert("error".to_string(), json!(error.to_string()));
        if let Some(id) = error.request_id() {
            fields.insert(self.id_key.to_string(), json!(id));
        }
        if self.record_mode {
            fields.insert("behaviorMode".to_string(), json!(self.mode));
        }

        let channel = match self.mode {
            BehaviorMode::FailOnNonApproval => Channel::Approved,
            BehaviorMode::RouteByDecision => Channel::Declined,
        };
        (channel, item.merged(index, fields))
    }

    fn decision_record(&self, resolution: &Resolution) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert("approved".to_string(), json!(resolution.decision.is_approved()));
        fields.insert("state".to_string(), json!(resolution.decision.as_state()));
        fields.insert(self.id_key.to_string(), json!(resolution.request_id));
        if let Some(ref change) = resolution.requested_change {
            fields.insert("requestedChange".to_string(), json!(change));
        }
        if let Some(ref reason) = resolution.reason {
            fields.insert("reason".to_string(), json!(reason));
        }
        if let Some(ref review_task_id) = resolution.review_task_id {
            if self.id_key != "reviewTaskId" {
                fields.insert("reviewTaskId".to_string(), json!(review_task_id));
            }
        }
        if resolution.processed_async {
            fields.insert("processedAsync".to_string(), json!(true));
        }
        if self.record_mode {
            fields.insert("behaviorMode".to_string(), json!(self.mode));
        }
        fields
    }
}

fn non_empty(s: &Option<String>) -> Option<String> {
    s.as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
