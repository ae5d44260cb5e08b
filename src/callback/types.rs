//! Callback payloads sent by the approval service when a review finishes.

use crate::decision::{Classification, Decision, Vocabulary};
use crate::gate::types::Item;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map};

/// Body of the service's `POST {resumeUrl}/{nodeId}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackPayload {
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub trace_id: Option<String>,
    #[serde(default, alias = "requestTaskId")]
    pub review_task_id: Option<String>,
    #[serde(default)]
    pub requested_change: Option<String>,
}

impl CallbackPayload {
    /// The decision this callback carries. A missing state means approved;
    /// a state that is still non-final is not something a callback may
    /// report, so it surfaces as `Error`.
    pub fn decision(&self) -> Decision {
        let Some(raw) = self.state.as_deref().filter(|s| !s.trim().is_empty()) else {
            return Decision::Approved;
        };
        match Vocabulary::TRACE.classify(Some(raw), false) {
            Classification::Approved => Decision::Approved,
            Classification::Declined => Decision::Declined,
            Classification::ChangeRequested => Decision::ChangeRequested,
            Classification::Pending => Decision::Error(raw.to_string()),
            Classification::Error(raw) => Decision::Error(raw),
        }
    }

    /// The item the resumed execution starts from. Its `approved` field is
    /// the marker the gate uses to recognise a resume.
    pub fn into_item(self) -> Item {
        let decision = self.decision();
        let mut json = Map::new();
        json.insert("approved".to_string(), json!(decision.is_approved()));
        json.insert("state".to_string(), json!(decision.as_state()));
        if let Decision::Error(ref raw) = decision {
            json.insert(
                "error".to_string(),
                json!(format!("Unexpected callback state: {}", raw)),
            );
        }
        if let Some(trace_id) = self.trace_id {
            json.insert("traceId".to_string(), json!(trace_id));
        }
        if let Some(review_task_id) = self.review_task_id {
            json.insert("reviewTaskId".to_string(), json!(review_task_id));
        }
        if let Some(change) = self.requested_change {
            json.insert("requestedChange".to_string(), json!(change));
        }
        Item::new(serde_json::Value::Object(json))
    }
}

/// A callback received for one node.
#[derive(Debug, Clone, PartialEq)]
pub struct ResumeEvent {
    pub node_id: String,
    pub payload: CallbackPayload,
}
