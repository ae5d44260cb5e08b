//! Types shared between the gate and its host.

use crate::router::Outputs;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Identity and policy the host hands to every gate call.
///
/// The gate never looks these up on its own; whatever runs it passes a
/// snapshot in.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostContext {
    pub workflow_id: String,
    pub execution_id: String,
    pub node_id: String,
    /// Display name of the step, used as the default function name.
    pub node_name: String,
    /// Base URL the host listens on for resume callbacks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume_url: Option<String>,
    /// Emit error-tagged items instead of aborting the batch.
    #[serde(default)]
    pub continue_on_fail: bool,
}

/// One unit of workflow data flowing through the gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub json: Value,
    /// Index of the input item this one was derived from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paired_item: Option<usize>,
}

impl Item {
    pub fn new(json: Value) -> Self {
        Self {
            json,
            paired_item: None,
        }
    }

    /// Build an output item from `fields` merged onto this item's payload.
    /// Non-object payloads are kept under a `data` key.
    pub fn merged(&self, index: usize, fields: Map<String, Value>) -> Item {
        let mut json = match &self.json {
            Value::Object(map) => map.clone(),
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("data".to_string(), other.clone());
                map
            }
        };
        json.extend(fields);
        Item {
            json: Value::Object(json),
            paired_item: Some(index),
        }
    }

    /// Whether this item already carries a decision from a resume callback.
    pub fn has_decision_marker(&self) -> bool {
        self.json.get("approved").is_some()
    }
}

/// What one gate execution produced.
#[derive(Debug, Clone)]
pub enum Execution {
    /// Every item reached an output channel.
    Completed(Outputs),
    /// At least one item needs a human; the host must persist and pause the
    /// whole execution until `wait_till` or until the callback arrives.
    Suspended {
        wait_till: DateTime<Utc>,
        /// Records of the items handled before the suspension, then the
        /// parked item last. Items after it were not submitted.
        items: Vec<Item>,
    },
}
