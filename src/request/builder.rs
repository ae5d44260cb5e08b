//! Assembles an `ApprovalRequest` from an item, the gate configuration and
//! the host context. Pure: no I/O, no clock.

use crate::gate::types::{HostContext, Item};
use crate::request::types::{ApprovalRequest, Direction};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Caller metadata as configured: either JSON text or an inline mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataInput {
    Text(String),
    Map(Map<String, Value>),
}

impl MetadataInput {
    /// Parse into a map. Anything that is not a JSON object is treated as
    /// empty rather than failing the item.
    pub fn to_map(&self) -> Map<String, Value> {
        match self {
            MetadataInput::Map(map) => map.clone(),
            MetadataInput::Text(text) if text.trim().is_empty() => Map::new(),
            MetadataInput::Text(text) => match serde_json::from_str::<Value>(text) {
                Ok(Value::Object(map)) => map,
                Ok(_) | Err(_) => {
                    tracing::debug!("Ignoring malformed metadata: {}", text);
                    Map::new()
                }
            },
        }
    }
}

/// Request-shaping part of a gate's configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestConfig {
    /// Label for approvers; defaults to the node name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Explicit arguments; defaults to the item payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default)]
    pub direction: Direction,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MetadataInput>,
    /// Register the host's resume URL with the service
    #[serde(default)]
    pub register_callback: bool,
}

/// Builds approval requests for one gate instance.
#[derive(Debug, Clone)]
pub struct RequestBuilder<'a> {
    config: &'a RequestConfig,
    host: &'a HostContext,
}

impl<'a> RequestBuilder<'a> {
    pub fn new(config: &'a RequestConfig, host: &'a HostContext) -> Self {
        Self { config, host }
    }

    /// Build the request for the item at `index`.
    pub fn build(&self, item: &Item, index: usize) -> ApprovalRequest {
        let function_name = non_empty(self.config.function_name.as_deref())
            .or_else(|| non_empty(Some(&self.host.node_name)))
            .map(str::to_string)
            .unwrap_or_else(|| format!("Step {}", index + 1));

        let arguments = self
            .config
            .arguments
            .clone()
            .unwrap_or_else(|| item.json.clone());

        let session_id = non_empty(self.config.session_id.as_deref())
            .unwrap_or(&self.host.execution_id)
            .to_string();

        let tool_calls = if self.config.tool_calls.is_empty() {
            None
        } else {
            Some(self.config.tool_calls.clone())
        };

        ApprovalRequest {
            function_name,
            arguments,
            documentation: non_empty(self.config.description.as_deref()).map(str::to_string),
            title: non_empty(self.config.title.as_deref()).map(str::to_string),
            session_id,
            direction: self.config.direction,
            metadata: self.metadata(index),
            tool_calls,
            callback_url: self.callback_url(),
        }
    }

    /// Caller metadata first, then host identity on top so it cannot be
    /// overridden.
    fn metadata(&self, index: usize) -> Map<String, Value> {
        let mut metadata = self
            .config
            .metadata
            .as_ref()
            .map(MetadataInput::to_map)
            .unwrap_or_default();

        metadata.insert(
            "workflowId".to_string(),
            Value::String(self.host.workflow_id.clone()),
        );
        metadata.insert(
            "executionId".to_string(),
            Value::String(self.host.execution_id.clone()),
        );
        metadata.insert("nodeId".to_string(), Value::String(self.host.node_id.clone()));
        metadata.insert("itemIndex".to_string(), Value::from(index));
        metadata
    }

    fn callback_url(&self) -> Option<String> {
        if !self.config.register_callback {
            return None;
        }
        self.host
            .resume_url
            .as_deref()
            .map(|base| callback_url(base, &self.host.node_id))
    }
}

/// Compose the callback URL the service should invoke for a node.
pub fn callback_url(resume_base: &str, node_id: &str) -> String {
    format!("{}/{}", resume_base.trim_end_matches('/'), node_id)
}

/// Split a comma-separated tool list, dropping blanks.
pub fn parse_tool_calls(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}
