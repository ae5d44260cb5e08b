//! Wire protocol for each version of the approval service.
//!
//! The service has called its approval unit a watch, a review task and a
//! trace over time. The shape is the same (an opaque id plus a state), but
//! paths, field names and synonyms differ, so each version is a variant here
//! rather than a guess at a common format.

use crate::decision::Vocabulary;
use crate::error::{GateError, Result};
use crate::request::types::{ApprovalOutcome, ApprovalRequest, Direction};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

const DEFAULT_WATCH_DOC: &str = "Approve data processing in workflow";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Protocol {
    /// `/api/v1/watches`
    Watches,
    /// `/api/v1/review-tasks`
    ReviewTasks,
    /// `/api/v1/trace`
    Trace,
}

impl Protocol {
    pub fn create_path(&self) -> &'static str {
        match self {
            Protocol::Watches => "/api/v1/watches",
            Protocol::ReviewTasks => "/api/v1/review-tasks",
            Protocol::Trace => "/api/v1/trace",
        }
    }

    /// Status endpoint for `id`. The trace protocol has none: decisions come
    /// back through the callback.
    pub fn status_path(&self, id: &str) -> Option<String> {
        match self {
            Protocol::Watches => Some(format!("/api/v1/watches/{}", id)),
            Protocol::ReviewTasks => Some(format!("/api/v1/review-tasks/{}", id)),
            Protocol::Trace => None,
        }
    }

    /// Name of the id field, used on output items and in error messages.
    pub fn id_key(&self) -> &'static str {
        match self {
            Protocol::Watches => "requestId",
            Protocol::ReviewTasks => "reviewTaskId",
            Protocol::Trace => "traceId",
        }
    }

    pub fn vocabulary(&self) -> &'static Vocabulary {
        match self {
            Protocol::Watches => &Vocabulary::WATCHES,
            Protocol::ReviewTasks => &Vocabulary::REVIEW_TASKS,
            Protocol::Trace => &Vocabulary::TRACE,
        }
    }

    /// Render the create body for this version.
    pub fn request_body(&self, request: &ApprovalRequest) -> Value {
        match self {
            Protocol::Watches => json!({
                "functionname": request.function_name,
                "args": request.arguments,
                "doc": request.documentation.as_deref().unwrap_or(DEFAULT_WATCH_DOC),
                "metadata": request.metadata,
            }),
            Protocol::ReviewTasks => {
                let mut body = Map::new();
                body.insert("functionName".into(), json!(request.function_name));
                body.insert("args".into(), request.arguments.clone());
                body.insert("metadata".into(), Value::Object(request.metadata.clone()));
                body.insert("sessionId".into(), json!(request.session_id));
                body.insert("direction".into(), json!(request.direction));
                if let Some(ref doc) = request.documentation {
                    body.insert("documentation".into(), json!(doc));
                }
                if let Some(ref title) = request.title {
                    body.insert("title".into(), json!(title));
                }
                if let Some(ref tools) = request.tool_calls {
                    body.insert("toolCalls".into(), json!(tools));
                }
                Value::Object(body)
            }
            Protocol::Trace => {
                let mut body = Map::new();
                body.insert("functionName".into(), json!(request.function_name));
                body.insert("args".into(), request.arguments.clone());
                body.insert("metadata".into(), Value::Object(request.metadata.clone()));
                body.insert("sessionId".into(), json!(request.session_id));
                if request.direction != Direction::Inlet {
                    body.insert("direction".into(), json!(request.direction));
                }
                if let Some(ref title) = request.title {
                    body.insert("title".into(), json!(title));
                }
                if let Some(ref tools) = request.tool_calls {
                    body.insert("toolCalls".into(), json!(tools));
                }
                if let Some(ref url) = request.callback_url {
                    body.insert("webhookUrl".into(), json!(url));
                }
                Value::Object(body)
            }
        }
    }

    /// Parse a create response. A response without an id is fatal for the
    /// item.
    pub fn parse_created(&self, body: Value) -> Result<ApprovalOutcome> {
        let id = match self {
            Protocol::Watches => str_field(&body, "requestId"),
            Protocol::ReviewTasks => {
                str_field(&body, "reviewTaskId").or_else(|| str_field(&body, "id"))
            }
            Protocol::Trace => str_field(&body, "traceId"),
        };
        let Some(request_id) = id else {
            return Err(GateError::InvalidResponse {
                body: body.to_string(),
            });
        };

        let state = match self {
            Protocol::Trace => str_field(&body, "status").or_else(|| str_field(&body, "state")),
            _ => str_field(&body, "state"),
        };

        Ok(ApprovalOutcome {
            request_id,
            state,
            requested_change: str_field(&body, "requestedChange"),
            reason: None,
            processed_async: body
                .get("processedAsync")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            review_task_id: match self {
                Protocol::Trace => str_field(&body, "reviewTaskId"),
                _ => None,
            },
        })
    }

    /// Parse a status response for an already-created request. Unlike a
    /// create response, a status without a state is fatal.
    pub fn parse_status(&self, request_id: &str, body: Value) -> Result<ApprovalOutcome> {
        let Some(state) = body.is_object().then(|| str_field(&body, "state")).flatten() else {
            return Err(GateError::InvalidResponse {
                body: format!("no state for {} {}: {}", self.id_key(), request_id, body),
            });
        };
        let reason = match self {
            Protocol::Watches => body
                .get("result")
                .and_then(|r| r.get("reason"))
                .and_then(Value::as_str)
                .map(str::to_string),
            _ => str_field(&body, "reason"),
        };

        Ok(ApprovalOutcome {
            request_id: request_id.to_string(),
            state: Some(state),
            requested_change: str_field(&body, "requestedChange"),
            reason,
            processed_async: body
                .get("processedAsync")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            review_task_id: None,
        })
    }
}

/// Read a field as a string. Numeric ids are accepted and stringified.
fn str_field(body: &Value, key: &str) -> Option<String> {
    match body.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
