//! Scripted service (for testing and dry runs).
//! Answers from queues of canned responses and records every call.

use crate::error::{GateError, Result};
use crate::service::ApprovalService;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;

/// One recorded outbound call.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub method: &'static str,
    pub path: String,
    pub body: Option<Value>,
}

#[derive(Default)]
struct Script {
    creates: VecDeque<Value>,
    statuses: VecDeque<Value>,
    calls: Vec<RecordedCall>,
}

/// Service fake. POSTs pop from the create queue, GETs from the status
/// queue. When the status queue is down to its last entry, that entry is
/// repeated, which makes "never leaves pending" one line to set up.
#[derive(Default)]
pub struct ScriptedService {
    script: Mutex<Script>,
}

impl ScriptedService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_create(self, response: Value) -> Self {
        self.lock().creates.push_back(response);
        self
    }

    pub fn with_status(self, response: Value) -> Self {
        self.lock().statuses.push_back(response);
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.lock().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }

    /// Number of status fetches performed.
    pub fn poll_count(&self) -> usize {
        self.lock().calls.iter().filter(|c| c.method == "GET").count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        // A panicking test thread must not hide the script from the others.
        self.script.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl ApprovalService for ScriptedService {
    async fn post_json(&self, path: &str, body: &Value) -> Result<Value> {
        let mut script = self.lock();
        script.calls.push(RecordedCall {
            method: "POST",
            path: path.to_string(),
            body: Some(body.clone()),
        });
        script.creates.pop_front().ok_or_else(|| GateError::Service {
            status: 500,
            body: format!("no scripted create response for {}", path),
        })
    }

    async fn get_json(&self, path: &str) -> Result<Value> {
        let mut script = self.lock();
        script.calls.push(RecordedCall {
            method: "GET",
            path: path.to_string(),
            body: None,
        });
        let next = if script.statuses.len() > 1 {
            script.statuses.pop_front()
        } else {
            script.statuses.front().cloned()
        };
        next.ok_or_else(|| GateError::Service {
            status: 500,
            body: format!("no scripted status response for {}", path),
        })
    }
}
