pub mod http;
pub mod protocol;
pub mod scripted;

use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;

/// Project endpoint, answered for any valid key.
pub const PROJECT_PATH: &str = "/api/v1/project";

pub use http::{Credentials, HttpApprovalService};
pub use protocol::Protocol;
pub use scripted::ScriptedService;

/// Transport to the external approval service.
///
/// Implementations only move JSON; every protocol detail (paths, field
/// names, validation) lives in [`Protocol`]. One attempt per call, errors
/// propagate.
#[async_trait]
pub trait ApprovalService: Send + Sync {
    /// POST `body` to `path` and return the decoded response body.
    async fn post_json(&self, path: &str, body: &Value) -> Result<Value>;

    /// GET `path` and return the decoded response body.
    async fn get_json(&self, path: &str) -> Result<Value>;

    /// Check the credentials by fetching the project they belong to.
    async fn verify(&self) -> Result<Value> {
        self.get_json(PROJECT_PATH).await
    }
}
