//! `approvalgate check`: validate a gate file and show what it will do.
//! With `--credentials`, also confirm the API key against the service.

use crate::config::{parse_gate_file, GateVariant};
use crate::service::{ApprovalService, Credentials, HttpApprovalService};
use anyhow::{bail, Context, Result};
use colored::Colorize;
use serde_json::Value;
use std::path::Path;

pub fn run_check(config_path: &Path) -> Result<()> {
    let spec = parse_gate_file(config_path)?;

    println!();
    println!("  {} Gate config is valid!", "✓".green().bold());
    println!("  Gate:    {}", spec.variant.to_string().cyan());
    println!("  {}", spec.describe());
    println!();

    let name = spec
        .request
        .function_name
        .as_deref()
        .unwrap_or("(node name)");
    println!("  Function:  {}", name);
    println!("  Direction: {}", spec.request.direction);
    if spec.variant != GateVariant::SuspendResumeV2 {
        println!("  Mode:      {}", spec.behavior_mode);
    }
    if !spec.request.tool_calls.is_empty() {
        println!("  Tools:     {}", spec.request.tool_calls.join(", "));
    }
    if let Some(ref metadata) = spec.request.metadata {
        let keys: Vec<String> = metadata.to_map().keys().cloned().collect();
        if !keys.is_empty() {
            println!("  Metadata:  {}", keys.join(", "));
        }
    }
    println!();

    Ok(())
}

pub async fn run_check_credentials(api_key: &str, domain: &str) -> Result<()> {
    if api_key.trim().is_empty() {
        bail!("No API key. Pass --api-key or set APPROVALGATE_API_KEY");
    }
    let service = HttpApprovalService::new(Credentials::new(api_key, domain));
    let project = verify_credentials(&service)
        .await
        .with_context(|| format!("API key was rejected by {}", domain))?;

    println!(
        "  {} API key accepted for project {}",
        "✓".green().bold(),
        project.cyan()
    );
    println!();
    Ok(())
}

/// Name of the project the service's credentials belong to.
async fn verify_credentials(service: &dyn ApprovalService) -> Result<String> {
    let project = service.verify().await?;
    Ok(project
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or("(unnamed)")
        .to_string())
}
