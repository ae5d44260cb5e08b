//! `approvalgate run`: execute a gate over a batch of items as a minimal
//! local host.
//!
//! 1. Parse the gate file and the input items
//! 2. For the suspend/resume gate, start the callback server so the service
//!    has somewhere to report back to
//! 3. Execute the gate
//! 4. On suspension, wait for the callback (or `wait_till`), execute again
//!    with the resume item, then continue with the items not yet submitted
//! 5. Print every output channel as JSON

use crate::audit::AuditLogger;
use crate::callback::CallbackServer;
use crate::config::{parse_gate_file, GateSpec, GateVariant};
use crate::error::GateError;
use crate::gate::{Execution, Gate, HostContext, Item};
use crate::router::{BehaviorMode, Channel, Outputs};
use crate::service::{Credentials, HttpApprovalService};
use anyhow::{bail, Context, Result};
use chrono::Utc;
use colored::Colorize;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
pub struct RunOptions {
    pub config_path: PathBuf,
    /// JSON file holding one item or an array of items
    pub input_path: PathBuf,
    pub continue_on_fail: bool,
    pub callback_bind: String,
    /// Externally reachable base URL, when the service cannot reach the bind
    /// address directly
    pub public_url: Option<String>,
    pub audit_log: Option<PathBuf>,
    pub api_key: String,
    pub domain: String,
    pub node_id: String,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from("gate.yaml"),
            input_path: PathBuf::from("items.json"),
            continue_on_fail: false,
            callback_bind: "127.0.0.1:0".to_string(),
            public_url: None,
            audit_log: None,
            api_key: String::new(),
            domain: crate::service::http::DEFAULT_DOMAIN.to_string(),
            node_id: "approval-gate".to_string(),
        }
    }
}

pub async fn run_gate(options: RunOptions) -> Result<()> {
    let spec = parse_gate_file(&options.config_path)?;
    let items = read_items(&options.input_path)?;

    if options.api_key.trim().is_empty() {
        bail!("No API key. Pass --api-key or set APPROVALGATE_API_KEY");
    }

    let execution_id = uuid::Uuid::new_v4().to_string();
    let mut host = HostContext {
        workflow_id: "local".to_string(),
        execution_id: execution_id.clone(),
        node_id: options.node_id.clone(),
        node_name: spec
            .request
            .function_name
            .clone()
            .unwrap_or_else(|| options.node_id.clone()),
        resume_url: None,
        continue_on_fail: options.continue_on_fail,
    };

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("  {} Interrupted, cancelling wait...", "⚠".yellow());
                cancel.cancel();
            }
        });
    }

    let service = HttpApprovalService::new(Credentials::new(&options.api_key, &options.domain));
    let mut gate = Gate::new(spec.clone(), Arc::new(service)).with_cancellation(cancel.clone());
    if let Some(logger) = open_audit_log(options.audit_log.as_deref(), &execution_id) {
        eprintln!(
            "  {} Decision log: {}",
            "•".dimmed(),
            logger.log_path().display().to_string().dimmed()
        );
        gate = gate.with_audit(Arc::new(Mutex::new(logger)));
    }

    let mut server = CallbackServer::new();
    if spec.variant == GateVariant::SuspendResumeV2 {
        let local = server.start(&options.callback_bind).await?;
        let base = options.public_url.clone().unwrap_or(local);
        eprintln!("  {} Callbacks: {}/{}", "•".dimmed(), base, host.node_id);
        host.resume_url = Some(base);
    }

    eprintln!(
        "  {} {} over {} item(s)",
        "▶".cyan(),
        spec.variant.to_string().bold(),
        items.len()
    );

    let result = drive(&gate, &spec, &server, items, &host, &cancel).await;
    server.stop().await?;
    let outputs = result?;

    print_outputs(&spec, &outputs)?;
    Ok(())
}

/// Execute until the gate completes, waiting out each suspension.
///
/// A suspended pass hands back the records of the items it already handled
/// plus the parked item. Those records are kept, the parked item is replaced
/// by its callback once it arrives, and the items after it go through the
/// gate on the next pass.
async fn drive(
    gate: &Gate,
    spec: &GateSpec,
    server: &CallbackServer,
    items: Vec<Item>,
    host: &HostContext,
    cancel: &CancellationToken,
) -> Result<Outputs> {
    let mut remaining = items;
    let mut first_index = 0;
    let mut done: Vec<Item> = Vec::new();

    loop {
        let (wait_till, mut parked) = match gate.execute_from(&remaining, first_index, host).await? {
            Execution::Completed(outputs) if done.is_empty() => return Ok(outputs),
            Execution::Completed(outputs) => {
                done.extend(outputs.into_channels().into_iter().flatten());
                return Ok(Outputs::single(done));
            }
            Execution::Suspended { wait_till, items } => (wait_till, items),
        };

        let consumed = parked.len();
        let Some(waiting) = parked.pop() else {
            bail!("Gate suspended without a parked item");
        };
        done.extend(parked);

        let trace_id = waiting
            .json
            .get("traceId")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        eprintln!(
            "  {} Waiting for a reviewer on trace {} (until {})",
            "⏸".yellow(),
            trace_id.cyan(),
            wait_till.format("%Y-%m-%d %H:%M UTC")
        );

        let timeout = (wait_till - Utc::now()).to_std().unwrap_or(Duration::ZERO);
        let event = tokio::select! {
            _ = cancel.cancelled() => {
                return Err(GateError::Cancelled { id_key: "traceId", id: trace_id }.into());
            }
            event = server.wait_for(&host.node_id, timeout) => event,
        };

        let Some(event) = event else {
            return Err(GateError::Timeout {
                minutes: spec.timeout_minutes,
                id_key: "traceId",
                id: trace_id,
            }
            .into());
        };
        eprintln!(
            "  {} Callback received: {}",
            "✓".green(),
            event.payload.decision()
        );

        let resumed = Item {
            paired_item: waiting.paired_item,
            ..event.payload.into_item()
        };
        match gate
            .execute_from(std::slice::from_ref(&resumed), first_index + consumed - 1, host)
            .await?
        {
            Execution::Completed(outputs) => {
                done.extend(outputs.into_channels().into_iter().flatten())
            }
            Execution::Suspended { .. } => {
                bail!("Callback for trace {} did not resume the gate", trace_id)
            }
        }

        remaining.drain(..consumed);
        first_index += consumed;
        if remaining.is_empty() {
            return Ok(Outputs::single(done));
        }
    }
}

/// Read the input items. A single object is a batch of one.
pub fn read_items(path: &Path) -> Result<Vec<Item>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read input file: {}", path.display()))?;
    let value: Value = serde_json::from_str(&content)
        .with_context(|| format!("Input is not valid JSON: {}", path.display()))?;

    Ok(match value {
        Value::Array(values) => values.into_iter().map(Item::new).collect(),
        other => vec![Item::new(other)],
    })
}

fn open_audit_log(path: Option<&Path>, execution_id: &str) -> Option<AuditLogger> {
    let logger = match path {
        Some(path) => AuditLogger::with_path(path),
        None => AuditLogger::new(execution_id),
    };
    match logger {
        Ok(logger) => Some(logger),
        Err(e) => {
            tracing::warn!("Decision log disabled: {:#}", e);
            None
        }
    }
}

/// Render outputs as JSON: an array for single-output gates, an object keyed
/// by channel for routed ones.
pub fn outputs_to_json(spec: &GateSpec, outputs: &Outputs) -> Value {
    let to_json = |items: &[Item]| -> Value {
        Value::Array(items.iter().map(|item| item.json.clone()).collect())
    };

    match spec.behavior_mode {
        BehaviorMode::FailOnNonApproval => to_json(outputs.channel(Channel::Approved)),
        BehaviorMode::RouteByDecision => json!({
            "approved": to_json(outputs.channel(Channel::Approved)),
            "declined": to_json(outputs.channel(Channel::Declined)),
            "change_requested": to_json(outputs.channel(Channel::ChangeRequested)),
        }),
    }
}

fn print_outputs(spec: &GateSpec, outputs: &Outputs) -> Result<()> {
    eprintln!("  {} {} item(s) out", "✓".green().bold(), outputs.len());
    let rendered = serde_json::to_string_pretty(&outputs_to_json(spec, outputs))
        .context("Failed to render outputs")?;
    println!("{}", rendered);
    Ok(())
}
