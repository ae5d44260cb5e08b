//! The approval gate: one configured step that holds workflow items until a
//! human decides on them.
//!
//! A [`Gate`] pairs a validated [`GateSpec`] with a service transport and a
//! clock. Each call to [`Gate::execute`] takes a batch of items and the host
//! context, and processes the items one after another:
//!
//! 1. build the approval request ([`RequestBuilder`])
//! 2. create it on the service
//! 3. resolve it, by polling or by suspending the execution
//! 4. route the decision onto the output channels ([`OutputRouter`])

pub mod types;

use crate::audit::{AuditLogger, AuditOutcome, LogEntry};
use crate::config::{GateSpec, GateVariant};
use crate::error::{GateError, Result};
use crate::request::RequestBuilder;
use crate::resolver::suspend::{self, SuspendStep};
use crate::resolver::{Clock, PollingResolver, Resolution, TokioClock};
use crate::router::{Channel, OutputRouter, Outputs};
use crate::service::ApprovalService;
use chrono::Utc;
use serde_json::{json, Map};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

pub use types::{Execution, HostContext, Item};

pub struct Gate {
    spec: GateSpec,
    service: Arc<dyn ApprovalService>,
    clock: Arc<dyn Clock>,
    cancel: CancellationToken,
    audit: Option<Arc<Mutex<AuditLogger>>>,
}

impl Gate {
    pub fn new(spec: GateSpec, service: Arc<dyn ApprovalService>) -> Self {
        Self {
            spec,
            service,
            clock: Arc::new(TokioClock),
            cancel: CancellationToken::new(),
            audit: None,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Cancelling `token` ends any wait in progress with `Cancelled`.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn with_audit(mut self, logger: Arc<Mutex<AuditLogger>>) -> Self {
        self.audit = Some(logger);
        self
    }

    pub fn spec(&self) -> &GateSpec {
        &self.spec
    }

    pub fn router(&self) -> OutputRouter {
        let router = OutputRouter::new(self.spec.behavior_mode, self.spec.protocol());
        match self.spec.variant {
            GateVariant::SuspendResumeV2 => router.without_mode_field(),
            _ => router,
        }
    }

    /// Run one batch of items through the gate.
    ///
    /// Without `continue_on_fail` the first failing item aborts the batch
    /// and the error names the item index.
    pub async fn execute(&self, items: &[Item], host: &HostContext) -> Result<Execution> {
        self.execute_from(items, 0, host).await
    }

    /// Like [`Gate::execute`], for a batch whose first item sits at
    /// `first_index` of the original input. Used by hosts that continue a
    /// batch after a suspension.
    pub async fn execute_from(
        &self,
        items: &[Item],
        first_index: usize,
        host: &HostContext,
    ) -> Result<Execution> {
        match self.spec.variant {
            GateVariant::SuspendResumeV2 => {
                self.execute_suspendable(items, first_index, host).await
            }
            GateVariant::PollingV1 | GateVariant::RouteV1 => {
                self.execute_polling(items, first_index, host).await
            }
        }
    }

    async fn execute_polling(
        &self,
        items: &[Item],
        first_index: usize,
        host: &HostContext,
    ) -> Result<Execution> {
        let router = self.router();
        let mut outputs = Outputs::new(router.mode());

        for (index, item) in (first_index..).zip(items) {
            let resolution = match self.create_and_poll(item, index, host).await {
                Ok(resolution) => resolution,
                Err(err) => {
                    self.record(host, index, err.request_id(), AuditOutcome::Failed, 0, Some(&err));
                    let (channel, failed) = self.on_failure(&router, item, index, host, err)?;
                    outputs.push(channel, failed);
                    continue;
                }
            };

            match router.route(item, index, &resolution) {
                Ok((channel, routed)) => {
                    self.record_resolution(host, index, &resolution, None);
                    outputs.push(channel, routed);
                }
                Err(err) => {
                    self.record_resolution(host, index, &resolution, Some(&err));
                    let (channel, failed) = self.on_failure(&router, item, index, host, err)?;
                    outputs.push(channel, failed);
                }
            }
        }

        Ok(Execution::Completed(outputs))
    }

    async fn create_and_poll(
        &self,
        item: &Item,
        index: usize,
        host: &HostContext,
    ) -> Result<Resolution> {
        let protocol = self.spec.protocol();
        let request = RequestBuilder::new(&self.spec.request, host).build(item, index);
        let created = self
            .service
            .post_json(protocol.create_path(), &protocol.request_body(&request))
            .await?;
        let outcome = protocol.parse_created(created)?;
        tracing::info!(
            "Created {} {} for item {}",
            protocol.id_key(),
            outcome.request_id,
            index
        );

        PollingResolver::new(
            self.service.as_ref(),
            self.clock.as_ref(),
            protocol,
            self.spec.poll_policy(),
            &self.cancel,
        )
        .resolve(outcome)
        .await
    }

    async fn execute_suspendable(
        &self,
        items: &[Item],
        first_index: usize,
        host: &HostContext,
    ) -> Result<Execution> {
        if suspend::is_resume(items) {
            tracing::info!(
                "Resuming node {} with {} item(s) from callback",
                host.node_id,
                items.len()
            );
            for (index, item) in (first_index..).zip(items) {
                let trace_id = item.json.get("traceId").and_then(|v| v.as_str());
                self.record(host, index, trace_id, AuditOutcome::Resumed, 0, None);
            }
            return Ok(Execution::Completed(Outputs::single(items.to_vec())));
        }

        if host
            .resume_url
            .as_deref()
            .map_or(true, |url| url.trim().is_empty())
        {
            return Err(GateError::Config(format!(
                "{} needs a resume URL from the host to register its callback",
                GateVariant::SuspendResumeV2
            )));
        }

        let router = self.router();
        let protocol = self.spec.protocol();
        let mut outputs = Outputs::single(Vec::new());

        for (index, item) in (first_index..).zip(items) {
            let step = match self.create_trace(item, index, host).await {
                Ok(step) => step,
                Err(err) => {
                    self.record(host, index, err.request_id(), AuditOutcome::Failed, 0, Some(&err));
                    let (channel, failed) = self.on_failure(&router, item, index, host, err)?;
                    outputs.push(channel, failed);
                    continue;
                }
            };

            match step {
                SuspendStep::Resolved(resolution) => match router.route(item, index, &resolution) {
                    Ok((channel, routed)) => {
                        self.record_resolution(host, index, &resolution, None);
                        outputs.push(channel, routed);
                    }
                    Err(err) => {
                        self.record_resolution(host, index, &resolution, Some(&err));
                        let (channel, failed) = self.on_failure(&router, item, index, host, err)?;
                        outputs.push(channel, failed);
                    }
                },
                SuspendStep::Suspend {
                    request_id,
                    review_task_id,
                } => {
                    let wait_till =
                        suspend::suspend_until(self.clock.now(), self.spec.timeout_minutes)?;
                    tracing::info!(
                        "{} {} needs review (reviewTaskId: {}), suspending node {} until {}",
                        protocol.id_key(),
                        request_id,
                        review_task_id,
                        host.node_id,
                        wait_till
                    );
                    self.record(host, index, Some(request_id.as_str()), AuditOutcome::Suspended, 0, None);

                    let mut fields = Map::new();
                    fields.insert("state".to_string(), json!("pending"));
                    fields.insert(protocol.id_key().to_string(), json!(request_id));
                    fields.insert("reviewTaskId".to_string(), json!(review_task_id));

                    // Items after this one are not submitted on this pass.
                    let mut parked: Vec<Item> = outputs.into_channels().into_iter().flatten().collect();
                    parked.push(item.merged(index, fields));
                    return Ok(Execution::Suspended {
                        wait_till,
                        items: parked,
                    });
                }
            }
        }

        Ok(Execution::Completed(outputs))
    }

    async fn create_trace(&self, item: &Item, index: usize, host: &HostContext) -> Result<SuspendStep> {
        let protocol = self.spec.protocol();
        let request = RequestBuilder::new(&self.spec.request, host).build(item, index);
        let created = self
            .service
            .post_json(protocol.create_path(), &protocol.request_body(&request))
            .await?;
        let outcome = protocol.parse_created(created)?;
        tracing::info!(
            "Created {} {} for item {}",
            protocol.id_key(),
            outcome.request_id,
            index
        );
        suspend::evaluate(protocol, outcome)
    }

    /// Continue-on-fail turns the error into an output item; otherwise the
    /// batch stops here.
    fn on_failure(
        &self,
        router: &OutputRouter,
        item: &Item,
        index: usize,
        host: &HostContext,
        err: GateError,
    ) -> Result<(Channel, Item)> {
        if host.continue_on_fail {
            tracing::warn!("Item {} failed, continuing: {}", index, err);
            Ok(router.route_failure(item, index, &err))
        } else {
            Err(err.for_item(index))
        }
    }

    fn record_resolution(
        &self,
        host: &HostContext,
        index: usize,
        resolution: &Resolution,
        error: Option<&GateError>,
    ) {
        self.record(
            host,
            index,
            Some(resolution.request_id.as_str()),
            AuditOutcome::from_decision(&resolution.decision),
            resolution.attempts,
            error,
        );
    }

    fn record(
        &self,
        host: &HostContext,
        index: usize,
        request_id: Option<&str>,
        outcome: AuditOutcome,
        attempts: u32,
        error: Option<&GateError>,
    ) {
        let Some(ref audit) = self.audit else {
            return;
        };
        let entry = LogEntry {
            timestamp: Utc::now(),
            gate: self.spec.variant,
            workflow_id: host.workflow_id.clone(),
            execution_id: host.execution_id.clone(),
            node_id: host.node_id.clone(),
            item_index: index,
            request_id: request_id.map(str::to_string),
            outcome,
            attempts,
            error: error.map(ToString::to_string),
        };
        let mut logger = audit.lock().unwrap_or_else(|e| e.into_inner());
        if let Err(e) = logger.log(&entry) {
            tracing::warn!("Failed to write decision log: {}", e);
        }
    }
}
