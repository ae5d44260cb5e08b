//! End-to-end gate runs against a scripted approval service.
//!
//! Each test builds a gate from a config, scripts the service's answers,
//! runs a batch through `Gate::execute` on a virtual clock and checks what
//! came out, how many calls went out, and how long the gate slept.

use approvalgate::config::{parse_gate_str, GateSpec, GateVariant};
use approvalgate::resolver::ManualClock;
use approvalgate::router::{BehaviorMode, Channel};
use approvalgate::service::ScriptedService;
use approvalgate::{Execution, Gate, GateError, HostContext, Item};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn host() -> HostContext {
    HostContext {
        workflow_id: "wf-42".to_string(),
        execution_id: "exec-42".to_string(),
        node_id: "node-approve".to_string(),
        node_name: "Approve payout".to_string(),
        resume_url: Some("http://localhost:5678/webhook-waiting/exec-42".to_string()),
        continue_on_fail: false,
    }
}

/// Build a gate on a fresh virtual clock.
fn setup(spec: GateSpec, service: &Arc<ScriptedService>) -> (Gate, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::default());
    let gate = Gate::new(spec, service.clone()).with_clock(clock.clone());
    (gate, clock)
}

fn completed(execution: Execution) -> approvalgate::router::Outputs {
    match execution {
        Execution::Completed(outputs) => outputs,
        other => panic!("expected a completed execution, got {:?}", other),
    }
}

#[tokio::test]
async fn test_immediate_decision_needs_no_polls() {
    let service = Arc::new(
        ScriptedService::new().with_create(json!({"state": "completed", "traceId": "t1"})),
    );
    let (gate, clock) = setup(GateSpec::new(GateVariant::SuspendResumeV2), &service);

    let outputs = completed(
        gate.execute(&[Item::new(json!({"x": 1}))], &host())
            .await
            .unwrap(),
    );

    let approved = outputs.channel(Channel::Approved);
    assert_eq!(approved.len(), 1);
    assert_eq!(
        approved[0].json,
        json!({"x": 1, "approved": true, "state": "approved", "traceId": "t1"})
    );
    assert_eq!(approved[0].paired_item, Some(0));
    assert_eq!(service.poll_count(), 0);
    assert!(clock.sleeps().is_empty());
}

#[tokio::test]
async fn test_decline_after_polling_aborts_with_review_task_id() {
    let service = Arc::new(
        ScriptedService::new()
            .with_create(json!({"reviewTaskId": "rt-2", "state": "pending"}))
            .with_status(json!({"state": "pending"}))
            .with_status(json!({"state": "declined", "requestedChange": ""})),
    );
    let (gate, _clock) = setup(GateSpec::new(GateVariant::RouteV1), &service);

    let err = gate
        .execute(&[Item::new(json!({"x": 2}))], &host())
        .await
        .unwrap_err();

    assert!(err.to_string().contains("reviewTaskId"));
    assert!(err.to_string().contains("rt-2"));
    match err {
        GateError::Item { index, source } => {
            assert_eq!(index, 0);
            assert!(matches!(*source, GateError::Declined { .. }));
        }
        other => panic!("expected an item error, got {:?}", other),
    }
    assert_eq!(service.poll_count(), 2);
}

#[tokio::test]
async fn test_pending_forever_times_out_after_budget() {
    let service = Arc::new(
        ScriptedService::new()
            .with_create(json!({"reviewTaskId": "rt-3", "state": "pending"}))
            .with_status(json!({"state": "pending"})),
    );
    let spec = GateSpec::new(GateVariant::RouteV1).with_polling(30, 1);
    let (gate, clock) = setup(spec, &service);

    let err = gate
        .execute(&[Item::new(json!({"x": 3}))], &host())
        .await
        .unwrap_err();

    let message = err.to_string();
    assert!(message.contains("1 minutes"), "{}", message);
    assert!(message.contains("rt-3"), "{}", message);
    match err {
        GateError::Item { source, .. } => {
            assert!(matches!(*source, GateError::Timeout { minutes: 1, .. }))
        }
        other => panic!("expected an item error, got {:?}", other),
    }
    assert_eq!(service.poll_count(), 2);
    assert_eq!(
        clock.sleeps(),
        vec![Duration::from_secs(30), Duration::from_secs(30)]
    );
}

#[tokio::test]
async fn test_unlimited_timeout_keeps_polling() {
    let mut service = ScriptedService::new()
        .with_create(json!({"reviewTaskId": "rt-4", "state": "processing"}));
    for _ in 0..50 {
        service = service.with_status(json!({"state": "RequiresIntervention"}));
    }
    let service = Arc::new(service.with_status(json!({"state": "approved"})));
    let spec = GateSpec::new(GateVariant::RouteV1).with_polling(1, 0);
    let (gate, clock) = setup(spec, &service);

    let outputs = completed(
        gate.execute(&[Item::new(json!({}))], &host())
            .await
            .unwrap(),
    );
    assert_eq!(outputs.channel(Channel::Approved).len(), 1);
    assert_eq!(service.poll_count(), 51);
    assert_eq!(clock.slept(), Duration::from_secs(51));
}

#[tokio::test]
async fn test_route_mode_places_every_item_once() {
    let service = Arc::new(
        ScriptedService::new()
            .with_create(json!({"reviewTaskId": "rt-a", "state": "Approved"}))
            .with_create(json!({"reviewTaskId": "rt-b", "state": "REJECTED"}))
            .with_create(json!({"reviewTaskId": "rt-c", "state": "ChangeRequested", "requestedChange": "lower the amount"}))
            .with_create(json!({"reviewTaskId": "rt-d", "state": "escalated"}))
            .with_status(json!({"state": "escalated"})),
    );
    let spec =
        GateSpec::new(GateVariant::RouteV1).with_behavior_mode(BehaviorMode::RouteByDecision);
    let (gate, _clock) = setup(spec, &service);

    let items: Vec<Item> = (0..4).map(|n| Item::new(json!({"n": n}))).collect();
    let outputs = completed(gate.execute(&items, &host()).await.unwrap());

    assert_eq!(outputs.channels().len(), 3);
    assert_eq!(outputs.len(), 4);
    let mut seen: Vec<usize> = outputs
        .channels()
        .iter()
        .flatten()
        .filter_map(|item| item.paired_item)
        .collect();
    seen.sort();
    assert_eq!(seen, vec![0, 1, 2, 3]);

    let approved = outputs.channel(Channel::Approved);
    assert_eq!(approved.len(), 1);
    assert_eq!(approved[0].json["behaviorMode"], json!("route_by_decision"));

    let changes = outputs.channel(Channel::ChangeRequested);
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].json["requestedChange"], json!("lower the amount"));

    // The unrecognized state ends up declined, with the reason attached.
    let declined = outputs.channel(Channel::Declined);
    assert_eq!(declined.len(), 2);
    let errored = declined
        .iter()
        .find(|item| item.json["reviewTaskId"] == json!("rt-d"))
        .unwrap();
    assert_eq!(errored.json["approved"], json!(false));
    assert!(errored.json["error"].as_str().unwrap().contains("escalated"));
}

#[tokio::test]
async fn test_continue_on_fail_emits_error_item() {
    let service = Arc::new(
        ScriptedService::new()
            .with_create(json!({"requestId": "w1", "state": "Denied"}))
            .with_create(json!({"requestId": "w2", "state": "approved"})),
    );
    let (gate, _clock) = setup(GateSpec::new(GateVariant::PollingV1), &service);
    let host = HostContext {
        continue_on_fail: true,
        ..host()
    };

    let items = vec![Item::new(json!({"n": 0})), Item::new(json!({"n": 1}))];
    let outputs = completed(gate.execute(&items, &host).await.unwrap());

    let out = outputs.channel(Channel::Approved);
    assert_eq!(out.len(), 2);
    assert_eq!(out[0].json["approved"], json!(false));
    assert_eq!(out[0].json["state"], json!("error"));
    assert_eq!(out[0].json["requestId"], json!("w1"));
    assert!(out[0].json["error"].as_str().unwrap().contains("w1"));
    assert_eq!(out[1].json["approved"], json!(true));
    assert_eq!(out[1].json["requestId"], json!("w2"));
}

#[tokio::test]
async fn test_resumed_batch_passes_through_without_calls() {
    let service = Arc::new(ScriptedService::new());
    let (gate, _clock) = setup(GateSpec::new(GateVariant::SuspendResumeV2), &service);

    let items = vec![Item::new(
        json!({"approved": false, "state": "declined", "traceId": "t9"}),
    )];
    let outputs = completed(gate.execute(&items, &host()).await.unwrap());

    assert_eq!(outputs.channel(Channel::Approved), items.as_slice());
    assert_eq!(service.call_count(), 0);
}

#[tokio::test]
async fn test_processed_async_skips_suspension() {
    let service = Arc::new(ScriptedService::new().with_create(json!({
        "traceId": "t5",
        "status": "assessed",
        "processedAsync": true
    })));
    let (gate, _clock) = setup(GateSpec::new(GateVariant::SuspendResumeV2), &service);

    let outputs = completed(
        gate.execute(&[Item::new(json!({"x": 5}))], &host())
            .await
            .unwrap(),
    );
    let out = outputs.channel(Channel::Approved);
    assert_eq!(out[0].json["approved"], json!(true));
    assert_eq!(out[0].json["processedAsync"], json!(true));
}

#[tokio::test]
async fn test_cancellation_stops_the_wait() {
    let service = Arc::new(
        ScriptedService::new()
            .with_create(json!({"reviewTaskId": "rt-6", "state": "pending"}))
            .with_status(json!({"state": "pending"})),
    );
    let token = CancellationToken::new();
    token.cancel();
    let (gate, _clock) = setup(GateSpec::new(GateVariant::RouteV1), &service);
    let gate = gate.with_cancellation(token);

    let err = gate
        .execute(&[Item::new(json!({}))], &host())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("rt-6"));
    assert_eq!(service.poll_count(), 0);
}

#[tokio::test]
async fn test_cancel_ends_a_sleep_in_progress() {
    let service = Arc::new(
        ScriptedService::new()
            .with_create(json!({"reviewTaskId": "rt-8", "state": "pending"}))
            .with_status(json!({"state": "pending"})),
    );
    let token = CancellationToken::new();
    // Real tokio sleeps of five minutes each
    let gate = Gate::new(
        GateSpec::new(GateVariant::RouteV1).with_polling(300, 0),
        service.clone(),
    )
    .with_cancellation(token.clone());

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();
    });

    let started = std::time::Instant::now();
    let err = tokio::time::timeout(
        Duration::from_secs(10),
        gate.execute(&[Item::new(json!({}))], &host()),
    )
    .await
    .expect("cancellation should end the wait")
    .unwrap_err();
    canceller.await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(10));
    match err {
        GateError::Item { source, .. } => {
            assert!(matches!(*source, GateError::Cancelled { .. }))
        }
        other => panic!("expected an item error, got {:?}", other),
    }
    assert_eq!(service.poll_count(), 0);
}

#[tokio::test]
async fn test_status_without_state_fails_the_item() {
    let service = Arc::new(
        ScriptedService::new()
            .with_create(json!({"reviewTaskId": "rt-1", "state": "pending"}))
            .with_status(json!({"unexpected": true})),
    );
    let spec = GateSpec::new(GateVariant::RouteV1).with_polling(1, 0);
    let (gate, _clock) = setup(spec, &service);

    let err = gate
        .execute(&[Item::new(json!({}))], &host())
        .await
        .unwrap_err();
    match err {
        GateError::Item { source, .. } => {
            assert!(matches!(*source, GateError::InvalidResponse { .. }))
        }
        other => panic!("expected an item error, got {:?}", other),
    }
    assert_eq!(service.poll_count(), 1);
}

#[tokio::test]
async fn test_processed_async_approves_review_tasks_without_polling() {
    let service = Arc::new(
        ScriptedService::new()
            .with_create(json!({"reviewTaskId": "rt-9", "state": "pending", "processedAsync": true}))
            .with_status(json!({"state": "declined"})),
    );
    let (gate, _clock) = setup(GateSpec::new(GateVariant::RouteV1), &service);

    let outputs = completed(
        gate.execute(&[Item::new(json!({"x": 9}))], &host())
            .await
            .unwrap(),
    );
    let out = outputs.channel(Channel::Approved);
    assert_eq!(out[0].json["approved"], json!(true));
    assert_eq!(out[0].json["reviewTaskId"], json!("rt-9"));
    assert_eq!(service.poll_count(), 0);
}

#[tokio::test]
async fn test_unknown_trace_state_with_review_task_suspends() {
    let service = Arc::new(ScriptedService::new().with_create(json!({
        "traceId": "t1",
        "status": "flagged",
        "reviewTaskId": "rt-1"
    })));
    let (gate, _clock) = setup(GateSpec::new(GateVariant::SuspendResumeV2), &service);

    match gate.execute(&[Item::new(json!({"x": 1}))], &host()).await.unwrap() {
        Execution::Suspended { items, .. } => {
            assert_eq!(items[0].json["traceId"], json!("t1"));
            assert_eq!(items[0].json["reviewTaskId"], json!("rt-1"));
        }
        other => panic!("expected suspension, got {:?}", other),
    }
}

#[tokio::test]
async fn test_request_carries_host_identity() {
    let yaml = r#"
gate: route-v1
description: Payout above the limit
tool_calls: stripe_payout
metadata:
  team: finance
  workflowId: spoofed
"#;
    let service = Arc::new(
        ScriptedService::new().with_create(json!({"id": "rt-7", "state": "approved"})),
    );
    let (gate, _clock) = setup(parse_gate_str(yaml).unwrap(), &service);

    gate.execute(&[Item::new(json!({"amount": 900}))], &host())
        .await
        .unwrap();

    let calls = service.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].method, "POST");
    assert_eq!(calls[0].path, "/api/v1/review-tasks");
    let body = calls[0].body.clone().unwrap();
    assert_eq!(body["functionName"], json!("Approve payout"));
    assert_eq!(body["args"], json!({"amount": 900}));
    assert_eq!(body["sessionId"], json!("exec-42"));
    assert_eq!(body["documentation"], json!("Payout above the limit"));
    assert_eq!(body["toolCalls"], json!(["stripe_payout"]));
    assert_eq!(body["metadata"]["team"], json!("finance"));
    assert_eq!(body["metadata"]["workflowId"], json!("wf-42"));
    assert_eq!(body["metadata"]["itemIndex"], json!(0));
}
