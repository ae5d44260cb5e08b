//! Gate file parsing against the fixture configs.

use approvalgate::config::{parse_gate_file, GateVariant};
use approvalgate::request::Direction;
use approvalgate::router::BehaviorMode;
use serde_json::json;
use std::path::Path;

fn fixture(name: &str) -> std::path::PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

#[test]
fn test_polling_fixture() {
    let spec = parse_gate_file(&fixture("polling_gate.yaml")).unwrap();
    assert_eq!(spec.variant, GateVariant::PollingV1);
    assert_eq!(spec.behavior_mode, BehaviorMode::FailOnNonApproval);
    assert_eq!(spec.polling_interval_secs, 10);
    assert_eq!(spec.poll_policy().max_attempts(), Some(180));
    assert_eq!(
        spec.request.description.as_deref(),
        Some("Sends the full CRM export to the analytics vendor")
    );
    assert!(!spec.request.register_callback);
}

#[test]
fn test_route_fixture() {
    let spec = parse_gate_file(&fixture("route_gate.yaml")).unwrap();
    assert_eq!(spec.variant, GateVariant::RouteV1);
    assert_eq!(spec.behavior_mode, BehaviorMode::RouteByDecision);
    assert_eq!(spec.request.direction, Direction::Response);
    assert_eq!(spec.request.title.as_deref(), Some("New signup"));
    assert_eq!(
        spec.request.tool_calls,
        vec!["gmail_send", "hubspot_update_contact"]
    );
    // 0 minutes: wait as long as it takes
    assert_eq!(spec.poll_policy().max_attempts(), None);

    let metadata = spec.request.metadata.unwrap().to_map();
    assert_eq!(metadata["team"], json!("onboarding"));
    assert_eq!(metadata["priority"], json!(2));
}

#[test]
fn test_suspend_fixture() {
    let spec = parse_gate_file(&fixture("suspend_gate.yaml")).unwrap();
    assert_eq!(spec.variant, GateVariant::SuspendResumeV2);
    assert_eq!(spec.timeout_minutes, 1440);
    assert_eq!(spec.request.session_id.as_deref(), Some("refunds-daily"));
    assert!(spec.request.register_callback);
    assert!(spec.describe().contains("1440 minutes"));

    let metadata = spec.request.metadata.unwrap().to_map();
    assert_eq!(metadata["region"], json!("eu"));
}

#[test]
fn test_invalid_fixture_names_the_problem() {
    let err = parse_gate_file(&fixture("invalid_gate.yaml")).unwrap_err();
    let chain = format!("{:#}", err);
    assert!(chain.contains("invalid_gate.yaml"), "{}", chain);
    assert!(chain.contains("route_by_decision"), "{}", chain);
}

#[test]
fn test_missing_file() {
    let err = parse_gate_file(&fixture("nope.yaml")).unwrap_err();
    assert!(err.to_string().contains("Failed to read gate file"));
}
