//! YAML gate configuration parser.
//!
//! # Example gate file:
//! ```yaml
//! gate: route-v1
//! function_name: Send welcome email
//! description: Email goes to a new customer
//! polling_interval: 10
//! timeout_minutes: 30
//! behavior_mode: route_by_decision
//! tool_calls: gmail_send, hubspot_update_contact
//! metadata:
//!   team: onboarding
//! ```

use crate::config::types::{GateSpec, GateVariant, MAX_TIMEOUT_MINUTES};
use crate::request::builder::{parse_tool_calls, MetadataInput};
use crate::request::types::Direction;
use crate::resolver::PollPolicy;
use crate::router::BehaviorMode;
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;

/// The gate file as written, before validation.
#[derive(Debug, Deserialize)]
struct RawGate {
    gate: String,
    #[serde(default)]
    function_name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    arguments: Option<Value>,
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    direction: Option<String>,
    #[serde(default)]
    tool_calls: Option<StringOrVec>,
    #[serde(default)]
    metadata: Option<MetadataInput>,
    #[serde(default)]
    polling_interval: Option<i64>,
    #[serde(default)]
    timeout_minutes: Option<i64>,
    #[serde(default)]
    behavior_mode: Option<String>,
}

/// `tool_calls: a, b` and `tool_calls: [a, b]` both work.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StringOrVec {
    Single(String),
    Multiple(Vec<String>),
}

impl StringOrVec {
    fn into_vec(self) -> Vec<String> {
        match self {
            StringOrVec::Single(s) => parse_tool_calls(&s),
            StringOrVec::Multiple(v) => v
                .into_iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }
}

/// Parse a gate configuration from a YAML file.
pub fn parse_gate_file(path: &Path) -> Result<GateSpec> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read gate file: {}", path.display()))?;
    parse_gate_str(&content)
        .with_context(|| format!("Failed to parse gate file: {}", path.display()))
}

/// Parse a gate configuration from a YAML string.
pub fn parse_gate_str(yaml: &str) -> Result<GateSpec> {
    let raw: RawGate = serde_yaml::from_str(yaml).context("Invalid YAML syntax in gate file")?;
    convert_raw_gate(raw)
}

fn convert_raw_gate(raw: RawGate) -> Result<GateSpec> {
    let Some(variant) = GateVariant::from_str_loose(&raw.gate) else {
        bail!(
            "Unknown gate '{}'. Valid gates: {}",
            raw.gate,
            GateVariant::ALL
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        );
    };

    let mut spec = GateSpec::new(variant);

    if let Some(ref mode) = raw.behavior_mode {
        let Some(mode) = BehaviorMode::from_str_loose(mode) else {
            bail!(
                "Unknown behavior_mode '{}'. Valid modes: fail_on_non_approval, route_by_decision",
                mode
            );
        };
        if mode == BehaviorMode::RouteByDecision && !variant.supports_routing() {
            bail!(
                "Gate '{}' has a single output; behavior_mode route_by_decision needs route-v1",
                variant
            );
        }
        spec.behavior_mode = mode;
    }

    if let Some(ref direction) = raw.direction {
        spec.request.direction = Direction::from_str_loose(direction).with_context(|| {
            format!(
                "Unknown direction '{}'. Valid directions: inlet, response, signal",
                direction
            )
        })?;
    }

    if let Some(interval) = raw.polling_interval {
        if variant == GateVariant::SuspendResumeV2 {
            tracing::warn!("polling_interval is ignored by {}", variant);
        }
        let clamped = interval.clamp(
            PollPolicy::MIN_INTERVAL_SECS as i64,
            PollPolicy::MAX_INTERVAL_SECS as i64,
        );
        if clamped != interval {
            tracing::warn!(
                "polling_interval {}s is outside 1-300s, using {}s",
                interval,
                clamped
            );
        }
        spec.polling_interval_secs = clamped as u64;
    }

    if let Some(timeout) = raw.timeout_minutes {
        if variant == GateVariant::SuspendResumeV2 && timeout < 1 {
            bail!("timeout_minutes must be at least 1 for {}", variant);
        }
        if timeout > MAX_TIMEOUT_MINUTES {
            bail!(
                "timeout_minutes {} is too large (at most {}, one year)",
                timeout,
                MAX_TIMEOUT_MINUTES
            );
        }
        spec.timeout_minutes = timeout;
    }

    spec.request.function_name = raw.function_name;
    spec.request.description = raw.description;
    spec.request.title = raw.title;
    spec.request.arguments = raw.arguments;
    spec.request.session_id = raw.session_id;
    spec.request.tool_calls = raw.tool_calls.map(StringOrVec::into_vec).unwrap_or_default();
    spec.request.metadata = raw.metadata;

    Ok(spec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_route_gate() {
        let yaml = r#"
gate: route-v1
function_name: Send welcome email
polling_interval: 10
timeout_minutes: 30
behavior_mode: route_by_decision
tool_calls: gmail_send, hubspot_update_contact
direction: signal
metadata:
  team: onboarding
"#;
        let spec = parse_gate_str(yaml).unwrap();
        assert_eq!(spec.variant, GateVariant::RouteV1);
        assert_eq!(spec.behavior_mode, BehaviorMode::RouteByDecision);
        assert_eq!(spec.polling_interval_secs, 10);
        assert_eq!(spec.timeout_minutes, 30);
        assert_eq!(spec.request.direction, Direction::Signal);
        assert_eq!(
            spec.request.tool_calls,
            vec!["gmail_send", "hubspot_update_contact"]
        );
        let metadata = spec.request.metadata.unwrap().to_map();
        assert_eq!(metadata["team"], json!("onboarding"));
    }

    #[test]
    fn test_defaults() {
        let spec = parse_gate_str("gate: polling-v1").unwrap();
        assert_eq!(spec.polling_interval_secs, 5);
        assert_eq!(spec.timeout_minutes, 10);
        assert_eq!(spec.behavior_mode, BehaviorMode::FailOnNonApproval);
        assert!(spec.request.tool_calls.is_empty());
    }

    #[test]
    fn test_interval_is_clamped() {
        let spec = parse_gate_str("gate: route-v1\npolling_interval: 9000").unwrap();
        assert_eq!(spec.polling_interval_secs, 300);
        let spec = parse_gate_str("gate: route-v1\npolling_interval: 0").unwrap();
        assert_eq!(spec.polling_interval_secs, 1);
    }

    #[test]
    fn test_tool_calls_list_form() {
        let spec = parse_gate_str("gate: suspend-resume-v2\ntool_calls: [a, ' b ', '']").unwrap();
        assert_eq!(spec.request.tool_calls, vec!["a", "b"]);
        assert!(spec.request.register_callback);
    }

    #[test]
    fn test_metadata_as_json_text() {
        let spec = parse_gate_str("gate: route-v1\nmetadata: '{\"a\": 1}'").unwrap();
        assert_eq!(spec.request.metadata.unwrap().to_map()["a"], json!(1));
    }

    #[test]
    fn test_routing_rejected_on_single_output_gates() {
        let err = parse_gate_str("gate: polling-v1\nbehavior_mode: route_by_decision").unwrap_err();
        assert!(err.to_string().contains("route-v1"));
        assert!(parse_gate_str("gate: suspend-resume-v2\nbehavior_mode: route").is_err());
    }

    #[test]
    fn test_unknown_values_rejected() {
        assert!(parse_gate_str("gate: v9").is_err());
        assert!(parse_gate_str("gate: route-v1\ndirection: sideways").is_err());
        assert!(parse_gate_str("gate: route-v1\nbehavior_mode: maybe").is_err());
        assert!(parse_gate_str("gate: suspend-resume-v2\ntimeout_minutes: 0").is_err());
    }

    #[test]
    fn test_timeout_upper_bound() {
        let err = parse_gate_str("gate: suspend-resume-v2\ntimeout_minutes: 1000000000000000")
            .unwrap_err();
        assert!(err.to_string().contains("too large"));
        let yaml = format!("gate: route-v1\ntimeout_minutes: {}", i64::MAX);
        assert!(parse_gate_str(&yaml).is_err());

        let yaml = format!("gate: route-v1\ntimeout_minutes: {}", MAX_TIMEOUT_MINUTES);
        assert_eq!(parse_gate_str(&yaml).unwrap().timeout_minutes, MAX_TIMEOUT_MINUTES);
    }
}
