//! Typed gate configuration.

use crate::request::builder::RequestConfig;
use crate::resolver::{PollPolicy, DEFAULT_SUSPEND_MINUTES};
use crate::router::BehaviorMode;
use crate::service::Protocol;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_POLLING_INTERVAL_SECS: u64 = 5;
pub const DEFAULT_POLLING_TIMEOUT_MINUTES: i64 = 10;
/// Upper bound for `timeout_minutes`: one year.
pub const MAX_TIMEOUT_MINUTES: i64 = 366 * 24 * 60;

/// Which generation of the gate to run. Selected explicitly by
/// configuration; each variant pins a protocol and a wait strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GateVariant {
    /// Watches protocol, polling, single output.
    PollingV1,
    /// Review-task protocol, polling, single or three outputs.
    RouteV1,
    /// Trace protocol, suspends until the service calls back.
    SuspendResumeV2,
}

impl GateVariant {
    pub const ALL: [GateVariant; 3] = [
        GateVariant::PollingV1,
        GateVariant::RouteV1,
        GateVariant::SuspendResumeV2,
    ];

    pub fn protocol(&self) -> Protocol {
        match self {
            GateVariant::PollingV1 => Protocol::Watches,
            GateVariant::RouteV1 => Protocol::ReviewTasks,
            GateVariant::SuspendResumeV2 => Protocol::Trace,
        }
    }

    pub fn from_str_loose(s: &str) -> Option<GateVariant> {
        match s.to_lowercase().replace('_', "-").trim() {
            "polling-v1" | "polling" | "watch" | "watches" => Some(GateVariant::PollingV1),
            "route-v1" | "route" | "review-tasks" => Some(GateVariant::RouteV1),
            "suspend-resume-v2" | "suspend-resume" | "suspend" | "trace" | "v2" => {
                Some(GateVariant::SuspendResumeV2)
            }
            _ => None,
        }
    }

    pub fn supports_routing(&self) -> bool {
        matches!(self, GateVariant::RouteV1)
    }
}

impl fmt::Display for GateVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateVariant::PollingV1 => write!(f, "polling-v1"),
            GateVariant::RouteV1 => write!(f, "route-v1"),
            GateVariant::SuspendResumeV2 => write!(f, "suspend-resume-v2"),
        }
    }
}

/// A validated gate instance configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateSpec {
    pub variant: GateVariant,
    pub request: RequestConfig,
    pub behavior_mode: BehaviorMode,
    pub polling_interval_secs: u64,
    /// Polling: wait budget, 0 = unlimited. Suspend/resume: how long the
    /// execution stays parked.
    pub timeout_minutes: i64,
}

impl GateSpec {
    pub fn new(variant: GateVariant) -> Self {
        let timeout_minutes = match variant {
            GateVariant::SuspendResumeV2 => DEFAULT_SUSPEND_MINUTES,
            _ => DEFAULT_POLLING_TIMEOUT_MINUTES,
        };
        Self {
            variant,
            request: RequestConfig {
                register_callback: variant == GateVariant::SuspendResumeV2,
                ..Default::default()
            },
            behavior_mode: BehaviorMode::FailOnNonApproval,
            polling_interval_secs: DEFAULT_POLLING_INTERVAL_SECS,
            timeout_minutes,
        }
    }

    pub fn with_behavior_mode(mut self, mode: BehaviorMode) -> Self {
        self.behavior_mode = mode;
        self
    }

    pub fn with_polling(mut self, interval_secs: u64, timeout_minutes: i64) -> Self {
        self.polling_interval_secs = interval_secs;
        self.timeout_minutes = timeout_minutes;
        self
    }

    pub fn protocol(&self) -> Protocol {
        self.variant.protocol()
    }

    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy::new(self.polling_interval_secs, self.timeout_minutes)
    }

    /// One-line summary for the CLI.
    pub fn describe(&self) -> String {
        match self.variant {
            GateVariant::SuspendResumeV2 => format!(
                "{}: POST {}, suspend up to {} minutes for the callback",
                self.variant,
                self.protocol().create_path(),
                self.timeout_minutes
            ),
            _ => {
                let budget = if self.timeout_minutes > 0 {
                    format!("{} minutes", self.timeout_minutes)
                } else {
                    "unlimited".to_string()
                };
                format!(
                    "{}: POST {}, poll every {}s ({}), {}",
                    self.variant,
                    self.protocol().create_path(),
                    self.poll_policy().interval().as_secs(),
                    budget,
                    self.behavior_mode
                )
            }
        }
    }
}
