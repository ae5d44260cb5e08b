//! Output channel types.

use crate::gate::types::Item;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a gate treats anything other than approval.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BehaviorMode {
    /// One output. Non-approval fails the item.
    #[default]
    FailOnNonApproval,
    /// Three outputs: approved, declined, change requested.
    RouteByDecision,
}

impl BehaviorMode {
    pub fn channel_count(&self) -> usize {
        match self {
            BehaviorMode::FailOnNonApproval => 1,
            BehaviorMode::RouteByDecision => 3,
        }
    }

    pub fn from_str_loose(s: &str) -> Option<BehaviorMode> {
        match s.to_lowercase().replace(['-', ' '], "_").trim() {
            "fail_on_non_approval" | "failonnonapproval" | "fail" => {
                Some(BehaviorMode::FailOnNonApproval)
            }
            "route_by_decision" | "routebydecision" | "route" => Some(BehaviorMode::RouteByDecision),
            _ => None,
        }
    }
}

impl fmt::Display for BehaviorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BehaviorMode::FailOnNonApproval => write!(f, "fail_on_non_approval"),
            BehaviorMode::RouteByDecision => write!(f, "route_by_decision"),
        }
    }
}

/// Output channel of a routing gate. A single-output gate only uses
/// `Approved` (index 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Approved,
    Declined,
    ChangeRequested,
}

impl Channel {
    pub fn index(&self) -> usize {
        match self {
            Channel::Approved => 0,
            Channel::Declined => 1,
            Channel::ChangeRequested => 2,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Approved => write!(f, "approved"),
            Channel::Declined => write!(f, "declined"),
            Channel::ChangeRequested => write!(f, "change_requested"),
        }
    }
}

/// Items emitted by one execution, one list per channel.
#[derive(Debug, Clone, PartialEq)]
pub struct Outputs {
    channels: Vec<Vec<Item>>,
}

impl Outputs {
    pub fn new(mode: BehaviorMode) -> Self {
        Self {
            channels: vec![Vec::new(); mode.channel_count()],
        }
    }

    /// A single channel holding `items` as-is.
    pub fn single(items: Vec<Item>) -> Self {
        Self {
            channels: vec![items],
        }
    }

    pub fn push(&mut self, channel: Channel, item: Item) {
        // Single-output gates collapse everything onto channel 0.
        let index = channel.index().min(self.channels.len() - 1);
        self.channels[index].push(item);
    }

    pub fn channel(&self, channel: Channel) -> &[Item] {
        self.channels
            .get(channel.index())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn channels(&self) -> &[Vec<Item>] {
        &self.channels
    }

    /// Total number of items across all channels.
    pub fn len(&self) -> usize {
        self.channels.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_channels(self) -> Vec<Vec<Item>> {
        self.channels
    }
}
