//! Approvalgate: human-in-the-loop approval gate for workflow automation.
//!
//! This library exposes the gate and its parts for hosts and integration
//! tests. The binary entrypoint is in `main.rs`.

pub mod audit;
pub mod callback;
pub mod cli;
pub mod config;
pub mod decision;
pub mod error;
pub mod gate;
pub mod request;
pub mod resolver;
pub mod router;
pub mod service;

pub use error::{GateError, Result};
pub use gate::{Execution, Gate, HostContext, Item};
