pub mod parser;
pub mod types;

pub use parser::{parse_gate_file, parse_gate_str};
pub use types::{GateSpec, GateVariant};
