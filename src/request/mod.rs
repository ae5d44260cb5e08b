pub mod builder;
pub mod types;

pub use builder::{RequestBuilder, RequestConfig};
pub use types::{ApprovalOutcome, ApprovalRequest, Direction};
