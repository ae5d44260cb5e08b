pub mod server;
pub mod types;

pub use server::CallbackServer;
pub use types::{CallbackPayload, ResumeEvent};
