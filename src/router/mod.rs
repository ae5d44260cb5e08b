pub mod engine;
pub mod types;

pub use engine::OutputRouter;
pub use types::{BehaviorMode, Channel, Outputs};
