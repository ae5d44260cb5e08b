pub mod types;
pub mod vocabulary;

pub use types::{Classification, Decision};
pub use vocabulary::{classify, Vocabulary};
