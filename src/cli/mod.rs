pub mod check;
pub mod listen;
pub mod log;
pub mod run;
