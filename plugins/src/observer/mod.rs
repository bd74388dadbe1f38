//! Execution observers for terminal output and event streams

mod jsonl;
mod text;

pub use jsonl::{JsonlObserver, STDOUT_TARGET};
pub use text::TextObserver;
