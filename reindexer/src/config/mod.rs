//! Configuration and dependency wiring for the reindexer binary.

mod dependencies;
mod settings;

pub use dependencies::Dependencies;
pub use settings::{LogFormat, Settings};
