//! CLI-specific functionality
//!
//! Argument parsing, task list loading, and configuration discovery for the
//! `taskwave` binary.

pub mod args;
pub mod config;
pub mod tasks;

pub use args::{Args, Commands, ExecutionMode, RunConfig};
pub use config::{ConfigDiscovery, ConfigError, TaskwaveConfig};
pub use tasks::{FileError, TaskLoader};
