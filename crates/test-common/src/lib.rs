//! Common test utilities shared across the provision crates.
//!
//! This crate provides a recording fake for the command port, event stream
//! helpers, and configuration fixtures, so workflow and CLI tests don't each
//! build their own.

pub mod config;
pub mod constants;
pub mod events;
pub mod fixtures;
pub mod runner;

// Re-export the most commonly used items for convenience
pub use config::{test_config, test_config_for_chat_server, test_config_with_packages};
pub use constants::*;
pub use events::{
    collect_events, completion, count_events_of_type, output_lines, skipped_steps,
};
pub use fixtures::{ConfigDir, fake_chat_server_root};
pub use runner::RecordingCommandRunner;

// Re-export commonly used external dependencies for convenience
pub use provision::config::AppConfigBuilder;
pub use tempfile::TempDir;
