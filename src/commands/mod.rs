//! CLI command handlers.
//!
//! - `start` - Record the build start time
//! - `end` - Compute duration, probe health, emit outputs and webhook

pub mod end;
pub mod start;

pub use end::{cmd_end, finish_build, EndOptions, EndServices};
pub use start::cmd_start;

pub use crate::marker::DEFAULT_PROJECT_NAME;

/// Trimmed project name, or the default when blank.
pub fn effective_project_name(raw: &str) -> &str {
    match raw.trim() {
        "" => DEFAULT_PROJECT_NAME,
        name => name,
    }
}
