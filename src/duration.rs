//! Elapsed-time computation and job status classification.

use serde::Serialize;
use std::fmt;

use crate::marker::StartMarker;

/// Elapsed build time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildDuration {
    pub ms: u64,
    /// Whole seconds, truncated.
    pub seconds: u64,
}

impl BuildDuration {
    pub fn from_millis(ms: u64) -> Self {
        Self {
            ms,
            seconds: ms / 1000,
        }
    }
}

/// Time elapsed between the marker and `now_ms`, clamped at zero when the
/// clock went backwards.
pub fn compute_duration(marker: &StartMarker, now_ms: i64) -> BuildDuration {
    let elapsed = now_ms.saturating_sub(marker.started_at_ms).max(0);
    BuildDuration::from_millis(elapsed as u64)
}

/// Normalized job outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Success,
    Failure,
    Cancelled,
    Unknown,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Success => "success",
            JobStatus::Failure => "failure",
            JobStatus::Cancelled => "cancelled",
            JobStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a CI-provided job status. Never fails: anything unrecognized,
/// including an absent or empty value, is `Unknown`.
pub fn classify_job_status(raw: Option<&str>) -> JobStatus {
    let Some(raw) = raw else {
        return JobStatus::Unknown;
    };
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("success") {
        JobStatus::Success
    } else if raw.eq_ignore_ascii_case("failure") {
        JobStatus::Failure
    } else if raw.eq_ignore_ascii_case("cancelled") {
        JobStatus::Cancelled
    } else {
        JobStatus::Unknown
    }
}
