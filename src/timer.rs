//! Build start recording.

use anyhow::Result;

use crate::marker::{MarkerStore, StartMarker};

/// Current wall-clock time in epoch milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Record the build start in every given store.
///
/// A later call overwrites the marker; `end` only sees the most recent one.
pub fn record_start(
    stores: &[&dyn MarkerStore],
    project_name: &str,
    now_ms: i64,
) -> Result<StartMarker> {
    let marker = StartMarker {
        project_name: project_name.to_string(),
        started_at_ms: now_ms,
    };
    for store in stores {
        store.write(project_name, &marker)?;
    }
    tracing::debug!(project = project_name, started_at_ms = now_ms, "start marker recorded");
    Ok(marker)
}
