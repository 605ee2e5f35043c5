//! Report assembly and action outputs.

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;

use crate::config::CiContext;
use crate::duration::{BuildDuration, JobStatus};
use crate::health::{HealthResult, HealthStatus};

/// Everything known about one finished build.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub project_name: String,
    pub build_time_ms: u64,
    pub build_time_seconds: u64,
    pub build_status: JobStatus,
    pub health: HealthResult,
    pub timestamp: DateTime<Utc>,
    pub ci: CiContext,
}

/// Assemble a report. Pure: no I/O.
pub fn build_report(
    project_name: &str,
    duration: BuildDuration,
    build_status: JobStatus,
    health: HealthResult,
    timestamp: DateTime<Utc>,
) -> Report {
    Report {
        project_name: project_name.to_string(),
        build_time_ms: duration.ms,
        build_time_seconds: duration.seconds,
        build_status,
        health,
        timestamp,
        ci: CiContext::default(),
    }
}

impl Report {
    pub fn with_ci(mut self, ci: CiContext) -> Self {
        self.ci = ci;
        self
    }

    /// Named outputs in emission order.
    pub fn outputs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("build_time_ms", self.build_time_ms.to_string()),
            ("build_time", self.build_time_seconds.to_string()),
            ("build_status", self.build_status.to_string()),
            ("health_status", self.health.status.to_string()),
            ("health_http_status", self.health.http_code.to_string()),
            ("health_latency_ms", self.health.latency.to_string()),
        ]
    }

    /// JSON body for the webhook.
    pub fn payload(&self) -> WebhookPayload<'_> {
        WebhookPayload {
            project_name: &self.project_name,
            build_time_ms: self.build_time_ms,
            build_time_seconds: self.build_time_seconds,
            build_status: self.build_status,
            health_status: self.health.status,
            health_http_status: self.health.http_code.to_string(),
            health_latency_ms: self.health.latency.to_string(),
            timestamp: self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            repository: self.ci.repository.as_deref(),
            workflow: self.ci.workflow.as_deref(),
            run_id: self.ci.run_id.as_deref(),
            run_number: self.ci.run_number.as_deref(),
            job: self.ci.job.as_deref(),
            sha: self.ci.sha.as_deref(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct WebhookPayload<'a> {
    pub project_name: &'a str,
    pub build_time_ms: u64,
    pub build_time_seconds: u64,
    pub build_status: JobStatus,
    pub health_status: HealthStatus,
    pub health_http_status: String,
    pub health_latency_ms: String,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_number: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha: Option<&'a str>,
}

/// Write outputs as `key=value` lines.
pub fn write_outputs<W: Write>(report: &Report, out: &mut W) -> io::Result<()> {
    for (key, value) in report.outputs() {
        writeln!(out, "{}={}", key, value)?;
    }
    out.flush()
}

/// Emit outputs to the `GITHUB_OUTPUT` file, or stdout when there is none.
///
/// Outputs are the primary contract with the caller, so any failure here is
/// fatal.
pub fn emit_outputs(report: &Report, github_output: Option<&Path>) -> Result<()> {
    match github_output {
        Some(path) => {
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open outputs file {}", path.display()))?;
            write_outputs(report, &mut file)
                .with_context(|| format!("Failed to write outputs to {}", path.display()))
        }
        None => {
            let stdout = io::stdout();
            write_outputs(report, &mut stdout.lock()).context("Failed to write outputs to stdout")
        }
    }
}
