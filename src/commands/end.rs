//! End command - computes build duration, probes health, and reports.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};

use super::effective_project_name;
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::duration::{classify_job_status, compute_duration};
use crate::health::{check_health, parse_wait_budget, HttpProbe, Probe};
use crate::marker::{self, FileStore, GithubEnvStore, MarkerStore};
use crate::report::{build_report, emit_outputs, Report};
use crate::timer;
use crate::webhook::{post_webhook, HttpWebhook, Notifier};

/// Inputs of the end command.
#[derive(Debug, Clone, Default)]
pub struct EndOptions {
    pub project_name: String,
    pub job_status: Option<String>,
    pub webhook_url: Option<String>,
    pub health_check_url: Option<String>,
    /// Raw wait budget; parsed leniently.
    pub health_wait_seconds: Option<String>,
}

/// Collaborators of the end command, substitutable in tests.
pub struct EndServices<'a> {
    /// Consulted in order; the first marker found wins.
    pub stores: Vec<&'a dyn MarkerStore>,
    pub probe: &'a dyn Probe,
    pub notifier: Option<&'a dyn Notifier>,
    pub clock: &'a dyn Clock,
}

/// Execute the end command against real stores and HTTP.
pub async fn cmd_end(config: &Config, options: &EndOptions) -> Result<Report> {
    let env_store = GithubEnvStore::from_config(config);
    let file_store = FileStore::new(&config.state_dir);
    let probe = HttpProbe::new(config.probe_timeout)?;
    let webhook = match non_blank(options.webhook_url.as_deref()) {
        Some(url) => Some(HttpWebhook::new(url, config.webhook_timeout)?),
        None => None,
    };
    let clock = SystemClock::new();

    let services = EndServices {
        stores: vec![&env_store as &dyn MarkerStore, &file_store as &dyn MarkerStore],
        probe: &probe,
        notifier: webhook.as_ref().map(|w| w as &dyn Notifier),
        clock: &clock,
    };
    finish_build(config, options, &services, timer::now_millis()).await
}

/// Finish a build that ended at `ended_at_ms`.
///
/// Only a missing or unreadable start marker and an output write failure are
/// errors. Health-check and webhook problems are reported as data.
pub async fn finish_build(
    config: &Config,
    options: &EndOptions,
    services: &EndServices<'_>,
    ended_at_ms: i64,
) -> Result<Report> {
    let key = effective_project_name(&options.project_name);
    let start = marker::read_first(&services.stores, key)?.ok_or_else(|| {
        anyhow!(
            "No build start recorded for '{}'. Run 'build-monitor start' earlier in this job.",
            key
        )
    })?;

    let duration = compute_duration(&start, ended_at_ms);
    let build_status = classify_job_status(options.job_status.as_deref());
    let project = effective_project_name(&start.project_name);

    let budget = parse_wait_budget(options.health_wait_seconds.as_deref());
    let health = check_health(
        non_blank(options.health_check_url.as_deref()),
        budget,
        services.probe,
        services.clock,
    )
    .await;

    let timestamp = DateTime::<Utc>::from_timestamp_millis(ended_at_ms).unwrap_or_else(Utc::now);
    let report = build_report(project, duration, build_status, health, timestamp)
        .with_ci(config.ci.clone());

    println!(
        "Build completed in {} milliseconds with status: {}",
        report.build_time_ms, report.build_status
    );
    emit_outputs(&report, config.github_output.as_deref())?;

    if let Some(notifier) = services.notifier {
        post_webhook(notifier, &report).await;
    }

    Ok(report)
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
