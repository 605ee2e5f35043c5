//! Configuration management for build-monitor.
//!
//! Reads configuration from a .env file and environment variables.
//! Environment variables take precedence over the .env file.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Default per-attempt timeout for health-check requests.
pub const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 5;

/// Default timeout for the webhook POST.
pub const DEFAULT_WEBHOOK_TIMEOUT_SECS: u64 = 10;

/// CI run metadata forwarded in the webhook payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CiContext {
    pub repository: Option<String>,
    pub workflow: Option<String>,
    pub run_id: Option<String>,
    pub run_number: Option<String>,
    pub job: Option<String>,
    pub sha: Option<String>,
}

/// Build-monitor configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Scratch directory holding start markers.
    pub state_dir: PathBuf,
    /// `GITHUB_ENV` file, when running inside GitHub Actions.
    pub github_env: Option<PathBuf>,
    /// `GITHUB_OUTPUT` file, when running inside GitHub Actions.
    pub github_output: Option<PathBuf>,
    /// Timeout applied to each health-check attempt.
    pub probe_timeout: Duration,
    /// Timeout applied to the webhook POST.
    pub webhook_timeout: Duration,
    pub ci: CiContext,
    /// Snapshot of the variables this config was built from.
    vars: HashMap<String, String>,
}

impl Config {
    /// Load configuration from .env and the process environment.
    pub fn load() -> Self {
        // .env values never override variables already set
        dotenvy::dotenv().ok();
        Self::from_vars(std::env::vars().collect())
    }

    /// Build configuration from an explicit variable map.
    pub fn from_vars(vars: HashMap<String, String>) -> Self {
        let get = |key: &str| non_empty(vars.get(key));

        let state_dir = get("BUILD_MONITOR_STATE_DIR")
            .map(PathBuf::from)
            .or_else(|| get("RUNNER_TEMP").map(|dir| PathBuf::from(dir).join("build-monitor")))
            .or_else(|| dirs::cache_dir().map(|dir| dir.join("build-monitor")))
            .unwrap_or_else(|| std::env::temp_dir().join("build-monitor"));

        let probe_timeout = timeout_secs(
            get("BUILD_MONITOR_PROBE_TIMEOUT_SECS"),
            "BUILD_MONITOR_PROBE_TIMEOUT_SECS",
            DEFAULT_PROBE_TIMEOUT_SECS,
        );
        let webhook_timeout = timeout_secs(
            get("BUILD_MONITOR_WEBHOOK_TIMEOUT_SECS"),
            "BUILD_MONITOR_WEBHOOK_TIMEOUT_SECS",
            DEFAULT_WEBHOOK_TIMEOUT_SECS,
        );

        let ci = CiContext {
            repository: get("GITHUB_REPOSITORY"),
            workflow: get("GITHUB_WORKFLOW"),
            run_id: get("GITHUB_RUN_ID"),
            run_number: get("GITHUB_RUN_NUMBER"),
            job: get("GITHUB_JOB"),
            sha: get("GITHUB_SHA"),
        };

        Self {
            state_dir,
            github_env: get("GITHUB_ENV").map(PathBuf::from),
            github_output: get("GITHUB_OUTPUT").map(PathBuf::from),
            probe_timeout,
            webhook_timeout,
            ci,
            vars,
        }
    }

    /// Look up a variable from the snapshot this config was built from.
    pub fn var(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn timeout_secs(raw: Option<String>, name: &str, default: u64) -> Duration {
    let Some(raw) = raw else {
        return Duration::from_secs(default);
    };
    match raw.parse::<u64>() {
        Ok(secs) if secs > 0 => Duration::from_secs(secs),
        _ => {
            tracing::warn!("{name}={raw:?} is not a positive integer, using {default}s");
            Duration::from_secs(default)
        }
    }
}
