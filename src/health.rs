//! Post-deploy health probing.
//!
//! With no wait budget the URL is hit once. With a budget the URL is polled
//! at a fixed cadence until it answers 200 or the budget runs out. Failures
//! of individual attempts are data, never errors: whatever happens, probing
//! produces a [`HealthResult`].

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::time::Duration;

use crate::clock::Clock;
use crate::USER_AGENT;

/// Spacing between the starts of consecutive attempts in bounded-retry mode.
pub const RETRY_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Ok,
    Fail,
    Skipped,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Ok => "ok",
            HealthStatus::Fail => "fail",
            HealthStatus::Skipped => "skipped",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// HTTP status observed by the last attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpCode {
    Status(u16),
    /// No response was received. Rendered as `000`.
    NoResponse,
    Skipped,
}

impl fmt::Display for HttpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpCode::Status(code) => write!(f, "{:03}", code),
            HttpCode::NoResponse => f.write_str("000"),
            HttpCode::Skipped => f.write_str("skipped"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Latency {
    Millis(u64),
    Skipped,
}

impl fmt::Display for Latency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Latency::Millis(ms) => write!(f, "{}", ms),
            Latency::Skipped => f.write_str("skipped"),
        }
    }
}

/// Outcome of the whole probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthResult {
    pub status: HealthStatus,
    pub http_code: HttpCode,
    pub latency: Latency,
}

impl HealthResult {
    /// No health check configured.
    pub fn skipped() -> Self {
        Self {
            status: HealthStatus::Skipped,
            http_code: HttpCode::Skipped,
            latency: Latency::Skipped,
        }
    }
}

// =============================================================================
// Attempts
// =============================================================================

/// Result of a single GET.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt {
    /// The server answered with this status code.
    Response(u16),
    /// Connection, DNS, or timeout failure.
    Unreachable(String),
    /// The request could not be built (malformed URL, unsupported scheme).
    Invalid(String),
}

/// Performs one health-check request.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn attempt(&self, url: &str) -> Attempt;
}

/// Probe backed by a reqwest client with a per-request timeout.
pub struct HttpProbe {
    client: reqwest::Client,
}

impl HttpProbe {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Probe for HttpProbe {
    async fn attempt(&self, url: &str) -> Attempt {
        match self.client.get(url).send().await {
            Ok(response) => Attempt::Response(response.status().as_u16()),
            Err(e) if e.is_builder() => Attempt::Invalid(e.to_string()),
            Err(e) => Attempt::Unreachable(e.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
struct Observation {
    attempt: Attempt,
    latency: Duration,
}

impl Observation {
    fn is_healthy(&self) -> bool {
        self.attempt == Attempt::Response(200)
    }

    fn into_result(self) -> HealthResult {
        let latency = Latency::Millis(self.latency.as_millis() as u64);
        match self.attempt {
            Attempt::Response(200) => HealthResult {
                status: HealthStatus::Ok,
                http_code: HttpCode::Status(200),
                latency,
            },
            Attempt::Response(code) => HealthResult {
                status: HealthStatus::Fail,
                http_code: HttpCode::Status(code),
                latency,
            },
            Attempt::Unreachable(_) | Attempt::Invalid(_) => HealthResult {
                status: HealthStatus::Fail,
                http_code: HttpCode::NoResponse,
                latency,
            },
        }
    }
}

async fn observe(url: &str, probe: &dyn Probe, clock: &dyn Clock) -> Observation {
    let started = clock.now();
    let attempt = probe.attempt(url).await;
    let latency = clock.now().saturating_sub(started);
    match &attempt {
        Attempt::Response(code) => {
            tracing::debug!(url, code, latency_ms = latency.as_millis() as u64, "health attempt")
        }
        Attempt::Unreachable(e) => tracing::debug!(url, error = %e, "health attempt got no response"),
        Attempt::Invalid(e) => tracing::warn!(url, error = %e, "health-check URL is unusable"),
    }
    Observation { attempt, latency }
}

// =============================================================================
// Probe loop
// =============================================================================

/// Parse the wait budget input.
///
/// Whole or fractional seconds are accepted and truncated to whole seconds.
/// Anything negative, non-numeric, or empty means no waiting (single-shot),
/// so a misconfigured budget never aborts the run.
pub fn parse_wait_budget(raw: Option<&str>) -> Duration {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Duration::ZERO;
    };
    let secs = match raw.parse::<i64>() {
        Ok(secs) => Some(secs),
        Err(_) => raw
            .parse::<f64>()
            .ok()
            .filter(|secs| secs.is_finite())
            .map(|secs| secs.trunc() as i64),
    };
    match secs {
        Some(secs) if secs >= 0 => Duration::from_secs(secs as u64),
        _ => {
            tracing::warn!("health_wait_seconds={raw:?} is not a non-negative number, using 0");
            Duration::ZERO
        }
    }
}

/// Run the health check.
///
/// - `url == None`: skipped, no request is made.
/// - zero budget: exactly one attempt; ok iff it returns 200.
/// - otherwise: attempts start `RETRY_INTERVAL` apart until one returns 200
///   or the time since the first attempt reaches the budget, in which case
///   the last attempt is reported.
pub async fn check_health(
    url: Option<&str>,
    wait_budget: Duration,
    probe: &dyn Probe,
    clock: &dyn Clock,
) -> HealthResult {
    let Some(url) = url else {
        return HealthResult::skipped();
    };

    if wait_budget.is_zero() {
        return observe(url, probe, clock).await.into_result();
    }

    let deadline = clock.now() + wait_budget;
    let mut attempts = 0u32;
    loop {
        let attempt_started = clock.now();
        let observation = observe(url, probe, clock).await;
        attempts += 1;

        if observation.is_healthy() {
            tracing::info!(url, attempts, "health check passed");
            return observation.into_result();
        }

        let now = clock.now();
        if now >= deadline {
            tracing::warn!(
                url,
                attempts,
                "health check did not return 200 within {}s",
                wait_budget.as_secs()
            );
            return observation.into_result();
        }

        let wake = (attempt_started + RETRY_INTERVAL).min(deadline);
        if wake > now {
            clock.sleep(wake - now).await;
        }
    }
}
