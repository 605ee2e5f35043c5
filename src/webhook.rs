//! Best-effort webhook delivery.
//!
//! The build's outcome never depends on the webhook: every failure is
//! turned into a [`WebhookOutcome`] and logged.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::time::Duration;

use crate::report::Report;
use crate::USER_AGENT;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// 2xx response.
    Delivered(u16),
    /// Any other response code.
    Rejected(u16),
    /// No response: connection error, timeout, bad URL.
    Failed(String),
}

/// Sends a finished report somewhere.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, report: &Report) -> WebhookOutcome;
}

/// POSTs the report as JSON.
pub struct HttpWebhook {
    client: reqwest::Client,
    url: String,
}

impl HttpWebhook {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl Notifier for HttpWebhook {
    async fn send(&self, report: &Report) -> WebhookOutcome {
        let response = match self
            .client
            .post(&self.url)
            .json(&report.payload())
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return WebhookOutcome::Failed(e.to_string()),
        };

        let status = response.status();
        // Drain the body so the connection closes cleanly
        if let Err(e) = response.bytes().await {
            tracing::debug!(code = status.as_u16(), error = %e, "failed to read webhook response body");
        }
        if status.is_success() {
            WebhookOutcome::Delivered(status.as_u16())
        } else {
            WebhookOutcome::Rejected(status.as_u16())
        }
    }
}

/// Deliver the report and log the outcome. Never fails.
pub async fn post_webhook(notifier: &dyn Notifier, report: &Report) -> WebhookOutcome {
    let outcome = notifier.send(report).await;
    match &outcome {
        WebhookOutcome::Delivered(code) => tracing::info!(code, "webhook delivered"),
        WebhookOutcome::Rejected(code) => tracing::warn!(code, "webhook POST rejected"),
        WebhookOutcome::Failed(e) => tracing::warn!(error = %e, "webhook POST failed"),
    }
    outcome
}
