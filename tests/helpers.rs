//! Shared test utilities for build-monitor tests.

use async_trait::async_trait;
use build_monitor::config::Config;
use build_monitor::health::{Attempt, Probe};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// Scratch directories standing in for a CI job workspace.
pub struct TestEnv {
    /// Kept alive for the lifetime of the env
    pub _temp_dir: TempDir,
    pub state_dir: PathBuf,
    pub github_env: PathBuf,
    pub github_output: PathBuf,
}

impl TestEnv {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let base = temp_dir.path();
        Self {
            state_dir: base.join("state"),
            github_env: base.join("github_env"),
            github_output: base.join("github_output"),
            _temp_dir: temp_dir,
        }
    }

    /// Config for a step that writes to GITHUB_ENV and GITHUB_OUTPUT.
    pub fn config(&self) -> Config {
        self.config_with(&[])
    }

    pub fn config_with(&self, extra: &[(&str, &str)]) -> Config {
        let mut vars = HashMap::new();
        vars.insert(
            "BUILD_MONITOR_STATE_DIR".to_string(),
            self.state_dir.display().to_string(),
        );
        vars.insert("GITHUB_ENV".to_string(), self.github_env.display().to_string());
        vars.insert(
            "GITHUB_OUTPUT".to_string(),
            self.github_output.display().to_string(),
        );
        for (k, v) in extra {
            vars.insert(k.to_string(), v.to_string());
        }
        Config::from_vars(vars)
    }

    /// Config for a later step: whatever earlier steps appended to
    /// GITHUB_ENV is now part of the environment.
    pub fn next_step_config(&self) -> Config {
        let exported = std::fs::read_to_string(&self.github_env).unwrap_or_default();
        let pairs: Vec<(String, String)> = exported
            .lines()
            .filter_map(|l| l.split_once('='))
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let borrowed: Vec<(&str, &str)> = pairs
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        self.config_with(&borrowed)
    }

    pub fn outputs(&self) -> HashMap<String, String> {
        read_key_values(&self.github_output)
    }

    pub fn root(&self) -> &Path {
        self._temp_dir.path()
    }
}

/// Parse a `key=value` file.
pub fn read_key_values(path: &Path) -> HashMap<String, String> {
    std::fs::read_to_string(path)
        .expect("Failed to read key/value file")
        .lines()
        .filter_map(|l| l.split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Probe that must never be called.
pub struct UnreachableProbe;

#[async_trait]
impl Probe for UnreachableProbe {
    async fn attempt(&self, url: &str) -> Attempt {
        panic!("health check should have been skipped, but {url} was probed");
    }
}

// =============================================================================
// Minimal HTTP responder
// =============================================================================

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    /// Raw request head (request line and headers)
    pub head: String,
    pub body: String,
}

/// Answers every connection with the next scripted status code; the last
/// code repeats once the script runs out.
pub struct TestServer {
    addr: std::net::SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    handle: JoinHandle<()>,
}

impl TestServer {
    pub async fn start(statuses: Vec<u16>) -> Self {
        Self::start_with_delay(statuses, Duration::ZERO).await
    }

    /// Like `start`, but waits `delay` before answering each request.
    pub async fn start_with_delay(statuses: Vec<u16>, delay: Duration) -> Self {
        Self::spawn(statuses, delay, false).await
    }

    /// Announces a body in every response, then hangs up before sending it.
    pub async fn start_truncated(statuses: Vec<u16>) -> Self {
        Self::spawn(statuses, Duration::ZERO, true).await
    }

    async fn spawn(statuses: Vec<u16>, delay: Duration, truncate_body: bool) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test server");
        let addr = listener.local_addr().expect("No local addr");
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&requests);

        let handle = tokio::spawn(async move {
            let mut served = 0usize;
            loop {
                let Ok((mut stream, _)) = listener.accept().await else {
                    break;
                };
                let status = statuses
                    .get(served)
                    .or(statuses.last())
                    .copied()
                    .unwrap_or(200);
                served += 1;

                if let Some(request) = read_request(&mut stream).await {
                    recorded.lock().unwrap().push(request);
                }
                tokio::time::sleep(delay).await;
                let response = if truncate_body {
                    format!(
                        "HTTP/1.1 {} Scripted\r\ncontent-length: 64\r\nconnection: close\r\n\r\npartial",
                        status
                    )
                } else {
                    format!(
                        "HTTP/1.1 {} Scripted\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
                        status
                    )
                };
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });

        Self {
            addr,
            requests,
            handle,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// URL on a port nothing listens on.
pub async fn refused_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind probe port");
    let addr = listener.local_addr().expect("No local addr");
    drop(listener);
    format!("http://{}/health", addr)
}

async fn read_request(stream: &mut TcpStream) -> Option<RecordedRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    let head_end = loop {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).into_owned();
    let mut lines = head.lines();
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let path = request_line.next()?.to_string();
    let content_length = lines
        .filter_map(|l| l.split_once(':'))
        .find(|(k, _)| k.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < head_end + content_length {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let body = String::from_utf8_lossy(&buf[head_end..]).into_owned();

    Some(RecordedRequest {
        method,
        path,
        head,
        body,
    })
}
