//! Start marker persistence.
//!
//! The `start` and `end` invocations run as separate processes, so the start
//! timestamp has to live outside the process. Stores implement
//! [`MarkerStore`] so the timer and duration logic can run against a real
//! scratch directory, the GitHub Actions env file, or memory in tests.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::config::Config;

/// Env var holding the start time in epoch milliseconds.
pub const START_TIME_MS_VAR: &str = "BUILD_START_TIME_MS";
/// Legacy env var holding the start time in epoch seconds.
pub const START_TIME_VAR: &str = "BUILD_START_TIME";
/// Env var holding the project name recorded at start.
pub const PROJECT_NAME_VAR: &str = "PROJECT_NAME";

/// Project name used when none is given.
pub const DEFAULT_PROJECT_NAME: &str = "unknown";

/// Timestamp written by `start` and consumed by the matching `end`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartMarker {
    pub project_name: String,
    /// Epoch milliseconds.
    pub started_at_ms: i64,
}

/// Key-value persistence for start markers.
///
/// `read` returns `Ok(None)` when nothing was recorded for `key`; errors are
/// reserved for markers that exist but cannot be read or parsed.
pub trait MarkerStore {
    fn write(&self, key: &str, marker: &StartMarker) -> Result<()>;
    fn read(&self, key: &str) -> Result<Option<StartMarker>>;
}

/// Return the first marker found, consulting stores in order.
pub fn read_first(stores: &[&dyn MarkerStore], key: &str) -> Result<Option<StartMarker>> {
    for store in stores {
        if let Some(marker) = store.read(key)? {
            return Ok(Some(marker));
        }
    }
    Ok(None)
}

// =============================================================================
// File store
// =============================================================================

/// One JSON file per key inside a scratch directory.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Marker path for a key. Keys are hashed so any project name maps to a
    /// valid file name.
    pub fn path_for(&self, key: &str) -> PathBuf {
        let digest = format!("{:x}", Sha256::digest(key.as_bytes()));
        self.dir.join(format!("start-{}.json", &digest[..16]))
    }
}

impl MarkerStore for FileStore {
    fn write(&self, key: &str, marker: &StartMarker) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create state directory {}", self.dir.display()))?;
        let path = self.path_for(key);
        let json = serde_json::to_string(marker).context("Failed to serialize start marker")?;
        fs::write(&path, json)
            .with_context(|| format!("Failed to write start marker {}", path.display()))?;
        Ok(())
    }

    fn read(&self, key: &str) -> Result<Option<StartMarker>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read start marker {}", path.display()))?;
        let marker = serde_json::from_str(&content)
            .with_context(|| format!("Corrupt start marker {}", path.display()))?;
        Ok(Some(marker))
    }
}

// =============================================================================
// GitHub Actions env store
// =============================================================================

/// Persists the marker through the `GITHUB_ENV` file.
///
/// Lines appended to `GITHUB_ENV` become environment variables of every later
/// step in the job, so `end` reads them back from its own environment. The
/// variables are job-wide and the last `start` wins, so a marker recorded for
/// another project is not returned. An unnamed `end` ([`DEFAULT_PROJECT_NAME`])
/// takes whatever was recorded.
pub struct GithubEnvStore {
    env_file: Option<PathBuf>,
    start_ms: Option<String>,
    start_secs: Option<String>,
    project_name: Option<String>,
}

impl GithubEnvStore {
    pub fn from_config(config: &Config) -> Self {
        Self {
            env_file: config.github_env.clone(),
            start_ms: config.var(START_TIME_MS_VAR).map(str::to_string),
            start_secs: config.var(START_TIME_VAR).map(str::to_string),
            project_name: config.var(PROJECT_NAME_VAR).map(str::to_string),
        }
    }

    /// Whether a `GITHUB_ENV` file is available for writing.
    pub fn is_writable(&self) -> bool {
        self.env_file.is_some()
    }
}

impl MarkerStore for GithubEnvStore {
    fn write(&self, _key: &str, marker: &StartMarker) -> Result<()> {
        let Some(path) = &self.env_file else {
            bail!("GITHUB_ENV not set; are you running outside GitHub Actions?");
        };
        if marker.project_name.contains(['\n', '\r']) {
            bail!("Project name {:?} spans multiple lines", marker.project_name);
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        let contents = format!(
            "{START_TIME_VAR}={}\n{START_TIME_MS_VAR}={}\n{PROJECT_NAME_VAR}={}\n",
            marker.started_at_ms.div_euclid(1000),
            marker.started_at_ms,
            marker.project_name,
        );
        file.write_all(contents.as_bytes())
            .with_context(|| format!("Failed to append to {}", path.display()))?;
        Ok(())
    }

    fn read(&self, key: &str) -> Result<Option<StartMarker>> {
        if let Some(recorded) = &self.project_name {
            if recorded != key && key != DEFAULT_PROJECT_NAME {
                tracing::debug!(recorded, key, "GITHUB_ENV marker belongs to another project");
                return Ok(None);
            }
        }

        let started_at_ms = if let Some(raw) = &self.start_ms {
            raw.parse::<i64>()
                .with_context(|| format!("{START_TIME_MS_VAR}={raw:?} is not a timestamp"))?
        } else if let Some(raw) = &self.start_secs {
            // Older start steps recorded whole seconds only
            let secs = raw
                .parse::<i64>()
                .with_context(|| format!("{START_TIME_VAR}={raw:?} is not a timestamp"))?;
            secs.saturating_mul(1000)
        } else {
            return Ok(None);
        };

        let project_name = self
            .project_name
            .clone()
            .unwrap_or_else(|| key.to_string());
        Ok(Some(StartMarker {
            project_name,
            started_at_ms,
        }))
    }
}

// =============================================================================
// Memory store
// =============================================================================

/// In-process store, mainly for tests.
#[derive(Default)]
pub struct MemoryStore {
    markers: Mutex<HashMap<String, StartMarker>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MarkerStore for MemoryStore {
    fn write(&self, key: &str, marker: &StartMarker) -> Result<()> {
        let mut markers = self
            .markers
            .lock()
            .map_err(|_| anyhow::anyhow!("marker store lock poisoned"))?;
        markers.insert(key.to_string(), marker.clone());
        Ok(())
    }

    fn read(&self, key: &str) -> Result<Option<StartMarker>> {
        let markers = self
            .markers
            .lock()
            .map_err(|_| anyhow::anyhow!("marker store lock poisoned"))?;
        Ok(markers.get(key).cloned())
    }
}
