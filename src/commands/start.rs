//! Start command - records the build start marker.

use anyhow::Result;

use super::effective_project_name;
use crate::config::Config;
use crate::marker::{FileStore, GithubEnvStore, MarkerStore, StartMarker};
use crate::timer;

/// Execute the start command.
///
/// The marker always goes to the state directory, and also to `GITHUB_ENV`
/// when running under GitHub Actions. Failing to persist it is fatal.
pub fn cmd_start(config: &Config, project_name: &str) -> Result<StartMarker> {
    let project = effective_project_name(project_name);
    let file_store = FileStore::new(&config.state_dir);
    let env_store = GithubEnvStore::from_config(config);

    let mut stores: Vec<&dyn MarkerStore> = vec![&file_store];
    if env_store.is_writable() {
        stores.push(&env_store);
    }

    let marker = timer::record_start(&stores, project, timer::now_millis())?;
    println!("Build monitoring started for {}", project);
    Ok(marker)
}
