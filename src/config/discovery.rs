//! Finds `compass.yaml` in the working directory or its parents, and the
//! global config at `~/.config/compass/config.yaml`.

use std::path::{Path, PathBuf};

pub const PROJECT_CONFIG_NAME: &str = "compass.yaml";
pub const GLOBAL_CONFIG_NAME: &str = "config.yaml";

#[derive(Debug, Clone, Default)]
pub struct DiscoveryResult {
    /// Directory containing `compass.yaml`.
    pub project_root: Option<PathBuf>,
    pub project_config: Option<PathBuf>,
    pub global_config: Option<PathBuf>,
}

impl DiscoveryResult {
    pub fn has_config(&self) -> bool {
        self.project_config.is_some() || self.global_config.is_some()
    }

    /// The file that wins for single-file commands: project over global.
    pub fn closest(&self) -> Option<&Path> {
        self.project_config
            .as_deref()
            .or(self.global_config.as_deref())
    }
}

pub fn global_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("compass").join(GLOBAL_CONFIG_NAME))
}

/// Discover config files starting from the current working directory.
pub fn discover() -> DiscoveryResult {
    let cwd = match std::env::current_dir() {
        Ok(dir) => dir.canonicalize().unwrap_or(dir),
        Err(_) => return discover_from(None),
    };
    discover_from(Some(&cwd))
}

/// Discover starting at `start` (no project walk when `None`).
pub fn discover_from(start: Option<&Path>) -> DiscoveryResult {
    let mut result = DiscoveryResult {
        global_config: global_config_path().filter(|p| is_file(p)),
        ..Default::default()
    };

    let Some(start) = start else {
        return result;
    };

    for ancestor in start.ancestors() {
        let config_path = ancestor.join(PROJECT_CONFIG_NAME);
        if is_file(&config_path) {
            tracing::debug!(path = %config_path.display(), "found project config");
            result.project_root = Some(ancestor.to_path_buf());
            result.project_config = Some(config_path);
            break;
        }
    }
    result
}

fn is_file(path: &Path) -> bool {
    path.try_exists().unwrap_or(false) && path.is_file()
}
