//! Loads config files and merges them: global first, then the project file
//! overriding it key by key.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::discovery::DiscoveryResult;
use crate::config::error::ConfigError;
use crate::config::types::{Config, RawConfig, KNOWN_KEYS};

/// Expand a leading `~` to the home directory.
pub fn expand_path(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();

    if let Some(rest) = path_str.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    } else if path_str == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }

    path.to_path_buf()
}

/// Tilde-expand `path`, then anchor it at the config file's directory if it
/// is still relative.
fn resolve_path(path: &Path, config_file: &Path) -> PathBuf {
    let expanded = expand_path(path);
    match config_file.parent() {
        Some(dir) if expanded.is_relative() => dir.join(expanded),
        _ => expanded,
    }
}

/// Comment-only or blank documents count as empty config.
fn is_blank_yaml(content: &str) -> bool {
    content
        .lines()
        .map(str::trim)
        .all(|line| line.is_empty() || line.starts_with('#') || line == "---")
}

fn load_file(path: &Path) -> Result<RawConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    if is_blank_yaml(&content) {
        return Ok(RawConfig::default());
    }

    serde_saphyr::from_str(&content)
        .map_err(|e| ConfigError::from_yaml_error(path.to_path_buf(), e, KNOWN_KEYS))
}

/// Validate `raw` and layer it over `config`.
fn apply(config: &mut Config, raw: RawConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(projects) = raw.projects {
        if let Some(blank) = projects.iter().position(|p| p.trim().is_empty()) {
            return Err(ConfigError::Validation {
                path: path.to_path_buf(),
                message: format!("projects[{}] is empty", blank),
            });
        }
        config.projects = projects.into_iter().map(|p| p.trim().to_string()).collect();
    }

    if let Some(concurrency) = raw.concurrency {
        config.concurrency = if concurrency == 0 {
            tracing::warn!(path = %path.display(), "concurrency 0 is not usable, using 1");
            1
        } else {
            concurrency
        };
    }

    if let Some(ms) = raw.tick_interval_ms {
        if ms == 0 {
            return Err(ConfigError::Validation {
                path: path.to_path_buf(),
                message: "tick_interval_ms must be greater than 0".to_string(),
            });
        }
        config.tick_interval = Duration::from_millis(ms);
    }

    if let Some(inventory) = raw.inventory {
        config.inventory = Some(resolve_path(&inventory, path));
    }
    if let Some(affinity) = raw.affinity_path {
        config.affinity_path = Some(resolve_path(&affinity, path));
    }

    config.sources.push(path.to_path_buf());
    Ok(())
}

/// Load one file on top of the defaults (for `config validate`).
pub fn load_single_file(path: &Path) -> Result<Config, ConfigError> {
    let mut config = Config::default();
    apply(&mut config, load_file(path)?, path)?;
    Ok(config)
}

/// Load and merge every discovered file. No files means defaults.
pub fn load(discovery: &DiscoveryResult) -> Result<Config, ConfigError> {
    let mut config = Config::default();

    for path in [&discovery.global_config, &discovery.project_config]
        .into_iter()
        .flatten()
    {
        let raw = load_file(path)?;
        apply(&mut config, raw, path)?;
        tracing::debug!(path = %path.display(), "loaded config");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_expand_path_tilde() {
        let expanded = expand_path(Path::new("~/inv/prod.json"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expanded, home.join("inv/prod.json"));
        } else {
            assert_eq!(expanded, PathBuf::from("~/inv/prod.json"));
        }
    }

    #[test]
    fn test_expand_path_leaves_other_paths() {
        assert_eq!(expand_path(Path::new("/abs/x")), PathBuf::from("/abs/x"));
        assert_eq!(expand_path(Path::new("rel/x")), PathBuf::from("rel/x"));
        assert_eq!(expand_path(Path::new("a~/x")), PathBuf::from("a~/x"));
    }

    #[test]
    fn test_no_files_gives_defaults() {
        let config = load(&DiscoveryResult::default()).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_blank_file_is_empty_config() {
        let temp = TempDir::new().unwrap();
        let path = write(temp.path(), "compass.yaml", "# nothing here\n\n");

        let config = load_single_file(&path).unwrap();
        assert_eq!(config.concurrency, Config::default().concurrency);
        assert_eq!(config.sources, vec![path]);
    }

    #[test]
    fn test_project_overrides_global_per_key() {
        let temp = TempDir::new().unwrap();
        let global = write(
            temp.path(),
            "global.yaml",
            "projects: [g1, g2]\nconcurrency: 4\ntick_interval_ms: 50\n",
        );
        let project = write(temp.path(), "compass.yaml", "concurrency: 16\n");

        let config = load(&DiscoveryResult {
            project_root: Some(temp.path().to_path_buf()),
            project_config: Some(project.clone()),
            global_config: Some(global.clone()),
        })
        .unwrap();

        assert_eq!(config.projects, vec!["g1", "g2"]);
        assert_eq!(config.concurrency, 16);
        assert_eq!(config.tick_interval, Duration::from_millis(50));
        assert_eq!(config.sources, vec![global, project]);
    }

    #[test]
    fn test_zero_concurrency_clamped() {
        let temp = TempDir::new().unwrap();
        let path = write(temp.path(), "compass.yaml", "concurrency: 0\n");

        assert_eq!(load_single_file(&path).unwrap().concurrency, 1);
    }

    #[test]
    fn test_zero_tick_interval_rejected() {
        let temp = TempDir::new().unwrap();
        let path = write(temp.path(), "compass.yaml", "tick_interval_ms: 0\n");

        let err = load_single_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { .. }));
    }

    #[test]
    fn test_blank_project_name_rejected() {
        let temp = TempDir::new().unwrap();
        let path = write(temp.path(), "compass.yaml", "projects: [a, \" \"]\n");

        let err = load_single_file(&path).unwrap_err();
        assert!(err.to_string().contains("projects[1]"));
    }

    #[test]
    fn test_relative_paths_anchor_at_config_dir() {
        let temp = TempDir::new().unwrap();
        let path = write(
            temp.path(),
            "compass.yaml",
            "inventory: data/inventory.json\naffinity_path: /var/cache/affinity.json\n",
        );

        let config = load_single_file(&path).unwrap();
        assert_eq!(
            config.inventory,
            Some(temp.path().join("data/inventory.json"))
        );
        assert_eq!(
            config.affinity_path,
            Some(PathBuf::from("/var/cache/affinity.json"))
        );
    }

    #[test]
    fn test_unknown_key_suggests_known_one() {
        let temp = TempDir::new().unwrap();
        let path = write(temp.path(), "compass.yaml", "concurency: 3\n");

        let err = load_single_file(&path).unwrap_err();
        let display = err.to_string();

        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(display.contains(&path.to_string_lossy().to_string()));
        assert!(display.contains("concurency"));
        assert!(display.contains("did you mean `concurrency`"));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let temp = TempDir::new().unwrap();
        let err = load_single_file(&temp.path().join("absent.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
