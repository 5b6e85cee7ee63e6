//! Config file structure and the resolved settings built from it.

use crate::search::{SearchSettings, DEFAULT_CONCURRENCY, DEFAULT_TICK_INTERVAL};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Keys accepted at the top level of a config file.
pub const KNOWN_KEYS: &[&str] = &[
    "projects",
    "concurrency",
    "tick_interval_ms",
    "inventory",
    "affinity_path",
];

/// Config file as written. Every field is optional so a project file can
/// override a global one key by key.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfig {
    /// Projects searched when `--project` is not given.
    pub projects: Option<Vec<String>>,
    pub concurrency: Option<usize>,
    pub tick_interval_ms: Option<u64>,
    /// Path to the inventory snapshot (may contain tilde).
    pub inventory: Option<PathBuf>,
    pub affinity_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Config {
    pub projects: Vec<String>,
    pub concurrency: usize,
    #[serde(rename = "tick_interval_ms", serialize_with = "serialize_millis")]
    pub tick_interval: Duration,
    pub inventory: Option<PathBuf>,
    pub affinity_path: Option<PathBuf>,
    /// Files the values came from, global first.
    #[serde(skip)]
    pub sources: Vec<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            projects: Vec::new(),
            concurrency: DEFAULT_CONCURRENCY,
            tick_interval: DEFAULT_TICK_INTERVAL,
            inventory: None,
            affinity_path: None,
            sources: Vec::new(),
        }
    }
}

impl Config {
    pub fn search_settings(&self) -> SearchSettings {
        SearchSettings {
            concurrency: self.concurrency,
            tick_interval: self.tick_interval,
        }
    }

    pub fn has_sources(&self) -> bool {
        !self.sources.is_empty()
    }
}

fn serialize_millis<S: serde::Serializer>(value: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(value.as_millis() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_search_defaults() {
        let config = Config::default();
        assert_eq!(config.search_settings(), SearchSettings::default());
        assert!(!config.has_sources());
    }

    #[test]
    fn test_serializes_interval_as_millis() {
        let config = Config {
            tick_interval: Duration::from_millis(250),
            ..Default::default()
        };
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["tick_interval_ms"], 250);
        assert!(json.get("sources").is_none());
    }
}
