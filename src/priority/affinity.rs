//! On-disk affinity store: which projects past searches were resolved in.
//!
//! Persisted as JSON next to the other compass cache files. A missing or
//! unreadable file is not an error; the store just starts empty.

use super::PrioritySource;
use anyhow::{Context, Result};
use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Weight of a stored term equal to the searched term, relative to a stored
/// term that merely contains (or is contained in) it.
const EXACT_MATCH_WEIGHT: u64 = 2;

/// Default location: `~/.cache/compass/affinity.json`.
pub fn default_path() -> Option<PathBuf> {
    dirs::cache_dir().map(|p| p.join("compass").join("affinity.json"))
}

/// Serialized form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct AffinityData {
    /// term -> target -> resource kind -> hits
    #[serde(default)]
    terms: BTreeMap<String, BTreeMap<String, BTreeMap<String, u64>>>,
    /// target -> networks it owns
    #[serde(default)]
    subnets: BTreeMap<String, Vec<IpNet>>,
}

pub struct AffinityStore {
    path: Option<PathBuf>,
    data: Mutex<AffinityData>,
}

impl AffinityStore {
    /// Store that never touches disk.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            data: Mutex::new(AffinityData::default()),
        }
    }

    /// Load from `path`, starting empty if it does not exist or is corrupt.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let data = load_from(&path);
        Self {
            path: Some(path),
            data: Mutex::new(data),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Replace the networks recorded for `target`.
    pub fn record_subnets(&self, target: &str, subnets: Vec<IpNet>) -> Result<()> {
        let mut data = self.lock();
        if subnets.is_empty() {
            data.subnets.remove(target);
        } else {
            data.subnets.insert(target.to_string(), subnets);
        }
        self.persist(&data)
    }

    fn lock(&self) -> MutexGuard<'_, AffinityData> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, data: &AffinityData) -> Result<()> {
        match &self.path {
            Some(path) => save_to(path, data),
            None => Ok(()),
        }
    }
}

fn normalize(term: &str) -> String {
    term.trim().to_lowercase()
}

impl PrioritySource for AffinityStore {
    fn ordered_targets_for(&self, term: &str) -> Result<Vec<String>> {
        let term = normalize(term);
        if term.is_empty() {
            return Ok(Vec::new());
        }

        let data = self.lock();
        let mut scores: HashMap<&str, u64> = HashMap::new();
        for (stored, targets) in &data.terms {
            let weight = if *stored == term {
                EXACT_MATCH_WEIGHT
            } else if stored.contains(&term) || term.contains(stored.as_str()) {
                1
            } else {
                continue;
            };

            for (target, kinds) in targets {
                let hits: u64 = kinds.values().sum();
                *scores.entry(target.as_str()).or_default() += hits * weight;
            }
        }

        let mut ranked: Vec<(&str, u64)> = scores.into_iter().filter(|(_, s)| *s > 0).collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        Ok(ranked.into_iter().map(|(t, _)| t.to_string()).collect())
    }

    fn targets_owning_cidr_containing(&self, ip: IpAddr) -> Result<Vec<String>> {
        let data = self.lock();
        let mut owners: Vec<(&str, u8)> = data
            .subnets
            .iter()
            .filter_map(|(target, nets)| {
                nets.iter()
                    .filter(|net| net.contains(&ip))
                    .map(IpNet::prefix_len)
                    .max()
                    .map(|prefix| (target.as_str(), prefix))
            })
            .collect();

        owners.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        Ok(owners.into_iter().map(|(t, _)| t.to_string()).collect())
    }

    fn reinforce_affinity(&self, term: &str, target: &str, resource_kind: &str) -> Result<()> {
        let term = normalize(term);
        if term.is_empty() {
            return Ok(());
        }

        let mut data = self.lock();
        *data
            .terms
            .entry(term)
            .or_default()
            .entry(target.to_string())
            .or_default()
            .entry(resource_kind.to_string())
            .or_default() += 1;

        tracing::debug!(project = target, kind = resource_kind, "affinity reinforced");
        self.persist(&data)
    }
}

fn load_from(path: &Path) -> AffinityData {
    if !path.exists() {
        return AffinityData::default();
    }

    match fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str(&content) {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!(path = %path.display(), "failed to parse affinity cache: {}", e);
                AffinityData::default()
            }
        },
        Err(e) => {
            tracing::warn!(path = %path.display(), "failed to read affinity cache: {}", e);
            AffinityData::default()
        }
    }
}

fn save_to(path: &Path, data: &AffinityData) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating cache directory {}", parent.display()))?;
    }

    let content = serde_json::to_string_pretty(data).context("serializing affinity cache")?;
    fs::write(path, content).with_context(|| format!("writing {}", path.display()))
}
