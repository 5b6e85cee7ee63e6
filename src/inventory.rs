//! Exported resource inventory and the executors that search it.
//!
//! An inventory is a JSON snapshot of what each project contains:
//!
//! ```json
//! {
//!   "projects": {
//!     "prod-web": {
//!       "resources": [
//!         {"kind": "compute.instance", "name": "web-1", "location": "us-central1-a",
//!          "details": {"networkIP": "10.0.0.2"}}
//!       ],
//!       "subnets": ["10.0.0.0/20"],
//!       "latency_ms": 120
//!     },
//!     "billing": {"unavailable": "permission denied"}
//!   }
//! }
//! ```
//!
//! `latency_ms` and `unavailable` let a snapshot reproduce slow or failing
//! projects when exercising the search views offline.

use crate::priority::parse_ip;
use crate::search::{CancelToken, Query, ResourceEntry, TargetExecutor};
use anyhow::{anyhow, bail, Result};
use frizbee::{match_list, Config};
use ipnet::IpNet;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Granularity at which simulated latency re-checks cancellation.
const CANCEL_POLL: Duration = Duration::from_millis(10);

#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("cannot read inventory {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid inventory {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectInventory {
    #[serde(default)]
    pub resources: Vec<ResourceEntry>,
    #[serde(default)]
    pub subnets: Vec<IpNet>,
    #[serde(default)]
    pub latency_ms: u64,
    /// When set, every call against this project fails with this message.
    #[serde(default)]
    pub unavailable: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Inventory {
    #[serde(default)]
    projects: BTreeMap<String, ProjectInventory>,
}

impl Inventory {
    pub fn load(path: &Path) -> Result<Self, InventoryError> {
        let content = fs::read_to_string(path).map_err(|source| InventoryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content).map_err(|source| InventoryError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        let mut inventory: Inventory = serde_json::from_str(content)?;
        for (name, project) in inventory.projects.iter_mut() {
            for resource in &mut project.resources {
                resource.target = name.clone();
            }
        }
        Ok(inventory)
    }

    pub fn insert(&mut self, name: impl Into<String>, mut project: ProjectInventory) {
        let name = name.into();
        for resource in &mut project.resources {
            resource.target = name.clone();
        }
        self.projects.insert(name, project);
    }

    /// Project names in sorted order.
    pub fn project_names(&self) -> Vec<String> {
        self.projects.keys().cloned().collect()
    }

    pub fn subnets(&self) -> impl Iterator<Item = (&str, &[IpNet])> {
        self.projects
            .iter()
            .map(|(name, project)| (name.as_str(), project.subnets.as_slice()))
    }

    /// Look up a project, applying its simulated latency and failure.
    fn reach(&self, cancel: &CancelToken, target: &str) -> Result<Option<&ProjectInventory>> {
        let project = self
            .projects
            .get(target)
            .ok_or_else(|| anyhow!("project '{}' not found", target))?;

        if !wait_latency(cancel, Duration::from_millis(project.latency_ms)) {
            return Ok(None);
        }
        if let Some(reason) = &project.unavailable {
            bail!("{}", reason);
        }
        Ok(Some(project))
    }
}

/// Sleep for `latency` unless cancelled first. Returns `false` if cancelled.
fn wait_latency(cancel: &CancelToken, latency: Duration) -> bool {
    let deadline = Instant::now() + latency;
    loop {
        if cancel.is_cancelled() {
            return false;
        }
        let left = deadline.saturating_duration_since(Instant::now());
        if left.is_zero() {
            return true;
        }
        thread::sleep(left.min(CANCEL_POLL));
    }
}

/// Case-insensitive ordered-subsequence match (`wb1` matches `web-1`).
fn fuzzy_contains(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    let config = Config {
        prefilter: true,
        max_typos: Some(0),
        sort: false,
        ..Config::default()
    };
    !match_list(needle, &[haystack], &config).is_empty()
}

fn name_matches(name: &str, query: &Query) -> bool {
    let name = name.to_lowercase();
    let term = query.term.trim().to_lowercase();
    if query.fuzzy {
        fuzzy_contains(&name, &term)
    } else {
        name.contains(&term)
    }
}

/// General resource search over an inventory.
pub struct InventoryExecutor {
    inventory: Arc<Inventory>,
}

impl InventoryExecutor {
    pub fn new(inventory: Arc<Inventory>) -> Self {
        Self { inventory }
    }
}

impl TargetExecutor for InventoryExecutor {
    fn kind(&self) -> &str {
        "resources"
    }

    fn execute(
        &self,
        cancel: &CancelToken,
        target: &str,
        query: &Query,
    ) -> Result<Vec<ResourceEntry>> {
        let Some(project) = self.inventory.reach(cancel, target)? else {
            return Ok(Vec::new());
        };

        Ok(project
            .resources
            .iter()
            .filter(|resource| name_matches(&resource.name, query))
            .cloned()
            .collect())
    }
}

/// Finds what an IP address is attached to: resources whose details carry
/// the address, and the subnets that contain it.
pub struct IpAssociationExecutor {
    inventory: Arc<Inventory>,
}

impl IpAssociationExecutor {
    pub fn new(inventory: Arc<Inventory>) -> Self {
        Self { inventory }
    }
}

impl TargetExecutor for IpAssociationExecutor {
    fn kind(&self) -> &str {
        "ip-association"
    }

    fn execute(
        &self,
        cancel: &CancelToken,
        target: &str,
        query: &Query,
    ) -> Result<Vec<ResourceEntry>> {
        let ip = parse_ip(&query.term)?;
        let Some(project) = self.inventory.reach(cancel, target)? else {
            return Ok(Vec::new());
        };

        let wanted = ip.to_string();
        let mut found: Vec<ResourceEntry> = project
            .resources
            .iter()
            .filter_map(|resource| {
                let (field, _) = resource
                    .details
                    .iter()
                    .find(|(_, value)| value.as_str() == wanted)?;
                Some(resource.clone().with_detail("association", field.clone()))
            })
            .collect();

        found.extend(
            project
                .subnets
                .iter()
                .filter(|subnet| subnet.contains(&ip))
                .map(|subnet| {
                    ResourceEntry::new("network.subnet", subnet.to_string(), target, "")
                        .with_detail("association", "contains")
                }),
        );
        Ok(found)
    }
}
