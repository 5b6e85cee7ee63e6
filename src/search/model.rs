//! Records shared by every provider and the deterministic final ordering.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// What the user asked for. Immutable once a session starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    pub term: String,
    #[serde(default)]
    pub fuzzy: bool,
}

impl Query {
    pub fn new(term: impl Into<String>) -> Self {
        Self {
            term: term.into(),
            fuzzy: false,
        }
    }

    pub fn fuzzy(term: impl Into<String>) -> Self {
        Self {
            term: term.into(),
            fuzzy: true,
        }
    }
}

/// One resource found in one target.
///
/// The coordinator only ever looks at `kind`, `name`, `target` and `location`;
/// `details` and `link` are carried through untouched for the views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceEntry {
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub target: String,
    #[serde(default)]
    pub location: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub details: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

impl ResourceEntry {
    pub fn new(
        kind: impl Into<String>,
        name: impl Into<String>,
        target: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
            target: target.into(),
            location: location.into(),
            details: BTreeMap::new(),
            link: None,
        }
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }

    /// Identity used for ordering and de-duplication.
    pub fn sort_key(&self) -> (&str, &str, &str) {
        (&self.target, &self.kind, &self.name)
    }

    /// The columns a filter expression is evaluated against.
    pub fn filter_values(&self) -> [&str; 4] {
        [&self.kind, &self.name, &self.target, &self.location]
    }
}

/// A single target's query failed. Recorded, never fatal.
#[derive(Debug, Clone)]
pub struct Warning {
    pub provider_kind: String,
    pub target: String,
    pub cause: Arc<anyhow::Error>,
}

impl Warning {
    pub fn new(
        provider_kind: impl Into<String>,
        target: impl Into<String>,
        cause: anyhow::Error,
    ) -> Self {
        Self {
            provider_kind: provider_kind.into(),
            target: target.into(),
            cause: Arc::new(cause),
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} in {}: {:#}", self.provider_kind, self.target, self.cause)
    }
}

/// Sort by `(target, kind, name)` ascending (case-sensitive) and drop
/// duplicates of the same key, keeping the first occurrence.
pub fn finalize_results(mut results: Vec<ResourceEntry>) -> Vec<ResourceEntry> {
    results.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));

    let mut seen: HashSet<(String, String, String)> = HashSet::with_capacity(results.len());
    results.retain(|entry| {
        seen.insert((
            entry.target.clone(),
            entry.kind.clone(),
            entry.name.clone(),
        ))
    });
    results
}
