//! Learned target ordering used to search likely targets first.

pub mod affinity;

pub use affinity::AffinityStore;

use crate::search::{Query, SearchError};
use anyhow::Result;
use std::net::IpAddr;

/// Source of "where is this probably" hints.
///
/// An empty list means the source has no opinion; callers scan every target.
pub trait PrioritySource: Send + Sync {
    /// Targets most likely to hold matches for `term`, best first.
    fn ordered_targets_for(&self, term: &str) -> Result<Vec<String>>;

    /// Targets owning a network that contains `ip`, most specific first.
    fn targets_owning_cidr_containing(&self, ip: IpAddr) -> Result<Vec<String>>;

    /// Called when the user acts on a result, so `target` ranks earlier
    /// next time `term` (or something like it) is searched.
    fn reinforce_affinity(&self, term: &str, target: &str, resource_kind: &str) -> Result<()>;
}

/// How a view turns its query into a phase-1 candidate list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CandidateStrategy {
    /// General resource search: affinity by search term.
    #[default]
    Term,
    /// IP lookup: projects whose subnets contain the address.
    IpAddress,
}

impl CandidateStrategy {
    /// Ask `source` for candidates.
    ///
    /// A failing source is logged and treated as "no opinion". The only hard
    /// error is an IP lookup whose term is not an address.
    pub fn priority_targets(
        &self,
        source: &dyn PrioritySource,
        query: &Query,
    ) -> Result<Vec<String>, SearchError> {
        let lookup = match self {
            CandidateStrategy::Term => source.ordered_targets_for(&query.term),
            CandidateStrategy::IpAddress => {
                let ip = parse_ip(&query.term)?;
                source.targets_owning_cidr_containing(ip)
            }
        };

        Ok(lookup.unwrap_or_else(|e| {
            tracing::warn!(
                term = %query.term,
                "priority lookup failed, scanning all targets: {:#}",
                e
            );
            Vec::new()
        }))
    }
}

pub fn parse_ip(term: &str) -> Result<IpAddr, SearchError> {
    term.trim()
        .parse()
        .map_err(|_| SearchError::InvalidAddress(term.to_string()))
}
