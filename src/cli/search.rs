//! `search` and `lookup-ip`: one session per invocation, driven from the
//! main thread so Ctrl+C can cancel it and partial results still print.

use super::render::{self, ProgressLine};
use super::{LookupIpArgs, SearchArgs, SearchOptions};
use crate::signal::Interrupt;
use anyhow::{anyhow, Context, Result};
use colored::Colorize;
use compass::config::Config;
use compass::filter::FilterExpr;
use compass::inventory::{Inventory, InventoryExecutor, IpAssociationExecutor};
use compass::priority::{affinity, AffinityStore, CandidateStrategy, PrioritySource};
use compass::search::{
    plan_request, Query, ResourceEntry, SearchError, SearchEvent, SearchOutcome, SearchRequest,
    SearchSlot, TargetExecutor,
};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// How often the main loop checks for events and interrupts.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lookup {
    Resources,
    IpAssociation,
}

impl Lookup {
    fn strategy(self) -> CandidateStrategy {
        match self {
            Lookup::Resources => CandidateStrategy::Term,
            Lookup::IpAssociation => CandidateStrategy::IpAddress,
        }
    }

    fn executor(self, inventory: Arc<Inventory>) -> Arc<dyn TargetExecutor> {
        match self {
            Lookup::Resources => Arc::new(InventoryExecutor::new(inventory)),
            Lookup::IpAssociation => Arc::new(IpAssociationExecutor::new(inventory)),
        }
    }
}

pub fn search(args: SearchArgs, config: &Config, interrupt: &Interrupt) -> Result<(), i32> {
    let query = if args.fuzzy {
        Query::fuzzy(args.term)
    } else {
        Query::new(args.term)
    };
    report(run(query, Lookup::Resources, &args.options, config, interrupt))
}

pub fn lookup_ip(args: LookupIpArgs, config: &Config, interrupt: &Interrupt) -> Result<(), i32> {
    report(run(
        Query::new(args.ip),
        Lookup::IpAssociation,
        &args.options,
        config,
        interrupt,
    ))
}

fn report(result: Result<()>) -> Result<(), i32> {
    result.map_err(|e| {
        eprintln!("{} {:#}", "error:".red().bold(), e);
        1
    })
}

fn run(
    query: Query,
    lookup: Lookup,
    options: &SearchOptions,
    config: &Config,
    interrupt: &Interrupt,
) -> Result<()> {
    let inventory = open_inventory(options, config)?;
    let store = open_store(config);
    if lookup == Lookup::IpAssociation {
        remember_subnets(&store, &inventory);
    }

    let mut settings = config.search_settings();
    if let Some(concurrency) = options.concurrency {
        settings.concurrency = concurrency;
    }
    let targets = target_list(&options.projects, &config.projects, &inventory);
    let request = plan_request(query, targets, &store, lookup.strategy(), &settings)?;

    let outcome = execute(
        request,
        lookup.executor(Arc::clone(&inventory)),
        interrupt,
        !options.json,
    )?;

    let filter = FilterExpr::parse(options.filter.as_deref().unwrap_or_default());
    let shown: Vec<ResourceEntry> = outcome
        .results
        .iter()
        .filter(|entry| filter.matches(&entry.filter_values()))
        .cloned()
        .collect();

    if options.json {
        println!("{}", render::json(&outcome, &shown)?);
    } else if !shown.is_empty() {
        print!("{}", render::table(&shown));
    }
    for line in render::summary(&outcome, shown.len()) {
        eprintln!("{}", line);
    }

    if let Some(n) = options.select {
        let entry = select(&store, &outcome.query, &shown, n)?;
        eprintln!(
            "{} {} {} in {}",
            "selected".green(),
            entry.kind,
            entry.name.bold(),
            entry.target
        );
    }
    Ok(())
}

fn open_inventory(options: &SearchOptions, config: &Config) -> Result<Arc<Inventory>> {
    let path = options
        .inventory
        .as_ref()
        .or(config.inventory.as_ref())
        .ok_or_else(|| {
            anyhow!("no inventory configured (set `inventory` in compass.yaml or pass --inventory)")
        })?;
    let inventory = Inventory::load(path)?;
    Ok(Arc::new(inventory))
}

/// Persistent store when a location is known, otherwise an in-memory one.
fn open_store(config: &Config) -> AffinityStore {
    match config.affinity_path.clone().or_else(affinity::default_path) {
        Some(path) => AffinityStore::open(path),
        None => {
            tracing::warn!("no cache directory, affinity will not be remembered");
            AffinityStore::in_memory()
        }
    }
}

/// Refresh the subnet ownership the IP lookup ranks projects by.
fn remember_subnets(store: &AffinityStore, inventory: &Inventory) {
    for (project, subnets) in inventory.subnets() {
        if let Err(e) = store.record_subnets(project, subnets.to_vec()) {
            tracing::warn!(project, "failed to record subnets: {:#}", e);
        }
    }
}

/// Explicit projects win, then configured ones, then the whole inventory.
fn target_list(requested: &[String], configured: &[String], inventory: &Inventory) -> Vec<String> {
    if !requested.is_empty() {
        requested.to_vec()
    } else if !configured.is_empty() {
        configured.to_vec()
    } else {
        inventory.project_names()
    }
}

fn execute(
    request: SearchRequest,
    executor: Arc<dyn TargetExecutor>,
    interrupt: &Interrupt,
    show_progress: bool,
) -> Result<SearchOutcome> {
    let mut slot = SearchSlot::new();
    slot.start(request, executor);

    let mut progress = ProgressLine::new(show_progress);
    let outcome = pump(&mut slot, interrupt, &mut progress);
    progress.clear();
    Ok(outcome?)
}

/// Drive the session until its final event, cancelling on interrupt.
fn pump(
    slot: &mut SearchSlot,
    interrupt: &Interrupt,
    progress: &mut ProgressLine,
) -> Result<SearchOutcome, SearchError> {
    let mut interrupted = false;
    loop {
        if !interrupted && interrupt.is_raised() {
            interrupted = true;
            tracing::info!("interrupted, stopping search");
            slot.cancel();
        }

        for event in slot.drain() {
            match event {
                SearchEvent::Progress(p) | SearchEvent::Batch { progress: p, .. } => {
                    progress.update(&p)
                }
                SearchEvent::Complete(outcome) => return Ok(outcome),
                SearchEvent::Failed(e) => return Err(e),
            }
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Reinforce the affinity of the `n`-th shown result (1-based).
fn select<'a>(
    store: &AffinityStore,
    query: &Query,
    shown: &'a [ResourceEntry],
    n: usize,
) -> Result<&'a ResourceEntry> {
    let entry = n
        .checked_sub(1)
        .and_then(|i| shown.get(i))
        .ok_or_else(|| anyhow!("--select {} is out of range (1..={})", n, shown.len()))?;
    store
        .reinforce_affinity(&query.term, &entry.target, &entry.kind)
        .context("failed to remember selection")?;
    Ok(entry)
}
