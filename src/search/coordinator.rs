//! Bounded fan-out of one query over many targets.
//!
//! A session runs in up to two phases. The preferred phase queries the
//! targets the priority source ranked for this query; if that finds nothing
//! (and the session was not cancelled) the fallback phase scans every other
//! known target. Within a phase each target becomes one job on a rayon pool
//! sized to the concurrency limit, so the pool itself is the admission gate.
//!
//! Workers never touch session state. They send a report back over a
//! channel, and the thread that called [`Coordinator::run`] applies it to the
//! [`Session`] and invokes the consumer callbacks. Callbacks therefore run on
//! a single thread, in worker completion order.

use super::cancel::CancelToken;
use super::executor::TargetExecutor;
use super::model::{finalize_results, Query, ResourceEntry, Warning};
use super::progress::{Phase, Progress, Ticker};
use super::session::{Session, SessionUpdate};
use anyhow::anyhow;
use serde::Serialize;
use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_CONCURRENCY: usize = 8;
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Everything needed to run one session.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub query: Query,
    /// Every known target, in display order.
    pub all_targets: Vec<String>,
    /// Targets to try first. Empty means "no opinion": scan everything.
    pub priority_targets: Vec<String>,
    /// Maximum number of target calls in flight. Zero is treated as one.
    pub concurrency: usize,
    pub tick_interval: Duration,
}

impl SearchRequest {
    pub fn new(query: Query, all_targets: Vec<String>) -> Self {
        Self {
            query,
            all_targets,
            priority_targets: Vec::new(),
            concurrency: DEFAULT_CONCURRENCY,
            tick_interval: DEFAULT_TICK_INTERVAL,
        }
    }

    pub fn with_priority(mut self, priority_targets: Vec<String>) -> Self {
        self.priority_targets = priority_targets;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }

    /// Split targets into the preferred pass and the fallback pass.
    ///
    /// The fallback is the complement of the preferred list, so no target is
    /// queried twice. When `all_targets` is given, preferred targets outside
    /// it are dropped.
    fn phases(&self) -> (Vec<String>, Vec<String>) {
        let all = unique(&self.all_targets);
        let mut priority = unique(&self.priority_targets);
        if !all.is_empty() {
            let allowed: HashSet<&str> = all.iter().map(String::as_str).collect();
            priority.retain(|target| allowed.contains(target.as_str()));
        }
        if priority.is_empty() {
            return (all, Vec::new());
        }

        let tried: HashSet<&str> = priority.iter().map(String::as_str).collect();
        let rest = all
            .iter()
            .filter(|target| !tried.contains(target.as_str()))
            .cloned()
            .collect();
        (priority, rest)
    }
}

fn unique(targets: &[String]) -> Vec<String> {
    let mut seen = HashSet::with_capacity(targets.len());
    targets
        .iter()
        .filter(|target| seen.insert(target.as_str()))
        .cloned()
        .collect()
}

/// Returned by the batch callback to keep going or stop admitting work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchControl {
    Continue,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Completion {
    /// Every dispatched target answered.
    Complete,
    /// Stopped early; results are partial.
    Cancelled,
}

/// Final snapshot of a session.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub query: Query,
    /// Sorted by `(target, kind, name)` and de-duplicated.
    pub results: Vec<ResourceEntry>,
    pub warnings: Vec<Warning>,
    pub completion: Completion,
    /// Progress of the last phase that ran.
    pub progress: Progress,
    pub fallback_used: bool,
    /// Targets that answered, across both phases.
    pub targets_searched: usize,
}

impl SearchOutcome {
    pub fn is_complete(&self) -> bool {
        self.completion == Completion::Complete
    }
}

/// Reasons a session could not run at all. Per-target failures are never
/// reported here; they become [`Warning`]s.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("no targets to search")]
    NoTargets,

    #[error("'{0}' is not a valid IP address")]
    InvalidAddress(String),

    #[error("failed to start worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    #[error("search thread panicked")]
    Panicked,
}

/// Messages from a background session to its consumer.
#[derive(Debug)]
pub enum SearchEvent {
    /// New entries from one target, in completion order.
    Batch {
        entries: Vec<ResourceEntry>,
        progress: Progress,
    },
    /// Periodic progress tick.
    Progress(Progress),
    /// Session finished (completely or after cancellation).
    Complete(SearchOutcome),
    /// Session could not run.
    Failed(SearchError),
}

enum WorkerReport {
    Finished {
        target: String,
        result: anyhow::Result<Vec<ResourceEntry>>,
    },
    Skipped {
        target: String,
    },
}

/// Runs search sessions.
pub struct Coordinator;

impl Coordinator {
    /// Run a session to completion on the calling thread.
    ///
    /// `on_batch` receives each non-empty target result as it arrives and may
    /// return [`BatchControl::Stop`] to cancel the session. `on_progress` is
    /// called at each phase start, on every tick, and at each phase end; it
    /// stops being called once the session is cancelled.
    pub fn run<B, P>(
        request: &SearchRequest,
        executor: Arc<dyn TargetExecutor>,
        session: &Session,
        mut on_batch: B,
        mut on_progress: P,
    ) -> Result<SearchOutcome, SearchError>
    where
        B: FnMut(&[ResourceEntry], &Progress) -> BatchControl,
        P: FnMut(&Progress),
    {
        let (preferred, fallback) = request.phases();
        if preferred.is_empty() {
            session.apply(SessionUpdate::Fatal(SearchError::NoTargets.to_string()));
            return Err(SearchError::NoTargets);
        }

        if request.concurrency == 0 {
            tracing::warn!("concurrency limit of 0 requested, using 1");
        }
        let widest = preferred.len().max(fallback.len());
        let threads = request.concurrency.clamp(1, widest);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("compass-worker-{}", i))
            .build()
            .map_err(|e| {
                session.apply(SessionUpdate::Fatal(e.to_string()));
                SearchError::WorkerPool(e)
            })?;

        tracing::info!(
            term = %request.query.term,
            preferred = preferred.len(),
            fallback = fallback.len(),
            threads,
            "search started"
        );

        let mut ticker = Ticker::new(request.tick_interval);
        let mut phase_run = PhaseRun {
            pool: &pool,
            executor: &executor,
            session,
            ticker: &mut ticker,
            on_batch: &mut on_batch,
            on_progress: &mut on_progress,
        };

        phase_run.run(Phase::Preferred, &preferred);

        let preferred_progress = session.progress();
        let mut searched = preferred_progress.completed;
        let found = preferred_progress.results_so_far;
        let fallback_used = found == 0 && !fallback.is_empty() && !session.is_cancelled();
        if fallback_used {
            tracing::info!(
                targets = fallback.len(),
                "preferred targets found nothing, scanning the rest"
            );
            phase_run.run(Phase::Fallback, &fallback);
            searched += session.progress().completed;
        }

        Ok(Self::finish(session, fallback_used, searched))
    }

    /// Run a session on a background thread, streaming [`SearchEvent`]s.
    pub fn spawn(request: SearchRequest, executor: Arc<dyn TargetExecutor>) -> SearchHandle {
        let session = Session::new(request.query.clone());
        let (tx, rx) = mpsc::channel();
        let worker_session = session.clone();

        thread::spawn(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(|| {
                Self::run(
                    &request,
                    executor,
                    &worker_session,
                    |entries, progress| forward_batch(&tx, entries, progress),
                    |progress| {
                        let _ = tx.send(SearchEvent::Progress(progress.clone()));
                    },
                )
            }));

            let event = match result {
                Ok(Ok(outcome)) => SearchEvent::Complete(outcome),
                Ok(Err(e)) => SearchEvent::Failed(e),
                Err(_) => SearchEvent::Failed(SearchError::Panicked),
            };
            let _ = tx.send(event);
        });

        SearchHandle {
            session,
            events: rx,
        }
    }

    fn finish(session: &Session, fallback_used: bool, targets_searched: usize) -> SearchOutcome {
        let progress = session.progress();
        let state = session.snapshot();
        let completion = if state.cancelled {
            Completion::Cancelled
        } else {
            Completion::Complete
        };

        tracing::info!(
            results = state.results.len(),
            warnings = state.warnings.len(),
            ?completion,
            "search finished"
        );

        SearchOutcome {
            query: session.query().clone(),
            results: finalize_results(state.results),
            warnings: state.warnings,
            completion,
            progress,
            fallback_used,
            targets_searched,
        }
    }
}

/// Consumer gone means nobody wants more results.
fn forward_batch(
    tx: &Sender<SearchEvent>,
    entries: &[ResourceEntry],
    progress: &Progress,
) -> BatchControl {
    let event = SearchEvent::Batch {
        entries: entries.to_vec(),
        progress: progress.clone(),
    };
    match tx.send(event) {
        Ok(()) => BatchControl::Continue,
        Err(_) => BatchControl::Stop,
    }
}

/// Borrowed context for running one phase.
struct PhaseRun<'a, B, P> {
    pool: &'a rayon::ThreadPool,
    executor: &'a Arc<dyn TargetExecutor>,
    session: &'a Session,
    ticker: &'a mut Ticker,
    on_batch: &'a mut B,
    on_progress: &'a mut P,
}

impl<B, P> PhaseRun<'_, B, P>
where
    B: FnMut(&[ResourceEntry], &Progress) -> BatchControl,
    P: FnMut(&Progress),
{
    fn run(&mut self, phase: Phase, targets: &[String]) {
        let progress = self.session.apply(SessionUpdate::BeginPhase {
            phase,
            total: targets.len(),
        });
        (self.on_progress)(&progress);

        let (tx, rx) = mpsc::channel();
        let query = Arc::new(self.session.query().clone());
        for target in targets {
            let tx = tx.clone();
            let executor = Arc::clone(self.executor);
            let cancel = self.session.cancel_token().clone();
            let query = Arc::clone(&query);
            let target = target.clone();
            self.pool.spawn(move || {
                let report = admit(executor.as_ref(), &cancel, target, &query);
                let _ = tx.send(report);
            });
        }
        drop(tx);

        self.collect(&rx, targets.len());

        if !self.session.is_cancelled() {
            (self.on_progress)(&self.session.progress());
        }
    }

    /// Apply reports until every dispatched job has answered.
    fn collect(&mut self, rx: &Receiver<WorkerReport>, dispatched: usize) {
        let mut outstanding = dispatched;
        while outstanding > 0 {
            match rx.recv_timeout(self.ticker.remaining()) {
                Ok(report) => {
                    outstanding -= 1;
                    self.handle(report);
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    tracing::warn!(outstanding, "worker channel closed early");
                    break;
                }
            }

            if self.ticker.fire() && !self.session.is_cancelled() {
                (self.on_progress)(&self.session.progress());
            }
        }
    }

    fn handle(&mut self, report: WorkerReport) {
        match report {
            WorkerReport::Skipped { target } => {
                tracing::debug!(project = %target, "not admitted after cancellation");
            }
            WorkerReport::Finished {
                target,
                result: Ok(mut entries),
            } => {
                tracing::debug!(project = %target, count = entries.len(), "target answered");
                for entry in entries.iter_mut().filter(|e| e.target.is_empty()) {
                    entry.target = target.clone();
                }

                let batch = (!entries.is_empty()).then(|| entries.clone());
                let progress = self
                    .session
                    .apply(SessionUpdate::Completed { target, entries });

                if let Some(batch) = batch {
                    if !self.session.is_cancelled()
                        && (self.on_batch)(&batch, &progress) == BatchControl::Stop
                    {
                        self.session.cancel();
                    }
                }
            }
            WorkerReport::Finished {
                target,
                result: Err(cause),
            } => {
                let kind = self.executor.kind();
                tracing::warn!(project = %target, kind, "target query failed: {:#}", cause);
                self.session
                    .apply(SessionUpdate::Failed(Warning::new(kind, target, cause)));
            }
        }
    }
}

/// Worker body: check the gate, then make the single call.
fn admit(
    executor: &dyn TargetExecutor,
    cancel: &CancelToken,
    target: String,
    query: &Query,
) -> WorkerReport {
    if cancel.is_cancelled() {
        return WorkerReport::Skipped { target };
    }

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        executor.execute(cancel, &target, query)
    }))
    .unwrap_or_else(|_| Err(anyhow!("executor panicked")));

    WorkerReport::Finished { target, result }
}

/// Consumer side of a background session.
#[derive(Debug)]
pub struct SearchHandle {
    session: Session,
    events: Receiver<SearchEvent>,
}

impl SearchHandle {
    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn cancel(&self) {
        self.session.cancel();
    }

    /// Next event if one is ready.
    pub fn try_recv(&self) -> Option<SearchEvent> {
        self.events.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Result<SearchEvent, RecvTimeoutError> {
        self.events.recv_timeout(timeout)
    }

    /// Block until the session ends, discarding intermediate events.
    pub fn wait(self) -> Result<SearchOutcome, SearchError> {
        while let Ok(event) = self.events.recv() {
            match event {
                SearchEvent::Complete(outcome) => return Ok(outcome),
                SearchEvent::Failed(e) => return Err(e),
                SearchEvent::Batch { .. } | SearchEvent::Progress(_) => {}
            }
        }
        Err(SearchError::Panicked)
    }
}
