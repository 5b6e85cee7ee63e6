//! Per-invocation search state shared between the coordinator loop and
//! whoever renders it.
//!
//! One mutex guards the whole state so that readers never see a torn
//! "completed vs total" pair. Mutation goes exclusively through
//! [`Session::apply`]; readers take copies via [`Session::snapshot`] or
//! [`Session::progress`] and render without holding the lock.

use super::cancel::CancelToken;
use super::model::{Query, ResourceEntry, Warning};
use super::progress::{Phase, Progress};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Everything accumulated by one session.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    /// Results in arrival order (not yet sorted).
    pub results: Vec<ResourceEntry>,
    pub warnings: Vec<Warning>,
    pub fatal_error: Option<String>,
    pub completed: usize,
    pub total: usize,
    pub current_target: String,
    pub phase: Phase,
    pub cancelled: bool,
}

impl SessionState {
    fn progress(&self) -> Progress {
        Progress {
            phase: self.phase,
            completed: self.completed,
            total: self.total,
            current_target: self.current_target.clone(),
            results_so_far: self.results.len(),
        }
    }
}

/// A single serialized change to [`SessionState`].
#[derive(Debug)]
pub enum SessionUpdate {
    /// A new pass starts over `total` targets.
    BeginPhase { phase: Phase, total: usize },
    /// A target's call returned successfully (possibly with nothing).
    Completed {
        target: String,
        entries: Vec<ResourceEntry>,
    },
    /// A target's call failed.
    Failed(Warning),
    /// The session could not run at all.
    Fatal(String),
}

/// Cloneable handle to one live session.
#[derive(Debug, Clone)]
pub struct Session {
    query: Arc<Query>,
    cancel: CancelToken,
    state: Arc<Mutex<SessionState>>,
}

impl Session {
    pub fn new(query: Query) -> Self {
        Self {
            query: Arc::new(query),
            cancel: CancelToken::new(),
            state: Arc::new(Mutex::new(SessionState::default())),
        }
    }

    /// The query this session runs, kept for affinity reinforcement.
    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Stop admitting new work. Already-admitted calls finish normally.
    pub fn cancel(&self) {
        if self.cancel.cancel() {
            tracing::debug!(term = %self.query.term, "search session cancelled");
        }
        self.lock().cancelled = true;
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Apply one update and return the progress it produced.
    pub fn apply(&self, update: SessionUpdate) -> Progress {
        let mut state = self.lock();
        match update {
            SessionUpdate::BeginPhase { phase, total } => {
                state.phase = phase;
                state.total = total;
                state.completed = 0;
                state.current_target.clear();
            }
            SessionUpdate::Completed { target, entries } => {
                state.results.extend(entries);
                Self::mark_completed(&mut state, target);
            }
            SessionUpdate::Failed(warning) => {
                let target = warning.target.clone();
                state.warnings.push(warning);
                Self::mark_completed(&mut state, target);
            }
            SessionUpdate::Fatal(message) => {
                state.fatal_error = Some(message);
            }
        }
        state.progress()
    }

    fn mark_completed(state: &mut SessionState, target: String) {
        if state.completed < state.total {
            state.completed += 1;
        }
        state.current_target = target;
    }

    pub fn progress(&self) -> Progress {
        self.lock().progress()
    }

    /// Copy of the full state, for rendering or for building the outcome.
    pub fn snapshot(&self) -> SessionState {
        let mut state = self.lock().clone();
        state.cancelled = self.cancel.is_cancelled();
        state
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
