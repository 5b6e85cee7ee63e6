//! Progress values and liveness helpers for rendering a running search.

use serde::Serialize;
use std::time::{Duration, Instant};

/// Which pass over the targets a session is in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Targets the priority source believes most likely to match.
    #[default]
    Preferred,
    /// Exhaustive scan of the remaining targets.
    Fallback,
}

/// Snapshot of how far a session has got.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub phase: Phase,
    /// Targets whose call returned during the current phase.
    pub completed: usize,
    /// Targets dispatched in the current phase.
    pub total: usize,
    /// Target whose call returned most recently.
    pub current_target: String,
    pub results_so_far: usize,
}

impl Progress {
    pub fn is_phase_done(&self) -> bool {
        self.completed >= self.total
    }
}

/// Fixed-interval schedule for progress emission.
///
/// The session loop asks for the time left until the next tick, waits for
/// worker reports at most that long, then checks `fire`. No thread is spawned,
/// so the ticker stops the moment the loop exits.
#[derive(Debug)]
pub struct Ticker {
    interval: Duration,
    next: Instant,
}

impl Ticker {
    pub fn new(interval: Duration) -> Self {
        let interval = interval.max(Duration::from_millis(1));
        Self {
            interval,
            next: Instant::now() + interval,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Time until the next tick is due (zero if overdue).
    pub fn remaining(&self) -> Duration {
        self.next.saturating_duration_since(Instant::now())
    }

    /// Returns `true` once per elapsed interval and re-arms the ticker.
    pub fn fire(&mut self) -> bool {
        let now = Instant::now();
        if now < self.next {
            return false;
        }
        // Skip missed ticks rather than bursting to catch up.
        while self.next <= now {
            self.next += self.interval;
        }
        true
    }
}

const SPINNER_FRAMES: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// Cycling spinner glyph. Each `tick` renews it by one frame.
#[derive(Debug, Clone, Default)]
pub struct Spinner {
    frame: usize,
}

impl Spinner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tick(&mut self) -> &'static str {
        self.frame = (self.frame + 1) % SPINNER_FRAMES.len();
        SPINNER_FRAMES[self.frame]
    }

    pub fn current(&self) -> &'static str {
        SPINNER_FRAMES[self.frame]
    }
}
