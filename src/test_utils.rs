use crate::search::{CancelToken, Query, ResourceEntry, TargetExecutor};
use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

/// Mock executor backed by an in-memory table of per-target resources.
///
/// Records every call and the peak number of calls in flight at once.
#[derive(Default)]
pub struct MockExecutor {
    results: HashMap<String, Vec<ResourceEntry>>,
    failures: HashMap<String, String>,
    panics: Vec<String>,
    delay: Duration,
    calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// `target` returns one `instance` entry per name.
    pub fn with_results(mut self, target: &str, names: &[&str]) -> Self {
        let entries = names
            .iter()
            .map(|name| ResourceEntry::new("instance", *name, target, "us-central1"))
            .collect();
        self.results.insert(target.to_string(), entries);
        self
    }

    pub fn failing(mut self, target: &str, message: &str) -> Self {
        self.failures.insert(target.to_string(), message.to_string());
        self
    }

    pub fn panicking(mut self, target: &str) -> Self {
        self.panics.push(target.to_string());
        self
    }

    /// Every call sleeps this long before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

impl TargetExecutor for MockExecutor {
    fn kind(&self) -> &str {
        "mock"
    }

    fn execute(
        &self,
        _cancel: &CancelToken,
        target: &str,
        _query: &Query,
    ) -> Result<Vec<ResourceEntry>> {
        self.calls.lock().unwrap().push(target.to_string());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.panics.iter().any(|t| t == target) {
            panic!("mock executor exploded on {}", target);
        }
        if let Some(message) = self.failures.get(target) {
            return Err(anyhow!("{}", message));
        }
        Ok(self.results.get(target).cloned().unwrap_or_default())
    }
}

pub fn targets(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}
