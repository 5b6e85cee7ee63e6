use super::coordinator::{
    Coordinator, SearchError, SearchEvent, SearchHandle, SearchRequest, DEFAULT_CONCURRENCY,
    DEFAULT_TICK_INTERVAL,
};
use super::executor::TargetExecutor;
use super::model::Query;
use crate::priority::{CandidateStrategy, PrioritySource};
use std::sync::Arc;
use std::time::Duration;

/// Tunables shared by every session a view starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchSettings {
    pub concurrency: usize,
    pub tick_interval: Duration,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            tick_interval: DEFAULT_TICK_INTERVAL,
        }
    }
}

/// Build a request, asking `source` which targets to try first.
pub fn plan_request(
    query: Query,
    all_targets: Vec<String>,
    source: &dyn PrioritySource,
    strategy: CandidateStrategy,
    settings: &SearchSettings,
) -> Result<SearchRequest, SearchError> {
    let priority = strategy.priority_targets(source, &query)?;
    tracing::debug!(
        term = %query.term,
        ?strategy,
        preferred = priority.len(),
        "planned search"
    );

    Ok(SearchRequest::new(query, all_targets)
        .with_priority(priority)
        .with_concurrency(settings.concurrency)
        .with_tick_interval(settings.tick_interval))
}

/// Holds the one live session of a consumer (a view).
///
/// Starting a new search cancels and discards the previous one before the new
/// one is launched, so two sessions never feed the same consumer.
#[derive(Debug, Default)]
pub struct SearchSlot {
    live: Option<SearchHandle>,
}

impl SearchSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(
        &mut self,
        request: SearchRequest,
        executor: Arc<dyn TargetExecutor>,
    ) -> &SearchHandle {
        if let Some(previous) = self.live.take() {
            previous.cancel();
            tracing::debug!(term = %previous.session().query().term, "superseded search");
        }
        self.live.insert(Coordinator::spawn(request, executor))
    }

    /// Signal cancellation. The handle stays so its final (partial) outcome
    /// can still be drained.
    pub fn cancel(&self) {
        if let Some(handle) = &self.live {
            handle.cancel();
        }
    }

    pub fn live(&self) -> Option<&SearchHandle> {
        self.live.as_ref()
    }

    pub fn is_running(&self) -> bool {
        self.live.is_some()
    }

    /// Collect every ready event without blocking. Once the session's final
    /// event has been drained the slot becomes empty.
    pub fn drain(&mut self) -> Vec<SearchEvent> {
        let Some(handle) = &self.live else {
            return Vec::new();
        };

        let mut events = Vec::new();
        let mut finished = false;
        while let Some(event) = handle.try_recv() {
            finished = matches!(event, SearchEvent::Complete(_) | SearchEvent::Failed(_));
            events.push(event);
            if finished {
                break;
            }
        }

        if finished {
            self.live = None;
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::priority::AffinityStore;
    use crate::search::Completion;
    use crate::test_utils::{targets, MockExecutor};
    use std::thread;
    use std::time::Instant;

    /// Pump `slot` until its session ends.
    fn drain_until_done(slot: &mut SearchSlot) -> Vec<SearchEvent> {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut events = Vec::new();
        while slot.is_running() {
            assert!(Instant::now() < deadline, "search did not finish");
            events.extend(slot.drain());
            thread::sleep(Duration::from_millis(2));
        }
        events
    }

    #[test]
    fn test_plan_uses_affinity_for_priority() {
        let store = AffinityStore::in_memory();
        store.reinforce_affinity("web", "proj-b", "instance").unwrap();

        let request = plan_request(
            Query::new("web"),
            targets(&["proj-a", "proj-b"]),
            &store,
            CandidateStrategy::Term,
            &SearchSettings {
                concurrency: 3,
                tick_interval: Duration::from_millis(50),
            },
        )
        .unwrap();

        assert_eq!(request.priority_targets, vec!["proj-b"]);
        assert_eq!(request.concurrency, 3);
        assert_eq!(request.tick_interval, Duration::from_millis(50));
    }

    #[test]
    fn test_remembered_project_outside_request_is_not_searched() {
        let store = AffinityStore::in_memory();
        store.reinforce_affinity("web", "alpha", "instance").unwrap();
        let executor = Arc::new(
            MockExecutor::new()
                .with_results("alpha", &["web-alpha"])
                .with_results("beta", &["web-beta"]),
        );

        let request = plan_request(
            Query::new("web"),
            targets(&["beta"]),
            &store,
            CandidateStrategy::Term,
            &SearchSettings::default(),
        )
        .unwrap();
        let outcome = Coordinator::spawn(request, executor.clone())
            .wait()
            .unwrap();

        assert_eq!(executor.calls(), vec!["beta"]);
        let found: Vec<(&str, &str)> = outcome
            .results
            .iter()
            .map(|e| (e.target.as_str(), e.name.as_str()))
            .collect();
        assert_eq!(found, vec![("beta", "web-beta")]);
    }

    #[test]
    fn test_plan_ip_lookup_rejects_bad_address() {
        let store = AffinityStore::in_memory();
        let result = plan_request(
            Query::new("not-an-ip"),
            targets(&["a"]),
            &store,
            CandidateStrategy::IpAddress,
            &SearchSettings::default(),
        );
        assert!(matches!(result, Err(SearchError::InvalidAddress(_))));
    }

    #[test]
    fn test_drain_empties_slot_on_completion() {
        let executor = Arc::new(MockExecutor::new().with_results("a", &["vm"]));
        let mut slot = SearchSlot::new();
        slot.start(
            SearchRequest::new(Query::new("vm"), targets(&["a"])),
            executor,
        );

        let events = drain_until_done(&mut slot);

        assert!(!slot.is_running());
        assert!(matches!(events.last(), Some(SearchEvent::Complete(_))));
    }

    #[test]
    fn test_new_search_supersedes_previous() {
        let slow = Arc::new(
            MockExecutor::new()
                .with_delay(Duration::from_millis(30))
                .with_results("a", &["old"])
                .with_results("b", &["old"]),
        );
        let fast = Arc::new(MockExecutor::new().with_results("a", &["new"]));
        let mut slot = SearchSlot::new();

        let first = slot
            .start(
                SearchRequest::new(Query::new("old"), targets(&["a", "b"])).with_concurrency(1),
                slow,
            )
            .session()
            .clone();
        slot.start(SearchRequest::new(Query::new("new"), targets(&["a"])), fast);

        assert!(first.is_cancelled());

        let events = drain_until_done(&mut slot);
        let outcome = events
            .into_iter()
            .find_map(|event| match event {
                SearchEvent::Complete(outcome) => Some(outcome),
                _ => None,
            })
            .expect("completed outcome");

        assert_eq!(outcome.query.term, "new");
        assert!(outcome.results.iter().all(|e| e.name == "new"));
    }

    #[test]
    fn test_cancel_keeps_partial_outcome_drainable() {
        let executor = Arc::new(
            MockExecutor::new()
                .with_delay(Duration::from_millis(10))
                .with_results("a", &["x"])
                .with_results("b", &["y"])
                .with_results("c", &["z"]),
        );
        let mut slot = SearchSlot::new();
        slot.start(
            SearchRequest::new(Query::new("q"), targets(&["a", "b", "c"])).with_concurrency(1),
            executor,
        );

        slot.cancel();
        let events = drain_until_done(&mut slot);

        match events.last() {
            Some(SearchEvent::Complete(outcome)) => {
                assert_eq!(outcome.completion, Completion::Cancelled)
            }
            other => panic!("expected cancelled outcome, got {:?}", other),
        }
    }
}
