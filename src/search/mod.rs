//! Federated search across many independent targets.

pub mod cancel;
pub mod coordinator;
pub mod executor;
pub mod model;
pub mod orchestrator;
pub mod progress;
pub mod session;

pub use cancel::CancelToken;
pub use coordinator::{
    BatchControl, Completion, Coordinator, SearchError, SearchEvent, SearchHandle, SearchOutcome,
    SearchRequest, DEFAULT_CONCURRENCY, DEFAULT_TICK_INTERVAL,
};
pub use executor::TargetExecutor;
pub use model::{finalize_results, Query, ResourceEntry, Warning};
pub use orchestrator::{plan_request, SearchSettings, SearchSlot};
pub use progress::{Phase, Progress, Spinner, Ticker};
pub use session::{Session, SessionState, SessionUpdate};
