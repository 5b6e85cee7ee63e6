use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Session-scoped cooperative cancellation signal.
///
/// Every clone observes the same flag. Workers check it at admission, and
/// executors may poll it to abandon internal retries early. Cancelling is
/// idempotent and never blocks.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Returns `true` if this call flipped the flag.
    pub fn cancel(&self) -> bool {
        !self.cancelled.swap(true, Ordering::SeqCst)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_new_token_not_cancelled() {
        assert!(!CancelToken::new().is_cancelled());
    }

    #[test]
    fn test_clones_share_state() {
        let token = CancelToken::new();
        let worker_view = token.clone();

        worker_view.cancel();

        assert!(token.is_cancelled());
        assert!(worker_view.is_cancelled());
    }

    #[test]
    fn test_cancel_reports_first_caller_only() {
        let token = CancelToken::new();
        assert!(token.cancel());
        assert!(!token.clone().cancel());
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_cancel_observed_across_threads() {
        let token = CancelToken::new();
        let remote = token.clone();

        thread::spawn(move || remote.cancel()).join().unwrap();

        assert!(token.is_cancelled());
    }
}
