//! Ctrl+C / SIGTERM handling for the CLI.
//!
//! The first signal sets a flag that the delivery loop polls to cancel the
//! live search, so partial results can still be printed. A second signal
//! while the flag is set exits immediately with code 1.

use signal_hook::consts::TERM_SIGNALS;
use signal_hook::flag;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    flag: Arc<AtomicBool>,
}

impl Interrupt {
    /// Register handlers for every termination signal.
    pub fn install() -> Result<Self, std::io::Error> {
        let interrupt = Self::default();
        for sig in TERM_SIGNALS {
            // Order matters: the conditional shutdown only fires once the
            // flag is already set by an earlier signal.
            flag::register_conditional_shutdown(*sig, 1, Arc::clone(&interrupt.flag))?;
            flag::register(*sig, Arc::clone(&interrupt.flag))?;
        }
        Ok(interrupt)
    }

    pub fn is_raised(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    #[cfg(test)]
    pub fn raise(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }
}
