//! Signal handling for pool interruption.
//!
//! Registers a SIGINT (Ctrl+C) handler that sets a flag the pool supervisor
//! polls between liveness checks. Teardown of worker processes still runs
//! after an interrupt; the flag only stops the poll loop early.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{CrawlPoolError, Result};

/// Handles SIGINT for graceful pool shutdown.
///
/// Cloneable; all clones share the same underlying atomic flag.
#[derive(Clone)]
pub struct SignalHandler {
    interrupt_flag: Arc<AtomicBool>,
}

impl SignalHandler {
    /// Creates the handler and registers it for SIGINT.
    ///
    /// # Errors
    ///
    /// Returns an error if the process-wide signal handler cannot be
    /// registered (e.g. one is already installed).
    pub fn new() -> Result<Self> {
        let interrupt_flag = Arc::new(AtomicBool::new(false));
        let flag_clone = Arc::clone(&interrupt_flag);

        ctrlc::set_handler(move || {
            flag_clone.store(true, Ordering::SeqCst);
        })
        .map_err(|e| CrawlPoolError::SignalHandler(e.to_string()))?;

        Ok(Self { interrupt_flag })
    }

    /// Non-blocking check of whether SIGINT has been received.
    pub fn is_interrupted(&self) -> bool {
        self.interrupt_flag.load(Ordering::SeqCst)
    }

    /// The shared flag itself, for handing to [`crate::Pool::with_interrupt`].
    pub fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.interrupt_flag)
    }
}
