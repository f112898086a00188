//! Two-stage interrupt handling for training runs.
//!
//! The first interrupt sets the scheduler's stop flag, so the run ends as
//! `Interrupted` after the current episode and is finalized normally. An
//! episode blocked in a model refresh can take up to the refresh timeout;
//! a second interrupt reports [`InterruptWatch::Forced`] so the caller can
//! exit at once.

use std::future::Future;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptWatch {
    /// Interrupted twice; the caller should exit without waiting.
    Forced,
    /// The signal source failed; no further interrupts will be seen.
    Unavailable,
}

/// Wait on `next_signal` for a graceful stop, then for a forced one.
pub async fn watch_interrupts<F, Fut>(stop: Arc<AtomicBool>, mut next_signal: F) -> InterruptWatch
where
    F: FnMut() -> Fut,
    Fut: Future<Output = io::Result<()>>,
{
    if let Err(e) = next_signal().await {
        warn!(error = %e, "cannot listen for interrupts");
        return InterruptWatch::Unavailable;
    }
    warn!("interrupt received, stopping after the current episode (interrupt again to exit now)");
    stop.store(true, Ordering::SeqCst);

    match next_signal().await {
        Ok(()) => {
            warn!("second interrupt, exiting without finalizing");
            InterruptWatch::Forced
        }
        Err(e) => {
            warn!(error = %e, "interrupt listener failed");
            InterruptWatch::Unavailable
        }
    }
}
