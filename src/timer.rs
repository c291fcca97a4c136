//! Delayed Transitions
//!
//! One-shot scheduled callback used for the success-display window: the
//! transfer flow shows its confirmation, then dismisses after a fixed delay
//! unless the user closes the modal first. Cancellation is deterministic;
//! dropping the handle aborts the pending callback.

use std::time::Duration;

/// Handle to a scheduled one-shot transition.
pub struct DelayedTransition {
    handle: tokio::task::JoinHandle<()>,
}

impl DelayedTransition {
    /// Run `f` once after `delay`, unless cancelled or dropped first.
    ///
    /// Must be called from within a tokio runtime.
    pub fn schedule(delay: Duration, f: impl FnOnce() + Send + 'static) -> Self {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            f();
        });
        Self { handle }
    }

    /// Abort the pending transition. No-op if it already fired.
    pub fn cancel(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for DelayedTransition {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
