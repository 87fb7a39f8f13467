//! Debouncer: runs an action once the trigger has been quiet for `delay`.
//! Each trigger cancels the previous pending run (last writer wins).

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::trace;

type Action<A> = Arc<dyn Fn(A) + Send + Sync>;

pub struct Debouncer<A> {
    delay: Duration,
    action: Action<A>,
    pending: Mutex<Option<CancellationToken>>,
}

impl<A: Send + 'static> Debouncer<A> {
    pub fn new(delay: Duration, action: impl Fn(A) + Send + Sync + 'static) -> Self {
        Self {
            delay,
            action: Arc::new(action),
            pending: Mutex::new(None),
        }
    }

    /// Schedule `action(arg)` after the delay, replacing any pending run.
    /// Must be called from within a Tokio runtime.
    pub fn trigger(&self, arg: A) {
        let token = CancellationToken::new();
        if let Some(prev) = self.pending.lock().replace(token.clone()) {
            prev.cancel();
        }

        let action = Arc::clone(&self.action);
        let delay = self.delay;
        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    trace!("debounce_superseded");
                }
                _ = tokio::time::sleep(delay) => {
                    action(arg);
                }
            }
        });
    }

    /// Drop the pending run, if any.
    pub fn cancel(&self) {
        if let Some(token) = self.pending.lock().take() {
            token.cancel();
        }
    }
}

impl<A> Drop for Debouncer<A> {
    fn drop(&mut self) {
        if let Some(token) = self.pending.get_mut().take() {
            token.cancel();
        }
    }
}
