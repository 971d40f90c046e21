use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::prelude::{PlaybackError, PlaybackResult};

/// Callback armed on a timer facility.
pub type TimerTask = Box<dyn FnOnce() + Send + 'static>;

/// Cancellation handle for one armed callback.
pub trait TimerGuard: Send {
    /// Prevents the callback from running if it has not started yet.
    fn cancel(&self);
}

/// "Schedule a callback after a duration".
///
/// Implementations must never run `task` from inside `schedule`.
pub trait TimerFacility: Send + Sync {
    fn schedule(&self, after: Duration, task: TimerTask) -> Box<dyn TimerGuard>;
}

/// Timer facility backed by tokio's sleep on a runtime handle.
#[derive(Clone)]
pub struct TokioTimer {
    runtime: Handle,
}

impl TokioTimer {
    pub fn new(runtime: Handle) -> Self {
        Self { runtime }
    }

    /// Binds to the runtime the caller is executing on.
    pub fn current() -> PlaybackResult<Self> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|err| PlaybackError::Runtime(err.to_string()))
    }
}

struct TokioGuard(JoinHandle<()>);

impl TimerGuard for TokioGuard {
    fn cancel(&self) {
        self.0.abort();
    }
}

impl TimerFacility for TokioTimer {
    fn schedule(&self, after: Duration, task: TimerTask) -> Box<dyn TimerGuard> {
        let handle = self.runtime.spawn(async move {
            tokio::time::sleep(after).await;
            task();
        });
        Box::new(TokioGuard(handle))
    }
}
