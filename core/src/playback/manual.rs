use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use crate::playback::clock::Clock;
use crate::playback::timer::{TimerFacility, TimerGuard, TimerTask};

/// Virtual time source that is both a [`Clock`] and a [`TimerFacility`].
///
/// Nothing fires until the clock is advanced. Callbacks due at the same
/// instant run in the order they were armed, so replays are deterministic.
#[derive(Clone)]
pub struct ManualClock {
    inner: Arc<Mutex<ManualInner>>,
}

struct ManualInner {
    now_ms: i64,
    next_seq: u64,
    queue: BTreeMap<(i64, u64), TimerTask>,
}

fn lock(inner: &Mutex<ManualInner>) -> MutexGuard<'_, ManualInner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ManualClock {
    pub fn new(start_ms: i64) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ManualInner {
                now_ms: start_ms,
                next_seq: 0,
                queue: BTreeMap::new(),
            })),
        }
    }

    /// Moves time forward by `by`, running every callback that falls due.
    pub fn advance(&self, by: Duration) -> usize {
        let step = i64::try_from(by.as_millis()).unwrap_or(i64::MAX);
        let target = self.now_ms().saturating_add(step);
        self.advance_to(target)
    }

    /// Moves time forward to `target_ms`, returning how many callbacks ran.
    ///
    /// Callbacks run outside the internal lock and may arm or cancel timers.
    pub fn advance_to(&self, target_ms: i64) -> usize {
        let mut fired = 0;
        loop {
            let task = {
                let mut inner = lock(&self.inner);
                let due = inner
                    .queue
                    .keys()
                    .next()
                    .copied()
                    .filter(|(deadline, _)| *deadline <= target_ms);
                match due {
                    Some(key) => {
                        inner.now_ms = inner.now_ms.max(key.0);
                        inner.queue.remove(&key)
                    }
                    None => {
                        inner.now_ms = inner.now_ms.max(target_ms);
                        None
                    }
                }
            };
            match task {
                Some(task) => {
                    task();
                    fired += 1;
                }
                None => return fired,
            }
        }
    }

    /// Jumps from deadline to deadline until no callback remains armed.
    pub fn run_until_idle(&self) -> usize {
        let mut fired = 0;
        loop {
            let next = lock(&self.inner).queue.keys().next().map(|(deadline, _)| *deadline);
            match next {
                Some(deadline) => fired += self.advance_to(deadline),
                None => return fired,
            }
        }
    }

    pub fn pending_timers(&self) -> usize {
        lock(&self.inner).queue.len()
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        lock(&self.inner).now_ms
    }
}

struct ManualGuard {
    key: (i64, u64),
    inner: Weak<Mutex<ManualInner>>,
}

impl TimerGuard for ManualGuard {
    fn cancel(&self) {
        if let Some(inner) = self.inner.upgrade() {
            lock(&inner).queue.remove(&self.key);
        }
    }
}

impl TimerFacility for ManualClock {
    fn schedule(&self, after: Duration, task: TimerTask) -> Box<dyn TimerGuard> {
        let mut inner = lock(&self.inner);
        let step = i64::try_from(after.as_millis()).unwrap_or(i64::MAX);
        let key = (inner.now_ms.saturating_add(step), inner.next_seq);
        inner.next_seq += 1;
        inner.queue.insert(key, task);
        Box::new(ManualGuard {
            key,
            inner: Arc::downgrade(&self.inner),
        })
    }
}
