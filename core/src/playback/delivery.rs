use crate::playback::timer::TimerGuard;
use crate::prelude::SharedRecord;

/// Lifecycle of one record within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryState {
    Pending,
    Fired,
    Cancelled,
}

/// One record bound to its delivery state and, while pending, its timer.
pub(crate) struct ScheduledDelivery {
    record: SharedRecord,
    state: DeliveryState,
    guard: Option<Box<dyn TimerGuard>>,
}

impl ScheduledDelivery {
    pub(crate) fn pending(record: SharedRecord) -> Self {
        Self {
            record,
            state: DeliveryState::Pending,
            guard: None,
        }
    }

    pub(crate) fn record(&self) -> &SharedRecord {
        &self.record
    }

    pub(crate) fn state(&self) -> DeliveryState {
        self.state
    }

    /// Attaches the timer armed for this delivery. A guard arriving after the
    /// delivery already settled is simply discarded.
    pub(crate) fn arm(&mut self, guard: Box<dyn TimerGuard>) {
        if self.state == DeliveryState::Pending {
            self.guard = Some(guard);
        }
    }

    /// Pending -> Fired. Returns false if the delivery already settled.
    pub(crate) fn mark_fired(&mut self) -> bool {
        if self.state != DeliveryState::Pending {
            return false;
        }
        self.state = DeliveryState::Fired;
        self.guard = None;
        true
    }

    /// Pending -> Cancelled, cancelling the armed timer.
    pub(crate) fn cancel(&mut self) -> bool {
        if self.state != DeliveryState::Pending {
            return false;
        }
        self.state = DeliveryState::Cancelled;
        if let Some(guard) = self.guard.take() {
            guard.cancel();
        }
        true
    }
}
