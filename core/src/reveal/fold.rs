use std::sync::{Arc, PoisonError, RwLock};

use crate::prelude::{DetectionObserver, ObserverResult, SharedRecord};
use crate::reveal::state::{DuplicatePolicy, RevealedState};

/// Observer that folds each delivered record into a shared [`RevealedState`].
///
/// The synchronous start path and timer callbacks both land here, so the
/// state is the only place delivery order is materialized.
#[derive(Clone, Default)]
pub struct StateFold {
    state: Arc<RwLock<RevealedState>>,
    policy: DuplicatePolicy,
}

impl StateFold {
    pub fn new(policy: DuplicatePolicy) -> Self {
        Self {
            state: Arc::new(RwLock::new(RevealedState::new())),
            policy,
        }
    }

    pub fn apply(&self, record: &SharedRecord) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone(), self.policy);
    }

    pub fn snapshot(&self) -> RevealedState {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn reset(&self) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl DetectionObserver for StateFold {
    fn on_detection(&self, record: &SharedRecord) -> ObserverResult {
        self.apply(record);
        Ok(())
    }
}
