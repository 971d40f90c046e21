use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::dataset::EventDataset;
use crate::detection::{Channel, DetectionRecord};
use crate::playback::{DeliveryFailure, PlaybackHandle, PlaybackScheduler};
use crate::reveal::fold::StateFold;
use crate::reveal::state::{DuplicatePolicy, RevealedState};
use crate::telemetry::{LogManager, MetricsSnapshot};

/// The consuming view: owns the revealed state and at most one live run.
///
/// Starting again disposes the previous run before the state is reset, so a
/// stale delivery can never land in the new run's state. Dropping the
/// session disposes whatever run is still active.
pub struct PlaybackSession {
    scheduler: PlaybackScheduler,
    fold: StateFold,
    current: Mutex<Option<PlaybackHandle>>,
    logger: LogManager,
}

impl PlaybackSession {
    pub fn new(scheduler: PlaybackScheduler, policy: DuplicatePolicy) -> Self {
        Self {
            scheduler,
            fold: StateFold::new(policy),
            current: Mutex::new(None),
            logger: LogManager::with_target("session"),
        }
    }

    fn current(&self) -> MutexGuard<'_, Option<PlaybackHandle>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replaces any active run with a fresh run over `dataset`.
    pub fn start(&self, dataset: &EventDataset) -> u64 {
        let mut current = self.current();
        if let Some(previous) = current.take() {
            let cancelled = previous.dispose();
            if cancelled > 0 {
                self.logger.warn(&format!(
                    "run {} replaced with {} deliveries still pending",
                    previous.run_id(),
                    cancelled
                ));
            }
        }
        self.fold.reset();
        let handle = self.scheduler.start(dataset, Arc::new(self.fold.clone()));
        let run_id = handle.run_id();
        *current = Some(handle);
        run_id
    }

    /// Disposes the active run, keeping what was already revealed.
    pub fn stop(&self) -> usize {
        match self.current().take() {
            Some(handle) => handle.dispose(),
            None => 0,
        }
    }

    /// Live-feed entry point: delivers one record through the same fold the
    /// scheduler feeds.
    pub fn deliver_live(&self, record: DetectionRecord) {
        self.logger.trace(&format!(
            "live record {}#{}",
            record.channel(),
            record.id()
        ));
        self.fold.apply(&Arc::new(record));
    }

    pub fn is_running(&self) -> bool {
        self.current()
            .as_ref()
            .map_or(false, |handle| !handle.is_quiescent())
    }

    pub fn pending(&self) -> usize {
        self.current().as_ref().map_or(0, PlaybackHandle::pending)
    }

    pub fn now_ms(&self) -> i64 {
        self.scheduler.now_ms()
    }

    pub fn snapshot(&self) -> RevealedState {
        self.fold.snapshot()
    }

    pub fn counts(&self) -> BTreeMap<Channel, usize> {
        self.fold.snapshot().counts()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.scheduler.metrics().snapshot()
    }

    pub fn take_failures(&self) -> Vec<DeliveryFailure> {
        self.current()
            .as_ref()
            .map(PlaybackHandle::take_failures)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::ManualClock;
    use serde_json::Map;
    use std::time::Duration;

    const NOW: i64 = 10_000;

    fn dataset(prefix: &str) -> EventDataset {
        EventDataset::from_records((0..4).map(|i| {
            DetectionRecord::new(
                format!("{prefix}{i}"),
                Channel::Overspeeding,
                NOW - 100 + i * 200,
                Map::new(),
            )
        }))
        .unwrap()
    }

    fn session(clock: &ManualClock) -> PlaybackSession {
        PlaybackSession::new(
            PlaybackScheduler::manual(clock.clone()),
            DuplicatePolicy::Replace,
        )
    }

    #[test]
    fn session_restart_discards_previous_run() {
        let clock = ManualClock::new(NOW);
        let session = session(&clock);

        session.start(&dataset("a"));
        assert_eq!(session.snapshot().ids(Channel::Overspeeding), vec!["a0"]);
        assert!(session.is_running());

        session.start(&dataset("b"));
        clock.run_until_idle();

        assert_eq!(
            session.snapshot().ids(Channel::Overspeeding),
            vec!["b0", "b1", "b2", "b3"]
        );
        assert!(!session.is_running());
        assert_eq!(session.metrics().cancelled, 3);
    }

    #[test]
    fn session_stop_keeps_revealed_records() {
        let clock = ManualClock::new(NOW);
        let session = session(&clock);

        session.start(&dataset("a"));
        clock.advance(Duration::from_millis(100));
        assert_eq!(session.pending(), 2);
        assert_eq!(session.stop(), 2);
        assert_eq!(session.stop(), 0);

        clock.run_until_idle();
        assert_eq!(session.counts()[&Channel::Overspeeding], 2);
    }

    #[test]
    fn session_drop_disposes_active_run() {
        let clock = ManualClock::new(NOW);
        {
            let session = session(&clock);
            session.start(&dataset("a"));
            assert_eq!(clock.pending_timers(), 3);
        }
        assert_eq!(clock.pending_timers(), 0);
    }

    #[test]
    fn session_live_records_share_the_fold() {
        let clock = ManualClock::new(NOW);
        let session = session(&clock);
        session.deliver_live(DetectionRecord::new(
            "live-1",
            Channel::WrongWay,
            NOW,
            Map::new(),
        ));
        session.deliver_live(DetectionRecord::new(
            "live-1",
            Channel::WrongWay,
            NOW + 50,
            Map::new(),
        ));
        let revealed = session.snapshot();
        assert_eq!(revealed.ids(Channel::WrongWay), vec!["live-1"]);
        assert_eq!(revealed.records(Channel::WrongWay)[0].activation_time(), NOW + 50);
        assert!(session.take_failures().is_empty());
    }
}
