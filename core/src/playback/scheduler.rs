use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};
use std::time::Duration;

use crate::dataset::EventDataset;
use crate::detection::Channel;
use crate::playback::clock::Clock;
use crate::playback::delivery::{DeliveryState, ScheduledDelivery};
use crate::playback::manual::ManualClock;
use crate::playback::timer::TimerFacility;
use crate::prelude::{DetectionObserver, SharedRecord};
use crate::telemetry::{LogManager, MetricsRecorder};

static NEXT_RUN_ID: AtomicU64 = AtomicU64::new(1);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// An observer error raised while delivering one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryFailure {
    pub run_id: u64,
    pub channel: Channel,
    pub record_id: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy)]
enum DeliveryKind {
    Immediate,
    Delayed,
}

/// Reveals dataset records to an observer at their activation instants.
///
/// One scheduler can start any number of runs; each run owns its own timers
/// and is torn down through its [`PlaybackHandle`].
pub struct PlaybackScheduler {
    clock: Arc<dyn Clock>,
    timer: Arc<dyn TimerFacility>,
    metrics: Arc<MetricsRecorder>,
    logger: LogManager,
}

impl PlaybackScheduler {
    pub fn new(clock: Arc<dyn Clock>, timer: Arc<dyn TimerFacility>) -> Self {
        Self {
            clock,
            timer,
            metrics: Arc::new(MetricsRecorder::new()),
            logger: LogManager::new(),
        }
    }

    /// Scheduler driven entirely by virtual time.
    pub fn manual(clock: ManualClock) -> Self {
        Self::new(Arc::new(clock.clone()), Arc::new(clock))
    }

    pub fn metrics(&self) -> &Arc<MetricsRecorder> {
        &self.metrics
    }

    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    /// Starts a run over `dataset`.
    ///
    /// Records already due are delivered before this returns; every other
    /// record gets one single-shot timer. Timers are armed only after the
    /// due records were delivered, so an observer panicking on that path
    /// unwinds out of `start` with no handle and nothing left scheduled.
    pub fn start(
        &self,
        dataset: &EventDataset,
        observer: Arc<dyn DetectionObserver>,
    ) -> PlaybackHandle {
        let run_id = NEXT_RUN_ID.fetch_add(1, Ordering::Relaxed);
        let now = self.clock.now_ms();

        let mut lanes = Vec::new();
        let mut due = Vec::new();
        let mut future = Vec::new();
        for (lane, (channel, records)) in dataset.iter().enumerate() {
            let mut deliveries = Vec::with_capacity(records.len());
            for (pos, record) in records.iter().enumerate() {
                let delay = record.activation_time().saturating_sub(now);
                if delay <= 0 {
                    // sorted lanes: due records always form a prefix
                    due.push((lane, pos));
                } else {
                    future.push((lane, pos, delay));
                }
                deliveries.push(ScheduledDelivery::pending(record.clone()));
            }
            lanes.push(Lane {
                channel,
                deliveries,
                cursor: 0,
            });
        }

        let run = Arc::new(RunShared {
            run_id,
            observer,
            lanes: Mutex::new(lanes),
            disposed: AtomicBool::new(false),
            gate: Mutex::new(()),
            delivering: Mutex::new(None),
            failures: Mutex::new(Vec::new()),
            metrics: self.metrics.clone(),
            logger: LogManager::new(),
        });
        self.metrics.record_run();

        for &(lane, pos) in &due {
            run.deliver_through(lane, pos, DeliveryKind::Immediate);
        }

        let armed = future.len();
        for (lane, pos, delay) in future {
            let weak = Arc::downgrade(&run);
            let guard = self.timer.schedule(
                Duration::from_millis(delay.unsigned_abs()),
                Box::new(move || {
                    if let Some(run) = weak.upgrade() {
                        run.deliver_through(lane, pos, DeliveryKind::Delayed);
                    }
                }),
            );
            if let Some(slot) = lock(&run.lanes)
                .get_mut(lane)
                .and_then(|l| l.deliveries.get_mut(pos))
            {
                slot.arm(guard);
            }
        }

        self.logger.record(&format!(
            "run {} started: {} records, {} immediate, {} armed",
            run_id,
            dataset.len(),
            due.len(),
            armed
        ));

        PlaybackHandle { run }
    }
}

struct Lane {
    channel: Channel,
    deliveries: Vec<ScheduledDelivery>,
    /// Index of the first delivery that has not settled.
    cursor: usize,
}

struct RunShared {
    run_id: u64,
    observer: Arc<dyn DetectionObserver>,
    lanes: Mutex<Vec<Lane>>,
    disposed: AtomicBool,
    /// Serializes deliveries against each other and against dispose.
    gate: Mutex<()>,
    /// Thread currently inside the gate, for re-entrant dispose.
    delivering: Mutex<Option<ThreadId>>,
    failures: Mutex<Vec<DeliveryFailure>>,
    metrics: Arc<MetricsRecorder>,
    logger: LogManager,
}

struct DeliveringMark<'a>(&'a Mutex<Option<ThreadId>>);

impl<'a> DeliveringMark<'a> {
    fn enter(slot: &'a Mutex<Option<ThreadId>>) -> Self {
        *lock(slot) = Some(thread::current().id());
        Self(slot)
    }
}

impl Drop for DeliveringMark<'_> {
    fn drop(&mut self) {
        *lock(self.0) = None;
    }
}

impl RunShared {
    /// Delivers every pending record of `lane` up to and including `upto`.
    ///
    /// Timers of equal or close deadlines may fire in any order; draining the
    /// lane prefix keeps per-channel delivery order regardless.
    fn deliver_through(&self, lane: usize, upto: usize, kind: DeliveryKind) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }
        let _gate = lock(&self.gate);
        let _mark = DeliveringMark::enter(&self.delivering);

        let start = lock(&self.lanes).get(lane).map_or(usize::MAX, |l| l.cursor);
        if start > upto {
            return;
        }
        for pos in start..=upto {
            if self.disposed.load(Ordering::SeqCst) {
                break;
            }
            let record = {
                let mut lanes = lock(&self.lanes);
                let Some(lane) = lanes.get_mut(lane) else {
                    return;
                };
                let Some(slot) = lane.deliveries.get_mut(pos) else {
                    break;
                };
                if !slot.mark_fired() {
                    continue;
                }
                let record = slot.record().clone();
                lane.cursor = pos + 1;
                record
            };
            match kind {
                DeliveryKind::Immediate => self.metrics.record_immediate(),
                DeliveryKind::Delayed => self.metrics.record_delayed(),
            }
            self.notify(&record);
        }
    }

    fn notify(&self, record: &SharedRecord) {
        self.logger.trace(&format!(
            "run {} delivering {}#{}",
            self.run_id,
            record.channel(),
            record.id()
        ));
        if let Err(err) = self.observer.on_detection(record) {
            self.metrics.record_failure();
            self.logger.fault(&format!(
                "run {} observer failed on {}#{}: {}",
                self.run_id,
                record.channel(),
                record.id(),
                err
            ));
            lock(&self.failures).push(DeliveryFailure {
                run_id: self.run_id,
                channel: record.channel(),
                record_id: record.id().to_string(),
                message: err.to_string(),
            });
        }
    }

    fn dispose(&self) -> usize {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return 0;
        }
        let reentrant = *lock(&self.delivering) == Some(thread::current().id());
        // wait for an in-flight delivery on another thread to finish
        let _gate = if reentrant {
            None
        } else {
            Some(lock(&self.gate))
        };

        let cancelled = lock(&self.lanes)
            .iter_mut()
            .flat_map(|lane| lane.deliveries.iter_mut())
            .map(|slot| slot.cancel())
            .filter(|cancelled| *cancelled)
            .count();
        self.metrics.record_cancelled(cancelled);
        self.logger.record(&format!(
            "run {} disposed: {} pending deliveries cancelled",
            self.run_id, cancelled
        ));
        cancelled
    }

    fn count(&self, state: DeliveryState) -> usize {
        lock(&self.lanes)
            .iter()
            .flat_map(|lane| lane.deliveries.iter())
            .filter(|slot| slot.state() == state)
            .count()
    }
}

/// Scoped ownership of one run. Dropping the handle disposes the run.
pub struct PlaybackHandle {
    run: Arc<RunShared>,
}

impl PlaybackHandle {
    pub fn run_id(&self) -> u64 {
        self.run.run_id
    }

    /// Cancels every pending delivery and returns how many were cancelled.
    ///
    /// Once this has been entered no further observer invocation starts for
    /// the run. Later calls are no-ops returning zero.
    pub fn dispose(&self) -> usize {
        self.run.dispose()
    }

    pub fn is_disposed(&self) -> bool {
        self.run.disposed.load(Ordering::SeqCst)
    }

    pub fn pending(&self) -> usize {
        self.run.count(DeliveryState::Pending)
    }

    pub fn fired(&self) -> usize {
        self.run.count(DeliveryState::Fired)
    }

    pub fn cancelled(&self) -> usize {
        self.run.count(DeliveryState::Cancelled)
    }

    /// True once nothing is left to deliver.
    pub fn is_quiescent(&self) -> bool {
        self.pending() == 0
    }

    pub fn delivery_state(&self, channel: Channel, id: &str) -> Option<DeliveryState> {
        lock(&self.run.lanes)
            .iter()
            .filter(|lane| lane.channel == channel)
            .flat_map(|lane| lane.deliveries.iter())
            .find(|slot| slot.record().id() == id)
            .map(|slot| slot.state())
    }

    /// Drains observer failures recorded so far.
    pub fn take_failures(&self) -> Vec<DeliveryFailure> {
        std::mem::take(&mut *lock(&self.run.failures))
    }
}

impl Drop for PlaybackHandle {
    fn drop(&mut self) {
        self.run.dispose();
    }
}
