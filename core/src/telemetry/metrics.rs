use serde::Serialize;
use std::sync::Mutex;

/// Delivery counters shared by every run of a scheduler.
pub struct MetricsRecorder {
    inner: Mutex<MetricsSnapshot>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub runs: usize,
    pub immediate: usize,
    pub delayed: usize,
    pub cancelled: usize,
    pub failures: usize,
}

impl MetricsSnapshot {
    pub fn delivered(&self) -> usize {
        self.immediate + self.delayed
    }
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MetricsSnapshot::default()),
        }
    }

    pub fn record_run(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.runs += 1;
        }
    }

    pub fn record_immediate(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.immediate += 1;
        }
    }

    pub fn record_delayed(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.delayed += 1;
        }
    }

    pub fn record_cancelled(&self, count: usize) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.cancelled += count;
        }
    }

    pub fn record_failure(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.failures += 1;
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        if let Ok(metrics) = self.inner.lock() {
            *metrics
        } else {
            MetricsSnapshot::default()
        }
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}
