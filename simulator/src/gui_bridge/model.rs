use playbackcore::telemetry::MetricsSnapshot;
use playbackcore::{Channel, SharedRecord};
use serde::Serialize;
use std::collections::BTreeMap;

/// One dashboard section: a channel and what has been revealed on it.
#[derive(Debug, Clone, Serialize)]
pub struct ChannelModel {
    pub channel: Channel,
    pub label: &'static str,
    pub count: usize,
    pub detections: Vec<SharedRecord>,
}

/// Summary served to the dashboard's statistics cards.
#[derive(Debug, Clone, Serialize, Default)]
pub struct StatsModel {
    pub counts: BTreeMap<Channel, usize>,
    pub total: usize,
    pub pending: usize,
    pub running: bool,
    pub metrics: MetricsSnapshot,
}
