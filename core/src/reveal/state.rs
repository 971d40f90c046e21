use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::detection::Channel;
use crate::prelude::SharedRecord;

/// What to do when a record arrives whose id is already revealed in its channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Keep both entries.
    Append,
    /// Overwrite the earlier entry in place, keeping its position.
    #[default]
    Replace,
}

/// Records revealed so far, per channel, in delivery order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RevealedState {
    channels: BTreeMap<Channel, Vec<SharedRecord>>,
}

impl Default for RevealedState {
    fn default() -> Self {
        Self::new()
    }
}

impl RevealedState {
    /// Empty state with every channel present.
    pub fn new() -> Self {
        Self {
            channels: Channel::ALL
                .into_iter()
                .map(|channel| (channel, Vec::new()))
                .collect(),
        }
    }

    pub fn records(&self, channel: Channel) -> &[SharedRecord] {
        self.channels
            .get(&channel)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn ids(&self, channel: Channel) -> Vec<&str> {
        self.records(channel).iter().map(|r| r.id()).collect()
    }

    pub fn count(&self, channel: Channel) -> usize {
        self.records(channel).len()
    }

    pub fn len(&self) -> usize {
        self.channels.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn counts(&self) -> BTreeMap<Channel, usize> {
        self.channels
            .iter()
            .map(|(channel, records)| (*channel, records.len()))
            .collect()
    }

    /// Folds one delivered record in. Never re-sorts.
    pub fn push(&mut self, record: SharedRecord, policy: DuplicatePolicy) {
        let sequence = self.channels.entry(record.channel()).or_default();
        if policy == DuplicatePolicy::Replace {
            if let Some(existing) = sequence.iter_mut().find(|r| r.id() == record.id()) {
                *existing = record;
                return;
            }
        }
        sequence.push(record);
    }

    pub fn clear(&mut self) {
        self.channels.values_mut().for_each(Vec::clear);
    }
}
