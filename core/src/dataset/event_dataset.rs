use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use crate::detection::{Channel, DetectionRecord, RawDetection};
use crate::prelude::{DatasetError, DatasetResult, RecordDefect, SharedRecord};

/// Immutable channel-partitioned collection of detection records.
///
/// Each channel's sequence is ordered by activation time, ties kept in
/// insertion order. Cloning is cheap and clones share the same records, so
/// one dataset can back any number of concurrent playback runs.
#[derive(Debug, Clone, Default)]
pub struct EventDataset {
    channels: Arc<BTreeMap<Channel, Vec<SharedRecord>>>,
}

impl EventDataset {
    /// Validates raw records and partitions them by their declared channel.
    pub fn from_raw<I>(records: I) -> DatasetResult<Self>
    where
        I: IntoIterator<Item = RawDetection>,
    {
        let validated = records
            .into_iter()
            .enumerate()
            .map(|(index, raw)| {
                raw.validate(None)
                    .map_err(|defect| DatasetError::invalid(index, defect))
            })
            .collect::<DatasetResult<Vec<_>>>()?;
        Self::from_records(validated)
    }

    /// Builds a dataset from already-validated records, checking id uniqueness.
    pub fn from_records<I>(records: I) -> DatasetResult<Self>
    where
        I: IntoIterator<Item = DetectionRecord>,
    {
        let mut channels: BTreeMap<Channel, Vec<SharedRecord>> = BTreeMap::new();
        let mut seen: HashSet<(Channel, String)> = HashSet::new();

        for (index, record) in records.into_iter().enumerate() {
            if !seen.insert((record.channel(), record.id().to_string())) {
                return Err(DatasetError::invalid(
                    index,
                    RecordDefect::DuplicateId(record.id().to_string()),
                ));
            }
            channels
                .entry(record.channel())
                .or_default()
                .push(Arc::new(record));
        }

        for sequence in channels.values_mut() {
            // stable: equal instants stay in insertion order
            sequence.sort_by_key(|record| record.activation_time());
        }

        Ok(Self {
            channels: Arc::new(channels),
        })
    }

    pub fn len(&self) -> usize {
        self.channels.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Channels that carry at least one record.
    pub fn channels(&self) -> impl Iterator<Item = Channel> + '_ {
        self.channels.keys().copied()
    }

    pub fn records(&self, channel: Channel) -> &[SharedRecord] {
        self.channels
            .get(&channel)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Every channel with its ordered sequence.
    pub fn iter(&self) -> impl Iterator<Item = (Channel, &[SharedRecord])> + '_ {
        self.channels
            .iter()
            .map(|(channel, records)| (*channel, records.as_slice()))
    }

    /// Earliest activation instant across all channels.
    pub fn earliest(&self) -> Option<i64> {
        self.channels
            .values()
            .filter_map(|records| records.first())
            .map(|record| record.activation_time())
            .min()
    }

    /// Restricts the dataset to `channels`; an empty selection keeps everything.
    pub fn select(&self, channels: &[Channel]) -> Self {
        if channels.is_empty() {
            return self.clone();
        }
        let selected = self
            .channels
            .iter()
            .filter(|(channel, _)| channels.contains(channel))
            .map(|(channel, records)| (*channel, records.clone()))
            .collect();
        Self {
            channels: Arc::new(selected),
        }
    }

    /// Shifts every activation instant so the earliest record activates at
    /// `anchor_ms`. Spacing and order are preserved.
    pub fn rebase(&self, anchor_ms: i64) -> Self {
        let Some(earliest) = self.earliest() else {
            return self.clone();
        };
        let offset = anchor_ms.saturating_sub(earliest);
        let shifted = self
            .channels
            .iter()
            .map(|(channel, records)| {
                let moved = records
                    .iter()
                    .map(|record| Arc::new(record.shifted(offset)))
                    .collect();
                (*channel, moved)
            })
            .collect();
        Self {
            channels: Arc::new(shifted),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};

    fn record(id: &str, channel: Channel, at: i64) -> DetectionRecord {
        DetectionRecord::new(id, channel, at, Map::new())
    }

    fn ids(dataset: &EventDataset, channel: Channel) -> Vec<&str> {
        dataset.records(channel).iter().map(|r| r.id()).collect()
    }

    #[test]
    fn dataset_orders_by_activation_and_keeps_ties_in_insertion_order() {
        let dataset = EventDataset::from_records(vec![
            record("late", Channel::Pothole, 300),
            record("tie-a", Channel::Pothole, 200),
            record("early", Channel::Pothole, 100),
            record("tie-b", Channel::Pothole, 200),
            record("other", Channel::WrongWay, 50),
        ])
        .unwrap();

        assert_eq!(dataset.len(), 5);
        assert_eq!(
            ids(&dataset, Channel::Pothole),
            vec!["early", "tie-a", "tie-b", "late"]
        );
        assert_eq!(ids(&dataset, Channel::WrongWay), vec!["other"]);
        assert!(dataset.records(Channel::NoHelmet).is_empty());
        assert_eq!(dataset.earliest(), Some(50));
    }

    #[test]
    fn dataset_rejects_duplicate_ids_within_a_channel_only() {
        let shared_across = EventDataset::from_records(vec![
            record("1", Channel::Pothole, 1),
            record("1", Channel::WrongWay, 1),
        ]);
        assert!(shared_across.is_ok());

        let err = EventDataset::from_records(vec![
            record("1", Channel::Pothole, 1),
            record("1", Channel::Pothole, 2),
        ])
        .unwrap_err();
        assert!(matches!(
            err,
            DatasetError::InvalidRecord {
                index: 1,
                defect: RecordDefect::DuplicateId(_)
            }
        ));
    }

    #[test]
    fn dataset_from_raw_fails_whole_construction_on_one_bad_record() {
        let raws: Vec<RawDetection> = serde_json::from_value(json!([
            {"id": 1, "channel": "pothole", "activationTime": 10},
            {"id": 2, "channel": "hovercraft", "activationTime": 20}
        ]))
        .unwrap();

        let err = EventDataset::from_raw(raws).unwrap_err();
        assert!(matches!(err, DatasetError::InvalidRecord { index: 1, .. }));
    }

    #[test]
    fn dataset_select_restricts_channels() {
        let dataset = EventDataset::from_records(vec![
            record("a", Channel::Pothole, 1),
            record("b", Channel::WrongWay, 2),
            record("c", Channel::NoHelmet, 3),
        ])
        .unwrap();

        let selected = dataset.select(&[Channel::Pothole, Channel::NoHelmet]);
        assert_eq!(selected.len(), 2);
        assert_eq!(
            selected.channels().collect::<Vec<_>>(),
            vec![Channel::NoHelmet, Channel::Pothole]
        );
        assert_eq!(dataset.select(&[]).len(), 3);
    }

    #[test]
    fn dataset_rebase_preserves_spacing() {
        let dataset = EventDataset::from_records(vec![
            record("a", Channel::Pothole, 1_000),
            record("b", Channel::Pothole, 1_500),
            record("c", Channel::WrongWay, 1_200),
        ])
        .unwrap();

        let rebased = dataset.rebase(10_000);
        let times: Vec<i64> = rebased
            .records(Channel::Pothole)
            .iter()
            .map(|r| r.activation_time())
            .collect();
        assert_eq!(times, vec![10_000, 10_500]);
        assert_eq!(
            rebased.records(Channel::WrongWay)[0].activation_time(),
            10_200
        );
        // source dataset is untouched
        assert_eq!(dataset.earliest(), Some(1_000));
    }
}
