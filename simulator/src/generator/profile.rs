use anyhow::Context;
use playbackcore::{Channel, EventDataset, RawDetection};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::generator::template::payload_for;

/// Upper bound on records generated per channel.
pub const MAX_RECORDS_PER_CHANNEL: usize = 10_000;

/// Configuration for generating a synthetic detection dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Channels to populate; empty means every channel.
    pub channels: Vec<Channel>,
    pub records_per_channel: usize,
    /// Nominal spacing between consecutive records of one channel.
    pub interval_ms: i64,
    /// Upper bound of the random offset added to each record.
    pub jitter_ms: i64,
    /// Records per channel placed before the base instant (already due).
    pub backlog: usize,
    pub seed: u64,
    /// Base instant; the caller's "now" when unset.
    pub base_time_ms: Option<i64>,
    pub lookout_plates: Vec<String>,
    pub description: Option<String>,
    pub scenario: Option<String>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            channels: Vec::new(),
            records_per_channel: 12,
            interval_ms: 4_000,
            jitter_ms: 1_500,
            backlog: 2,
            seed: 0,
            base_time_ms: None,
            lookout_plates: Vec::new(),
            description: None,
            scenario: None,
        }
    }
}

impl GeneratorConfig {
    fn selected_channels(&self) -> Vec<Channel> {
        if self.channels.is_empty() {
            Channel::ALL.to_vec()
        } else {
            self.channels.clone()
        }
    }

    fn normalized_interval(&self) -> i64 {
        self.interval_ms.max(1)
    }

    fn normalized_jitter(&self) -> i64 {
        self.jitter_ms.clamp(0, self.normalized_interval() - 1)
    }
}

fn build_raw_records(config: &GeneratorConfig, now_ms: i64) -> anyhow::Result<Vec<RawDetection>> {
    if config.records_per_channel > MAX_RECORDS_PER_CHANNEL {
        anyhow::bail!(
            "records_per_channel {} exceeds the limit of {}",
            config.records_per_channel,
            MAX_RECORDS_PER_CHANNEL
        );
    }
    let base = config.base_time_ms.unwrap_or(now_ms);
    let interval = config.normalized_interval();
    let jitter = config.normalized_jitter();
    let backlog = i64::try_from(config.backlog).context("backlog does not fit an offset")?;

    let mut rng = StdRng::seed_from_u64(config.seed);
    let channels = config.selected_channels();
    let total = channels
        .len()
        .checked_mul(config.records_per_channel)
        .context("overflow computing record count for generator")?;
    let mut records = Vec::with_capacity(total);

    for channel in channels {
        for index in 0..config.records_per_channel {
            let slot = i64::try_from(index).context("record index does not fit an offset")? - backlog;
            let offset = if jitter > 0 {
                rng.gen_range(0..=jitter)
            } else {
                0
            };
            let activation = slot
                .checked_mul(interval)
                .and_then(|delta| base.checked_add(delta))
                .and_then(|instant| instant.checked_add(offset))
                .context("activation instant overflow")?;

            records.push(RawDetection {
                id: Some(json!(format!("{}-{:04}", channel, index + 1))),
                channel: Some(channel.as_str().to_string()),
                activation_time: Some(json!(activation)),
                payload: payload_for(channel, &mut rng, &config.lookout_plates),
            });
        }
    }

    Ok(records)
}

/// Builds a validated dataset around `now_ms`.
pub fn build_dataset_from_config(config: &GeneratorConfig, now_ms: i64) -> anyhow::Result<EventDataset> {
    let records = build_raw_records(config, now_ms)?;
    EventDataset::from_raw(records).context("validating generated dataset")
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000_000;

    #[test]
    fn generator_builds_expected_record_count() {
        let config = GeneratorConfig {
            records_per_channel: 5,
            seed: 1,
            ..Default::default()
        };
        let dataset = build_dataset_from_config(&config, NOW).unwrap();
        assert_eq!(dataset.len(), 5 * Channel::ALL.len());
        assert_eq!(dataset.records(Channel::Pothole).len(), 5);
    }

    #[test]
    fn generator_places_backlog_before_base_instant() {
        let config = GeneratorConfig {
            channels: vec![Channel::WrongWay],
            records_per_channel: 6,
            interval_ms: 1_000,
            jitter_ms: 200,
            backlog: 2,
            ..Default::default()
        };
        let dataset = build_dataset_from_config(&config, NOW).unwrap();
        let due = dataset
            .records(Channel::WrongWay)
            .iter()
            .filter(|r| r.activation_time() <= NOW)
            .count();
        assert!((2..=3).contains(&due));
        assert_eq!(dataset.channels().collect::<Vec<_>>(), vec![Channel::WrongWay]);
    }

    #[test]
    fn generator_rejects_oversized_request() {
        let config = GeneratorConfig {
            records_per_channel: MAX_RECORDS_PER_CHANNEL + 1,
            ..Default::default()
        };
        let err = build_dataset_from_config(&config, NOW).unwrap_err();
        assert!(format!("{:#}", err).contains("exceeds the limit"));
    }

    #[test]
    fn generator_is_reproducible_for_a_seed() {
        let config = GeneratorConfig {
            records_per_channel: 4,
            seed: 13,
            description: Some("test".into()),
            scenario: Some("load test".into()),
            ..Default::default()
        };
        let first = build_dataset_from_config(&config, NOW).unwrap();
        let second = build_dataset_from_config(&config, NOW).unwrap();
        for channel in Channel::ALL {
            assert_eq!(first.records(channel), second.records(channel));
        }
    }
}
