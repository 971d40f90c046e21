use crate::generator::profile::build_dataset_from_config;
use crate::workflow::config::ReplayConfig;
use anyhow::Context;
use playbackcore::playback::{Clock, DeliveryFailure, ManualClock, PlaybackScheduler};
use playbackcore::reveal::{PlaybackSession, RevealedState};
use playbackcore::telemetry::MetricsSnapshot;
use playbackcore::{Channel, EventDataset};
use std::collections::BTreeMap;

pub struct ReplayResult {
    pub per_channel: BTreeMap<Channel, usize>,
    pub total: usize,
    pub expected: usize,
    pub metrics: MetricsSnapshot,
    pub failures: Vec<DeliveryFailure>,
    pub revealed: RevealedState,
    /// Virtual time covered by the replay.
    pub span_ms: i64,
}

#[derive(Clone)]
pub struct Runner {
    config: ReplayConfig,
}

impl Runner {
    pub fn new(config: ReplayConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ReplayConfig {
        &self.config
    }

    /// Loads or generates the dataset and applies channel selection and rebasing.
    pub fn prepare_dataset(&self, now_ms: i64) -> anyhow::Result<EventDataset> {
        let dataset = match self.config.dataset.as_ref() {
            Some(path) => EventDataset::load(path)
                .with_context(|| format!("loading dataset {}", path.display()))?,
            None => build_dataset_from_config(&self.config.generator, now_ms)
                .context("generating dataset")?,
        };

        let dataset = dataset.select(&self.config.channels);
        Ok(match self.config.rebase_lead_ms {
            Some(lead) => dataset.rebase(now_ms.saturating_add(lead)),
            None => dataset,
        })
    }

    /// Replays `dataset` to quiescence on virtual time starting at `now_ms`.
    pub fn execute_offline(&self, dataset: &EventDataset, now_ms: i64) -> anyhow::Result<ReplayResult> {
        let clock = ManualClock::new(now_ms);
        let session = PlaybackSession::new(
            PlaybackScheduler::manual(clock.clone()),
            self.config.duplicate_policy,
        );

        session.start(dataset);
        clock.run_until_idle();
        if session.is_running() {
            anyhow::bail!("replay did not reach quiescence");
        }

        let failures = session.take_failures();
        let revealed = session.snapshot();
        let per_channel = revealed
            .counts()
            .into_iter()
            .filter(|(_, count)| *count > 0)
            .collect();

        Ok(ReplayResult {
            per_channel,
            total: revealed.len(),
            expected: dataset.len(),
            metrics: session.metrics(),
            failures,
            revealed,
            span_ms: clock.now_ms().saturating_sub(now_ms),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const NOW: i64 = 1_700_000_000_000;

    #[test]
    fn runner_replays_generated_dataset_to_completion() {
        let cfg = ReplayConfig::from_args(vec![], None, 4, 2, None);
        let runner = Runner::new(cfg);
        let dataset = runner.prepare_dataset(NOW).unwrap();
        let result = runner.execute_offline(&dataset, NOW).unwrap();

        assert_eq!(result.total, result.expected);
        assert_eq!(result.per_channel.len(), Channel::ALL.len());
        assert!(result.failures.is_empty());
        assert_eq!(result.metrics.delivered(), result.expected);
        assert!(result.span_ms > 0);
        for channel in Channel::ALL {
            assert_eq!(result.revealed.records(channel), dataset.records(channel));
        }
    }

    #[test]
    fn runner_selects_and_rebases_canned_dataset() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(
            br#"{
                "pothole": [{"id": 1, "detectedAt": 1000}, {"id": 2, "detectedAt": 1500}],
                "wrongWay": [{"id": 1, "detectedAt": 1200}]
            }"#,
        )
        .unwrap();
        let path = temp.into_temp_path();

        let cfg = ReplayConfig::from_args(
            vec![Channel::Pothole],
            Some(path.to_path_buf()),
            0,
            0,
            Some(250),
        );
        let runner = Runner::new(cfg);
        let dataset = runner.prepare_dataset(NOW).unwrap();

        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.earliest(), Some(NOW + 250));

        let result = runner.execute_offline(&dataset, NOW).unwrap();
        assert_eq!(result.revealed.ids(Channel::Pothole), vec!["1", "2"]);
        assert_eq!(result.span_ms, 750);
        assert_eq!(result.metrics.immediate, 0);
    }

    #[test]
    fn runner_surfaces_malformed_dataset() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(br#"[{"id": 1, "channel": "pothole"}]"#).unwrap();
        let path = temp.into_temp_path();

        let cfg = ReplayConfig::from_args(vec![], Some(path.to_path_buf()), 0, 0, None);
        let err = Runner::new(cfg).prepare_dataset(NOW).unwrap_err();
        assert!(format!("{:#}", err).contains("missing activation time"));
    }
}
