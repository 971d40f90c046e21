use anyhow::Context;
use playbackcore::reveal::DuplicatePolicy;
use playbackcore::Channel;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::generator::profile::GeneratorConfig;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    /// Channels the view replays; empty means all.
    pub channels: Vec<Channel>,
    /// Canned dataset to replay instead of a generated one.
    pub dataset: Option<PathBuf>,
    /// Shift the dataset so its earliest record activates this long after start.
    pub rebase_lead_ms: Option<i64>,
    pub duplicate_policy: DuplicatePolicy,
    pub generator: GeneratorConfig,
}

impl ReplayConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading replay config {}", path_ref.display()))?;
        let config: ReplayConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing replay config {}", path_ref.display()))?;
        Ok(config)
    }

    pub fn from_args(
        channels: Vec<Channel>,
        dataset: Option<PathBuf>,
        records_per_channel: usize,
        seed: u64,
        rebase_lead_ms: Option<i64>,
    ) -> Self {
        Self {
            channels,
            dataset,
            rebase_lead_ms,
            duplicate_policy: DuplicatePolicy::default(),
            generator: GeneratorConfig {
                records_per_channel,
                seed,
                ..Default::default()
            },
        }
    }
}
