use anyhow::Context;
use clap::Parser;
use gui_bridge::bridge::{gui_bind_address, DashboardBridge};
use log::{info, warn};
use playbackcore::playback::{Clock, PlaybackScheduler, SystemClock, TokioTimer};
use playbackcore::reveal::PlaybackSession;
use playbackcore::Channel;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::runtime::Builder as TokioBuilder;
use tokio::signal;
use workflow::config::ReplayConfig;
use workflow::runner::Runner;

mod generator;
mod gui_bridge;
mod workflow;

#[derive(Parser)]
#[command(author, version, about = "Replays timed detection datasets for the traffic dashboard")]
struct Args {
    /// Replay the whole dataset on virtual time and emit a summary
    #[arg(long, default_value_t = false)]
    offline: bool,
    /// Load a replay config from YAML
    #[arg(long)]
    workflow: Option<PathBuf>,
    /// Canned JSON dataset to replay instead of generated detections
    #[arg(long)]
    dataset: Option<PathBuf>,
    /// Only replay this channel (repeatable)
    #[arg(long = "channel")]
    channels: Vec<Channel>,
    #[arg(long, default_value_t = 12)]
    records_per_channel: usize,
    #[arg(long, default_value_t = 0)]
    seed: u64,
    /// Shift the dataset so its first record activates this many ms after start
    #[arg(long)]
    rebase_lead_ms: Option<i64>,
    /// Reveal detections in real time behind the HTTP bridge
    #[arg(long, default_value_t = false)]
    serve: bool,
    #[arg(long)]
    bind: Option<SocketAddr>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let replay_config = if let Some(path) = args.workflow.as_ref() {
        ReplayConfig::load(path)?
    } else {
        ReplayConfig::from_args(
            args.channels.clone(),
            args.dataset.clone(),
            args.records_per_channel,
            args.seed,
            args.rebase_lead_ms,
        )
    };
    let runner = Runner::new(replay_config);

    if args.offline || !args.serve {
        run_offline(&runner)?;
    }
    if args.serve {
        serve(&runner, args.bind.unwrap_or_else(gui_bind_address))?;
    }

    Ok(())
}

fn run_offline(runner: &Runner) -> anyhow::Result<()> {
    let now = SystemClock.now_ms();
    let dataset = runner.prepare_dataset(now)?;
    let result = runner
        .execute_offline(&dataset, now)
        .context("replaying dataset offline")?;

    println!(
        "Offline replay -> delivered {}/{}, immediate {}, delayed {}, span {} ms",
        result.total,
        result.expected,
        result.metrics.immediate,
        result.metrics.delayed,
        result.span_ms
    );
    for (channel, count) in &result.per_channel {
        let latest = result
            .revealed
            .records(*channel)
            .last()
            .map(|record| record.id().to_string())
            .unwrap_or_default();
        println!("  {:<24} {:>4}  latest {}", channel.label(), count, latest);
    }
    for failure in &result.failures {
        warn!(
            "observer failed on {}#{}: {}",
            failure.channel, failure.record_id, failure.message
        );
    }

    let report = format!(
        "delivered={} expected={} immediate={} delayed={} failures={} channels={:?}\n",
        result.total,
        result.expected,
        result.metrics.immediate,
        result.metrics.delayed,
        result.failures.len(),
        result.per_channel
    );
    let report_path = PathBuf::from("tools/data/offline_playback.log");
    if let Some(parent) = report_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&report_path)
        .with_context(|| format!("opening report {}", report_path.display()))?;
    file.write_all(report.as_bytes())?;
    Ok(())
}

fn serve(runner: &Runner, address: SocketAddr) -> anyhow::Result<()> {
    let runtime = TokioBuilder::new_multi_thread()
        .enable_all()
        .build()
        .context("creating playback runtime")?;

    let timer = TokioTimer::new(runtime.handle().clone());
    let scheduler = PlaybackScheduler::new(Arc::new(SystemClock), Arc::new(timer));
    let session = Arc::new(PlaybackSession::new(
        scheduler,
        runner.config().duplicate_policy,
    ));

    let dataset = runner.prepare_dataset(session.now_ms())?;
    let run = session.start(&dataset);
    let bridge = DashboardBridge::new(session.clone());
    bridge.publish_status(&format!(
        "Run {} replaying {} detections (Ctrl+C to stop)...",
        run,
        dataset.len()
    ));

    runtime.block_on(async move {
        tokio::spawn(bridge.serve(address));
        signal::ctrl_c().await.context("awaiting Ctrl+C to exit")?;
        Ok::<(), anyhow::Error>(())
    })?;

    let cancelled = session.stop();
    info!("playback stopped, {} pending detections discarded", cancelled);
    Ok(())
}
