//! Skirmish - headless replay generator
//!
//! Runs a seeded skirmish (or asks a remote generation service for one),
//! pushes it through the replay pipeline and prints the artifact as JSON.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use skirmish::core::config::SimConfig;
use skirmish::core::error::Result;
use skirmish::replay::{
    BundledSample, FileReplayStore, HttpReplayGenerator, LocalReplayGenerator, ReplayGenerator, ReplayMode,
    ReplayParams, ReplayPipeline,
};
use skirmish::simulation::MapConfig;

/// Skirmish replay generator
#[derive(Parser, Debug)]
#[command(name = "skirmish")]
#[command(about = "Run a deterministic skirmish and print its replay artifact")]
struct Args {
    /// Match seed
    #[arg(long, default_value_t = 42)]
    seed: u32,

    /// Commander id (part of the cache key)
    #[arg(long, default_value = "default")]
    commander: String,

    /// Map type tag
    #[arg(long, default_value = "plains")]
    map_type: String,

    /// Ticks to cover
    #[arg(long, default_value_t = 600)]
    ticks: u64,

    /// full or fast
    #[arg(long, default_value = "full")]
    mode: ReplayMode,

    /// TOML configuration file (defaults when omitted)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory for the persistent replay cache
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Use the remote generation service (REPLAY_API_URL / REPLAY_API_KEY)
    #[arg(long)]
    remote: bool,

    /// Print a share link instead of the artifact
    #[arg(long)]
    share: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("skirmish=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(Args::parse()).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => {
            tracing::error!("no replay could be produced");
            ExitCode::FAILURE
        }
        Err(e) => {
            tracing::error!(error = %e, "skirmish failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<bool> {
    let config = match &args.config {
        Some(path) => SimConfig::load(path)?,
        None => SimConfig::default(),
    };

    let generator: Arc<dyn ReplayGenerator> = if args.remote {
        let http = HttpReplayGenerator::from_env()?;
        tracing::info!(url = http.api_url(), "using remote replay generation");
        Arc::new(http)
    } else {
        Arc::new(LocalReplayGenerator::new(config.clone()))
    };

    let mut pipeline = ReplayPipeline::new(config.replay.clone(), generator).with_sample(Arc::new(BundledSample));
    if let Some(dir) = &args.cache_dir {
        pipeline = pipeline.with_store(Arc::new(FileReplayStore::open(dir)?));
    }

    let params = ReplayParams::new(args.seed, args.commander, MapConfig::new(args.map_type))
        .with_mode(args.mode)
        .with_ticks(args.ticks);

    let Some(result) = pipeline.generate_replay(params).await else {
        return Ok(false);
    };

    if result.is_sample() {
        tracing::warn!("showing bundled sample data, not a real run");
    }
    tracing::info!(
        replay_id = %result.artifact.replay_id,
        origin = ?result.origin,
        partial = result.artifact.meta.partial,
        "replay ready"
    );

    // Samples are never cached, so they cannot be shared
    if args.share && !result.is_sample() {
        let link = pipeline.share_replay(&result.artifact.replay_id).await?;
        println!("{}", serde_json::to_string_pretty(&link)?);
    } else {
        println!("{}", result.artifact.to_json_pretty()?);
    }
    Ok(true)
}
