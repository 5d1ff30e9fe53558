//! huginn: annotate ranked video ad creatives and summarize the batch
//!
//! Reads a channel-grouped manifest of creatives, runs the annotation
//! pipeline over all of them at once, and writes a JSON report for the
//! presentation layer.

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use huginn::config::{Config, Secrets};
use huginn::{
    AdCreative, AnnotatedItem, AnnotationCache, ChannelBatch, Huginn, HuginnError, StrategyReport,
};

/// Huginn CLI
#[derive(Parser)]
#[command(name = "huginn")]
#[command(version = huginn::PKG_VERSION)]
#[command(about = "Concurrent video ad annotation pipeline")]
struct Args {
    /// Config file (default: ~/.huginn/config.toml, then /etc/huginn/config.toml)
    #[arg(short, long, global = true, env = "HUGINN_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Annotate a manifest of creatives and write the report
    Run {
        /// Channel-grouped creative manifest (JSON)
        #[arg(short, long)]
        input: PathBuf,
        /// Report destination (overrides [output] report_path)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Make no external calls; cache hits are still used
        #[arg(long)]
        offline: bool,
        /// Maximum creatives annotated in parallel
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// Inspect the annotation cache
    Cache {
        #[command(subcommand)]
        command: CacheCommand,
    },
}

#[derive(Subcommand)]
enum CacheCommand {
    /// Print the number of cached annotations
    Stats,
}

/// One channel's ranked creatives, as produced by the ad source.
#[derive(Debug, Deserialize)]
struct ChannelInput {
    name: String,
    creatives: Vec<AdCreative>,
}

#[derive(Debug, Deserialize)]
struct Manifest {
    channels: Vec<ChannelInput>,
}

#[derive(Serialize)]
struct ChannelReport<'a> {
    name: &'a str,
    creatives: &'a [AnnotatedItem<AdCreative>],
}

#[derive(Serialize)]
struct RunReport<'a> {
    version: String,
    strategy: &'a StrategyReport,
    channels: Vec<ChannelReport<'a>>,
}

#[tokio::main]
async fn main() {
    // Initialise tracing (default: info; override with RUST_LOG).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    dotenvy::dotenv().ok();

    let args = Args::parse();

    let config = match Config::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "failed to load configuration");
            process::exit(1);
        }
    };

    let result = match args.command {
        Command::Run {
            input,
            output,
            offline,
            concurrency,
        } => run(config, &input, output, offline, concurrency).await,
        Command::Cache {
            command: CacheCommand::Stats,
        } => {
            cache_stats(&config);
            Ok(())
        }
    };

    if let Err(e) = result {
        error!(error = %e, "run failed");
        process::exit(1);
    }
}

async fn run(
    config: Config,
    input: &Path,
    output: Option<PathBuf>,
    offline_flag: bool,
    concurrency: Option<usize>,
) -> huginn::Result<()> {
    let manifest: Manifest = serde_json::from_slice(&tokio::fs::read(input).await?)?;

    let total: usize = manifest.channels.iter().map(|c| c.creatives.len()).sum();
    if total == 0 {
        return Err(HuginnError::NoItems);
    }
    info!(channels = manifest.channels.len(), creatives = total, "manifest loaded");

    let mut offline = offline_flag || config.pipeline.offline;
    let mut api_key = None;
    if !offline {
        api_key = Secrets::load()?.gemini_api_key();
        if api_key.is_none() {
            warn!("GEMINI_API_KEY not set, switching to offline mode");
            offline = true;
        }
    }

    let mut builder = Huginn::builder()
        .cache_path(&config.pipeline.cache_path)
        .concurrency(concurrency.unwrap_or(config.pipeline.concurrency))
        .retry(config.retry.to_retry_config())
        .poll(config.poll.to_poll_config())
        .annotation_models(config.models.annotation.clone())
        .summary_models(config.models.summary.clone())
        .language(config.pipeline.language.clone())
        .offline(offline);
    if let Some(key) = api_key {
        builder = builder.gemini(key);
    }
    if let Some(url) = &config.gemini.base_url {
        builder = builder.gemini_base_url(url.clone());
    }
    let pipeline = builder.build()?;

    // One batch across all channels, split back afterwards.
    let mut names = Vec::with_capacity(manifest.channels.len());
    let mut lengths = Vec::with_capacity(manifest.channels.len());
    let mut creatives = Vec::with_capacity(total);
    for channel in manifest.channels {
        names.push(channel.name);
        lengths.push(channel.creatives.len());
        creatives.extend(channel.creatives);
    }

    let annotated = pipeline.annotate(creatives).await;

    let mut groups = Vec::with_capacity(lengths.len());
    let mut offset = 0;
    for len in lengths {
        groups.push(&annotated[offset..offset + len]);
        offset += len;
    }

    let batches: Vec<ChannelBatch<'_, AdCreative>> = names
        .iter()
        .zip(&groups)
        .map(|(name, items)| ChannelBatch::new(name, items))
        .collect();
    let strategy = pipeline.summarize(&batches).await;

    let report = RunReport {
        version: huginn::version_string(),
        strategy: &strategy,
        channels: names
            .iter()
            .zip(&groups)
            .map(|(name, creatives)| ChannelReport { name, creatives })
            .collect(),
    };

    let path = output.unwrap_or(config.output.report_path);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&path, serde_json::to_vec_pretty(&report)?).await?;

    let genuine = annotated.iter().filter(|a| a.status.is_genuine()).count();
    info!(
        path = %path.display(),
        annotated = genuine,
        degraded = annotated.len() - genuine,
        summary = strategy.status.as_str(),
        "report written"
    );
    Ok(())
}

fn cache_stats(config: &Config) {
    let cache = AnnotationCache::open(&config.pipeline.cache_path);
    println!("Cache file: {}", config.pipeline.cache_path.display());
    println!("Cached annotations: {}", cache.len());
}
