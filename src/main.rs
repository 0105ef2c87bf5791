//! CLI entry point for the NYCT realtime proxy.
//!
//! `run` drives the full proxy: fetch each configured upstream feed on a
//! fixed delay, translate the trip updates against the static schedule, and
//! republish one aggregated trip-updates feed. `process` runs the same
//! translation once over already-downloaded feed files.

use anyhow::Result;
use clap::{Parser, Subcommand};
use log::{error, info, warn};
use std::path::{Path, PathBuf};

use nyct_rt_proxy::activation::ActivatedTripIndex;
use nyct_rt_proxy::config::ProxyConfig;
use nyct_rt_proxy::fetch::FeedClient;
use nyct_rt_proxy::gtfs_rt::FeedMessage;
use nyct_rt_proxy::metrics::MatchMetrics;
use nyct_rt_proxy::output::{build_feed, write_feed};
use nyct_rt_proxy::parser::parse_feed;
use nyct_rt_proxy::processor::FeedProcessor;
use nyct_rt_proxy::schedule::load_schedule;

#[derive(Parser)]
#[command(name = "nyct_rt_proxy")]
#[command(about = "Republishes MTA NYCT realtime feeds with schedule-valid identifiers", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch, translate, and republish the upstream feeds on a fixed delay
    Run {
        /// Directory containing the static GTFS bundle
        #[arg(short, long)]
        gtfs: PathBuf,

        /// JSON config file; defaults apply when omitted
        #[arg(short, long)]
        config: Option<String>,

        /// Output path for the aggregated trip-updates feed
        #[arg(short, long, default_value = "trip-updates.pb")]
        output: PathBuf,

        /// Number of cycles to run (0 = run until interrupted)
        #[arg(short = 'n', long, default_value_t = 0)]
        cycles: usize,
    },
    /// Translate already-downloaded feed files once and write the aggregate
    Process {
        /// Directory containing the static GTFS bundle
        #[arg(short, long)]
        gtfs: PathBuf,

        /// JSON config file; defaults apply when omitted
        #[arg(short, long)]
        config: Option<String>,

        /// Output path for the aggregated trip-updates feed
        #[arg(short, long, default_value = "trip-updates.pb")]
        output: PathBuf,

        /// Binary GTFS-realtime files, processed in order
        #[arg(value_name = "FEED_FILE", required = true)]
        feeds: Vec<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file
    env_logger::init(); // Initialize logger

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            gtfs,
            config,
            output,
            cycles,
        } => {
            let config = load_config(config.as_deref())?;
            let index = load_index(&gtfs)?;
            run(&index, &config, &output, cycles).await?;
        }
        Commands::Process {
            gtfs,
            config,
            output,
            feeds,
        } => {
            let config = load_config(config.as_deref())?;
            let index = load_index(&gtfs)?;
            process_files(&index, &config, &output, &feeds)?;
        }
    }

    Ok(())
}

fn load_config(path: Option<&str>) -> Result<ProxyConfig> {
    match path {
        Some(path) => ProxyConfig::load(path),
        None => Ok(ProxyConfig::default()),
    }
}

fn load_index(gtfs_dir: &Path) -> Result<ActivatedTripIndex> {
    info!("loading static GTFS from {}", gtfs_dir.display());
    let schedule = load_schedule(gtfs_dir)?;
    Ok(ActivatedTripIndex::new(schedule))
}

/// The proxy loop: one update cycle per `refresh_rate_sec`. A failed cycle
/// is logged and the loop continues; cancellation granularity is one cycle.
async fn run(
    index: &ActivatedTripIndex,
    config: &ProxyConfig,
    output: &Path,
    cycles: usize,
) -> Result<()> {
    let key = std::env::var("MTA_API_KEY").ok();
    if key.is_none() {
        warn!("MTA_API_KEY is not set; fetching without an API key");
    }
    let client = FeedClient::from_config(config, key)?;

    if cycles == 0 {
        info!(
            "updating every {} seconds. Press Ctrl+C to stop.",
            config.refresh_rate_sec
        );
    } else {
        info!(
            "running {} cycle(s) every {} seconds",
            cycles, config.refresh_rate_sec
        );
    }

    let mut cycle = 0;
    loop {
        cycle += 1;

        if let Err(e) = update(index, config, &client, output).await {
            error!("update cycle {} failed: {:#}", cycle, e);
        }

        if cycles > 0 && cycle >= cycles {
            break;
        }
        tokio::time::sleep(tokio::time::Duration::from_secs(config.refresh_rate_sec)).await;
    }

    Ok(())
}

/// One cycle: fetch every configured feed id, translate, and republish.
async fn update(
    index: &ActivatedTripIndex,
    config: &ProxyConfig,
    client: &FeedClient,
    output: &Path,
) -> Result<()> {
    info!("doing update");

    let processor = FeedProcessor::new(index, config);
    let mut metrics = MatchMetrics::new();
    let mut trip_updates = Vec::new();

    for &feed_id in &config.feed_ids {
        match fetch_feed(client, config, feed_id).await {
            Some(message) => {
                trip_updates.extend(processor.process_feed(feed_id, &message, &mut metrics));
            }
            None => {
                warn!(
                    "feed {} produced no usable message after {} tries, skipping",
                    feed_id, config.n_tries
                );
            }
        }
    }

    let feed = build_feed(trip_updates, chrono::Utc::now().timestamp() as u64);
    write_feed(output, &feed)?;

    info!(
        "writing {} total trip updates to {}",
        feed.entity.len(),
        output.display()
    );
    metrics.log_summary("total");

    Ok(())
}

// Fetch one upstream feed, retrying while it comes back empty or broken.
async fn fetch_feed(
    client: &FeedClient,
    config: &ProxyConfig,
    feed_id: u32,
) -> Option<FeedMessage> {
    let url = match reqwest::Url::parse_with_params(
        &config.feed_url,
        &[("feed_id", feed_id.to_string())],
    ) {
        Ok(url) => url,
        Err(e) => {
            error!("invalid feed URL for feed {}: {}", feed_id, e);
            return None;
        }
    };

    for attempt in 1..=config.n_tries {
        match fetch_and_parse(client, url.clone()).await {
            Ok(message) if !message.entity.is_empty() => return Some(message),
            Ok(_) => {
                warn!("feed {} came back empty (try {})", feed_id, attempt);
            }
            Err(e) => {
                error!(
                    "error reading feed {} (try {} of {}): {:#}",
                    feed_id, attempt, config.n_tries, e
                );
            }
        }
        if attempt < config.n_tries {
            tokio::time::sleep(tokio::time::Duration::from_secs(config.retry_delay_sec)).await;
        }
    }

    None
}

async fn fetch_and_parse(client: &FeedClient, url: reqwest::Url) -> Result<FeedMessage> {
    let bytes = client.fetch_bytes(url).await?;
    parse_feed(&bytes)
}

/// Offline mode: translate local feed files in order, numbering them 1..N.
fn process_files(
    index: &ActivatedTripIndex,
    config: &ProxyConfig,
    output: &Path,
    feeds: &[PathBuf],
) -> Result<()> {
    let processor = FeedProcessor::new(index, config);
    let mut metrics = MatchMetrics::new();
    let mut trip_updates = Vec::new();

    for (i, path) in feeds.iter().enumerate() {
        let feed_id = (i + 1) as u32;
        let bytes = std::fs::read(path)?;
        let message = parse_feed(&bytes)?;
        info!(
            "processing {} as feed {} ({} entities)",
            path.display(),
            feed_id,
            message.entity.len()
        );
        trip_updates.extend(processor.process_feed(feed_id, &message, &mut metrics));
    }

    let feed = build_feed(trip_updates, chrono::Utc::now().timestamp() as u64);
    write_feed(output, &feed)?;

    info!(
        "wrote {} trip updates to {}",
        feed.entity.len(),
        output.display()
    );
    metrics.log_summary("total");

    Ok(())
}
