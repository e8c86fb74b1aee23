#![forbid(unsafe_code)]

//! One-shot job: fetch the trending chart, enrich it and store it.
//!
//! Settings come from flags, then the environment, then `.env`, then the
//! compiled-in defaults. API failures during the pass are logged and never
//! change the exit code; bad configuration or an unusable database do.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use trending_ingest::{
    categories::resolve_categories,
    config::{ConfigOverrides, IngestConfig, resolve_ingest_config},
    ingest::{IngestPlan, IngestReport, ingest_trending},
    logging::init_tracing,
    store::{DryRunSink, VideoStore},
    youtube::YouTubeClient,
};

#[derive(Debug, Parser)]
#[command(
    name = "trending_ingest",
    about = "Store the YouTube trending chart, with channel statistics, in youtube_videos"
)]
struct Cli {
    /// Path of the `.env` file to read settings from
    #[arg(long)]
    env_file: Option<PathBuf>,
    /// YouTube Data API key (YOUTUBE_API_KEY)
    #[arg(long)]
    api_key: Option<String>,
    /// ISO 3166-1 region of the chart (YOUTUBE_REGION)
    #[arg(long)]
    region: Option<String>,
    /// Videos requested per page, at most 50 (YOUTUBE_PAGE_SIZE)
    #[arg(long)]
    page_size: Option<u32>,
    /// Stop after this many stored rows (YOUTUBE_TARGET_COUNT)
    #[arg(long)]
    target: Option<u32>,
    /// Database file, or `:memory:` (TRENDING_DB_PATH)
    #[arg(long)]
    db_path: Option<PathBuf>,
    /// API root, handy for proxies (YOUTUBE_API_BASE_URL)
    #[arg(long)]
    api_base_url: Option<String>,
    /// HTTP timeout in seconds (YOUTUBE_TIMEOUT_SECS)
    #[arg(long)]
    timeout_secs: Option<u64>,
    /// Log the rows as JSON instead of writing them
    #[arg(long)]
    dry_run: bool,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            api_key: self.api_key.clone(),
            api_base_url: self.api_base_url.clone(),
            region_code: self.region.clone(),
            page_size: self.page_size,
            target_count: self.target,
            db_path: self.db_path.clone(),
            timeout_secs: self.timeout_secs,
            env_path: self.env_file.clone(),
        }
    }
}

fn plan_for(config: &IngestConfig) -> IngestPlan {
    IngestPlan {
        region_code: config.region_code.clone(),
        page_size: config.page_size,
        target_count: config.target_count,
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing("info")?;

    let config = resolve_ingest_config(cli.overrides()).context("loading configuration")?;
    info!(
        region = %config.region_code,
        page_size = config.page_size,
        target = config.target_count,
        dry_run = cli.dry_run,
        "starting trending ingest"
    );

    let store = if cli.dry_run {
        None
    } else {
        Some(
            VideoStore::open(&config.db_path)
                .await
                .context("initializing video database")?,
        )
    };

    let api = YouTubeClient::from_config(&config);
    let categories = resolve_categories(&api, &config.region_code);
    let plan = plan_for(&config);

    let report = match &store {
        Some(store) => ingest_trending(&api, store, &categories, &plan).await,
        None => ingest_trending(&api, &DryRunSink, &categories, &plan).await,
    };

    log_report(&report);
    Ok(())
}

fn log_report(report: &IngestReport) {
    info!(
        pages = report.pages_fetched,
        stored = report.stored,
        skipped = report.skipped_items,
        channel_lookup_failures = report.channel_lookup_failures,
        insert_failures = report.insert_failures,
        stop_reason = ?report.stop_reason,
        "ingest finished"
    );
}
