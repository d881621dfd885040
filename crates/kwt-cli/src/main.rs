use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use kwt_core::{Clock, SystemClock};
use kwt_sources::{AppleSearchAdsCredentials, Catalog, JwtTokenProvider};
use kwt_storage::KeywordStore;
use kwt_sync::{
    category_label, report_trending_markdown, CategoryReport, RunObserver, SyncConfig,
    SyncPipeline,
};
use tracing::debug;

#[derive(Debug, Parser)]
#[command(name = "kwt-cli")]
#[command(about = "Keyword trends fetcher: generate, normalize, rank, and persist keyword data")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the pipeline once for every (or the selected) category.
    Sync(SyncArgs),
    /// List the category enumeration.
    Categories,
    /// Print the top of a trending file.
    Report(ReportArgs),
}

#[derive(Debug, Default, Args)]
struct SyncArgs {
    /// Output root (overrides KWT_OUTPUT_DIR).
    #[arg(long)]
    output_dir: Option<PathBuf>,
    /// Only process this category; repeatable.
    #[arg(long = "category", value_name = "CATEGORY")]
    categories: Vec<String>,
    /// Pause between categories in milliseconds (overrides KWT_CATEGORY_DELAY_MS).
    #[arg(long)]
    delay_ms: Option<u64>,
    /// Do not load Apple Search Ads credentials.
    #[arg(long)]
    skip_auth: bool,
}

#[derive(Debug, Args)]
struct ReportArgs {
    #[arg(long)]
    output_dir: Option<PathBuf>,
    /// Trending date (YYYY-MM-DD); defaults to the newest file.
    #[arg(long)]
    date: Option<NaiveDate>,
    #[arg(long, default_value_t = 10)]
    limit: usize,
}

struct ConsoleObserver;

impl RunObserver for ConsoleObserver {
    fn category_started(&self, category: &str) {
        println!("Processing {category}...");
    }

    fn category_finished(&self, report: &CategoryReport) {
        println!(
            "  saved {} keywords to {}",
            report.keywords,
            report.path.display()
        );
    }
}

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("kwt error: {error:?}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing()?;
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Sync(SyncArgs::default())) {
        Commands::Sync(args) => sync(args).await,
        Commands::Categories => {
            let catalog = Catalog::embedded()?;
            for id in catalog.category_ids() {
                println!("{id}\t{}", category_label(&id));
            }
            Ok(())
        }
        Commands::Report(args) => {
            let config = SyncConfig::from_env();
            let root = args.output_dir.unwrap_or(config.output_dir);
            let store = KeywordStore::new(root, Arc::new(SystemClock));
            let report = report_trending_markdown(&store, args.date, args.limit).await?;
            print!("{report}");
            Ok(())
        }
    }
}

async fn sync(args: SyncArgs) -> Result<()> {
    let mut config = SyncConfig::from_env();
    if let Some(dir) = args.output_dir {
        config.output_dir = dir;
    }
    if let Some(ms) = args.delay_ms {
        config.category_delay = Duration::from_millis(ms);
    }
    if !args.categories.is_empty() {
        config.only_categories = Some(args.categories);
    }

    let catalog = Arc::new(Catalog::embedded()?);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let mut pipeline = SyncPipeline::new(config, catalog, clock.clone())?
        .with_observer(Box::new(ConsoleObserver));

    if !args.skip_auth {
        let credentials = AppleSearchAdsCredentials::from_env()
            .context("loading Apple Search Ads credentials")?;
        debug!(?credentials, "loaded credentials");
        let provider = JwtTokenProvider::new(credentials, clock);
        pipeline = pipeline.with_token_provider(Box::new(provider));
    }

    let summary = pipeline.run_once().await?;
    for doc in &summary.written {
        debug!(
            path = %doc.relative_path.display(),
            sha256 = %doc.content_hash,
            bytes = doc.byte_size,
            "artifact"
        );
    }
    println!(
        "sync complete: run_id={} categories={} keywords={} trending={} output={}",
        summary.run_id,
        summary.categories.len(),
        summary.total_keywords,
        summary.trending_keywords,
        pipeline.store().root().display()
    );
    Ok(())
}

fn init_tracing() -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_env("KWT_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| anyhow::anyhow!("failed to initialize tracing subscriber: {error}"))?;

    Ok(())
}
