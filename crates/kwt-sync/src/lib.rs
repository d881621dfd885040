//! Sync pipeline orchestration: fetch → normalize → persist → rank.

pub mod normalize;
pub mod trending;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use kwt_core::{Clock, NormalizedKeywordRecord};
use kwt_sources::{Catalog, FetchContext, KeywordSource, SampleKeywordSource, TokenProvider};
use kwt_storage::{KeywordStore, WrittenDocument};
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

pub use normalize::{category_label, competition_level_for, normalize_record, Normalizer};
pub use trending::{select_trending, TRENDING_LIMIT};

pub const DEFAULT_OUTPUT_DIR: &str = "./data";
pub const DEFAULT_CATEGORY_DELAY_MS: u64 = 2_000;

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub output_dir: PathBuf,
    pub category_delay: Duration,
    pub trending_limit: usize,
    /// Restricts the run to these catalog categories, in catalog order.
    pub only_categories: Option<Vec<String>>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            category_delay: Duration::from_millis(DEFAULT_CATEGORY_DELAY_MS),
            trending_limit: TRENDING_LIMIT,
            only_categories: None,
        }
    }
}

impl SyncConfig {
    pub fn from_env() -> Self {
        Self {
            output_dir: std::env::var("KWT_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_OUTPUT_DIR)),
            category_delay: Duration::from_millis(
                std::env::var("KWT_CATEGORY_DELAY_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(DEFAULT_CATEGORY_DELAY_MS),
            ),
            trending_limit: std::env::var("KWT_TRENDING_LIMIT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(TRENDING_LIMIT),
            only_categories: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryReport {
    pub category: String,
    pub keywords: usize,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncRunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub source_id: String,
    pub categories: Vec<CategoryReport>,
    pub total_keywords: usize,
    pub trending_keywords: usize,
    pub trending_path: Option<PathBuf>,
    pub metadata_path: PathBuf,
    pub written: Vec<WrittenDocument>,
}

/// Progress hook invoked as the pipeline moves through categories.
pub trait RunObserver: Send + Sync {
    fn category_started(&self, _category: &str) {}
    fn category_finished(&self, _report: &CategoryReport) {}
}

#[derive(Default)]
pub struct NoopRunObserver;

impl RunObserver for NoopRunObserver {}

pub struct SyncPipeline {
    config: SyncConfig,
    catalog: Arc<Catalog>,
    clock: Arc<dyn Clock>,
    store: KeywordStore,
    normalizer: Normalizer,
    source: Box<dyn KeywordSource>,
    token_provider: Option<Box<dyn TokenProvider>>,
    observer: Box<dyn RunObserver>,
}

impl SyncPipeline {
    pub fn new(config: SyncConfig, catalog: Arc<Catalog>, clock: Arc<dyn Clock>) -> Result<Self> {
        if let Some(only) = &config.only_categories {
            for category in only {
                if !catalog.contains(category) {
                    bail!(
                        "unknown category {category:?}; expected one of: {}",
                        catalog.category_ids().join(", ")
                    );
                }
            }
        }

        let store = KeywordStore::new(config.output_dir.clone(), clock.clone());
        let normalizer = Normalizer::new(clock.clone());
        let source: Box<dyn KeywordSource> = Box::new(SampleKeywordSource::new(catalog.clone()));
        Ok(Self {
            config,
            catalog,
            clock,
            store,
            normalizer,
            source,
            token_provider: None,
            observer: Box::<NoopRunObserver>::default(),
        })
    }

    pub fn with_source(mut self, source: Box<dyn KeywordSource>) -> Self {
        self.source = source;
        self
    }

    pub fn with_token_provider(mut self, provider: Box<dyn TokenProvider>) -> Self {
        self.token_provider = Some(provider);
        self
    }

    pub fn with_observer(mut self, observer: Box<dyn RunObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn store(&self) -> &KeywordStore {
        &self.store
    }

    /// Categories this run will process, in catalog order.
    pub fn selected_categories(&self) -> Vec<String> {
        let all = self.catalog.category_ids();
        match &self.config.only_categories {
            Some(only) => all.into_iter().filter(|c| only.contains(c)).collect(),
            None => all,
        }
    }

    pub async fn run_once(&self) -> Result<SyncRunSummary> {
        let started_at = self.clock.now();
        let run_id = Uuid::new_v4();
        let categories = self.selected_categories();
        info!(
            %run_id,
            source = self.source.source_id(),
            categories = categories.len(),
            "starting keyword sync"
        );

        let mut ctx = FetchContext::new(run_id);
        if let Some(provider) = &self.token_provider {
            let token = provider
                .bearer_token()
                .context("obtaining Search Ads bearer token")?;
            debug!(%run_id, "bearer token acquired");
            ctx = ctx.with_bearer_token(token);
        }

        let mut all_keywords: Vec<NormalizedKeywordRecord> = Vec::new();
        let mut reports = Vec::with_capacity(categories.len());
        let mut written = Vec::new();

        for (index, category) in categories.iter().enumerate() {
            if index > 0 && !self.config.category_delay.is_zero() {
                tokio::time::sleep(self.config.category_delay).await;
            }
            self.observer.category_started(category);

            let raw = self
                .source
                .fetch_keywords(&ctx, category)
                .await
                .with_context(|| format!("fetching keywords for {category}"))?;
            let keywords = self.normalizer.normalize_all(&raw);
            let doc = self
                .store
                .write_category(category, &keywords)
                .await
                .with_context(|| format!("persisting keywords for {category}"))?;

            let report = CategoryReport {
                category: category.clone(),
                keywords: keywords.len(),
                path: doc.relative_path.clone(),
            };
            info!(%run_id, category = %category, keywords = report.keywords, "processed category");
            self.observer.category_finished(&report);

            all_keywords.extend(keywords);
            reports.push(report);
            written.push(doc);
        }

        let mut trending_keywords = 0;
        let mut trending_path = None;
        if !all_keywords.is_empty() {
            let trending = select_trending(&all_keywords, self.config.trending_limit);
            trending_keywords = trending.len();
            let doc = self
                .store
                .write_trending(&trending)
                .await
                .context("persisting trending keywords")?;
            trending_path = Some(doc.relative_path.clone());
            written.push(doc);
        } else {
            info!(%run_id, "no keywords produced; skipping trending file");
        }

        let metadata = self
            .store
            .write_metadata(&self.catalog.category_ids())
            .await
            .context("persisting metadata")?;
        let metadata_path = metadata.relative_path.clone();
        written.push(metadata);

        let finished_at = self.clock.now();
        info!(
            %run_id,
            total = all_keywords.len(),
            trending = trending_keywords,
            "keyword sync complete"
        );

        Ok(SyncRunSummary {
            run_id,
            started_at,
            finished_at,
            source_id: self.source.source_id().to_string(),
            categories: reports,
            total_keywords: all_keywords.len(),
            trending_keywords,
            trending_path,
            metadata_path,
            written,
        })
    }
}

/// Markdown summary of one day's trending file (the latest on disk when
/// `date` is `None`).
pub async fn report_trending_markdown(
    store: &KeywordStore,
    date: Option<NaiveDate>,
    limit: usize,
) -> Result<String> {
    let date = match date {
        Some(date) => date,
        None => store
            .latest_trending_date()
            .await?
            .with_context(|| format!("no trending files under {}", store.root().display()))?,
    };
    let doc = store.read_trending(date).await?;
    let metadata = store.read_metadata_if_present().await?;

    let mut lines = vec![format!("# Trending Keywords {date}"), String::new()];
    lines.push(format!("- generated: {}", doc.generated_at.to_rfc3339()));
    lines.push(format!("- source: {}", doc.source));
    lines.push(format!("- keywords: {}", doc.keywords.len()));
    if let Some(metadata) = &metadata {
        lines.push(format!(
            "- categories: {} (metadata v{}, updated {})",
            metadata.categories.len(),
            metadata.version,
            metadata.last_updated.to_rfc3339()
        ));
    }
    lines.push(String::new());
    lines.push("| # | keyword | category | popularity | competition |".to_string());
    lines.push("|---|---------|----------|------------|-------------|".to_string());
    for (rank, record) in doc.keywords.iter().take(limit).enumerate() {
        lines.push(format!(
            "| {} | {} | {} | {:.1} | {} |",
            rank + 1,
            record.keyword,
            record.category,
            record.search_popularity,
            record.competition_level
        ));
    }
    lines.push(String::new());

    Ok(lines.join("\n"))
}
