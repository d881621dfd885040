use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use kwt_core::{Clock, CompetitionLevel, FixedClock, RawKeywordRecord};
use kwt_sources::{Catalog, FetchContext, KeywordSource, SourceError};
use kwt_sync::{CategoryReport, RunObserver, SyncConfig, SyncPipeline};
use tempfile::tempdir;

fn clock() -> Arc<dyn Clock> {
    Arc::new(FixedClock(
        Utc.with_ymd_and_hms(2026, 2, 24, 12, 0, 0).single().unwrap(),
    ))
}

fn catalog() -> Arc<Catalog> {
    Arc::new(Catalog::embedded().expect("catalog"))
}

fn config(root: &Path, only: Option<Vec<&str>>) -> SyncConfig {
    SyncConfig {
        output_dir: root.to_path_buf(),
        category_delay: Duration::ZERO,
        only_categories: only.map(|c| c.into_iter().map(String::from).collect()),
        ..SyncConfig::default()
    }
}

struct EmptySource;

#[async_trait]
impl KeywordSource for EmptySource {
    fn source_id(&self) -> &'static str {
        "empty"
    }

    async fn fetch_keywords(
        &self,
        _ctx: &FetchContext,
        _category: &str,
    ) -> Result<Vec<RawKeywordRecord>, SourceError> {
        Ok(Vec::new())
    }
}

struct BrokenSource;

#[async_trait]
impl KeywordSource for BrokenSource {
    fn source_id(&self) -> &'static str {
        "broken"
    }

    async fn fetch_keywords(
        &self,
        _ctx: &FetchContext,
        category: &str,
    ) -> Result<Vec<RawKeywordRecord>, SourceError> {
        if category == "business" {
            return Err(SourceError::Message("upstream unavailable".into()));
        }
        Ok(vec![RawKeywordRecord::minimal("only", "kw")])
    }
}

#[derive(Clone, Default)]
struct RecordingObserver {
    events: Arc<Mutex<Vec<String>>>,
}

impl RunObserver for RecordingObserver {
    fn category_started(&self, category: &str) {
        self.events.lock().unwrap().push(format!("start:{category}"));
    }

    fn category_finished(&self, report: &CategoryReport) {
        self.events
            .lock()
            .unwrap()
            .push(format!("done:{}:{}", report.category, report.keywords));
    }
}

#[tokio::test]
async fn games_run_produces_fifty_normalized_records() {
    let dir = tempdir().expect("tempdir");
    let pipeline = SyncPipeline::new(config(dir.path(), Some(vec!["games"])), catalog(), clock())
        .expect("pipeline");
    let summary = pipeline.run_once().await.expect("run");

    assert_eq!(summary.total_keywords, 50);
    assert_eq!(summary.categories.len(), 1);
    assert_eq!(summary.source_id, "sample");

    let doc = pipeline.store().read_category("games").await.expect("category file");
    assert_eq!(doc.keywords.len(), 50);
    for (i, record) in doc.keywords.iter().enumerate() {
        let expected = (95.0 - 1.5 * i as f64).max(10.0);
        assert!((record.search_popularity - expected).abs() < 1e-9, "index {i}");
        assert!(CompetitionLevel::ALL.contains(&record.competition_level));
        assert_eq!(record.category, "Games");
        assert!(record.suggested_bid_range.is_some());
    }
    assert_eq!(doc.keywords[0].search_popularity, 95.0);
    assert_eq!(doc.keywords[0].competition_level, CompetitionLevel::VeryHigh);
    assert_eq!(doc.keywords[49].competition_level, CompetitionLevel::Low);
}

#[tokio::test]
async fn full_run_writes_every_artifact() {
    let dir = tempdir().expect("tempdir");
    let pipeline =
        SyncPipeline::new(config(dir.path(), None), catalog(), clock()).expect("pipeline");
    let summary = pipeline.run_once().await.expect("run");

    assert_eq!(summary.categories.len(), 10);
    assert_eq!(summary.total_keywords, 495);
    assert_eq!(summary.trending_keywords, 100);
    assert_eq!(summary.written.len(), 12);

    for id in catalog().category_ids() {
        assert!(dir.path().join("categories").join(format!("{id}.json")).exists(), "{id}");
    }

    let date = NaiveDate::from_ymd_opt(2026, 2, 24).unwrap();
    let trending = pipeline.store().read_trending(date).await.expect("trending file");
    assert_eq!(trending.keywords.len(), 100);
    assert!(trending
        .keywords
        .windows(2)
        .all(|w| w[0].search_popularity >= w[1].search_popularity));
    // Ten categories tie at 95.0; catalog order must survive the sort.
    let leaders: Vec<&str> = trending.keywords[..3].iter().map(|r| r.category.as_str()).collect();
    assert_eq!(leaders, vec!["Games", "Business", "Productivity"]);

    let metadata = pipeline.store().read_metadata().await.expect("metadata");
    assert_eq!(metadata.categories, catalog().category_ids());
    assert_eq!(metadata.version, "1.0");
}

#[tokio::test]
async fn metadata_is_written_when_no_keywords_are_produced() {
    let dir = tempdir().expect("tempdir");
    let pipeline = SyncPipeline::new(config(dir.path(), None), catalog(), clock())
        .expect("pipeline")
        .with_source(Box::new(EmptySource));
    let summary = pipeline.run_once().await.expect("run");

    assert_eq!(summary.total_keywords, 0);
    assert_eq!(summary.trending_path, None);
    assert!(!dir.path().join("trending").exists());

    let metadata = pipeline.store().read_metadata().await.expect("metadata");
    assert_eq!(metadata.categories.len(), 10);

    let games = pipeline.store().read_category("games").await.expect("empty category file");
    assert!(games.keywords.is_empty());
}

#[tokio::test]
async fn run_summary_serializes_for_callers() {
    let dir = tempdir().expect("tempdir");
    let pipeline = SyncPipeline::new(config(dir.path(), Some(vec!["games"])), catalog(), clock())
        .expect("pipeline");
    let summary = pipeline.run_once().await.expect("run");

    let value = serde_json::to_value(&summary).expect("serialize summary");
    assert_eq!(value["run_id"], summary.run_id.to_string());
    assert_eq!(value["source_id"], "sample");
    assert_eq!(value["total_keywords"], 50);
    assert_eq!(value["trending_keywords"], 50);
    assert_eq!(value["trending_path"], "trending/2026-02-24.json");
    assert_eq!(value["metadata_path"], "metadata.json");
    assert_eq!(value["categories"][0]["category"], "games");
    assert_eq!(value["categories"][0]["keywords"], 50);
    assert_eq!(value["written"].as_array().map(Vec::len), Some(3));
}

#[tokio::test]
async fn fetch_error_aborts_the_run_without_trending_or_metadata() {
    let dir = tempdir().expect("tempdir");
    let pipeline = SyncPipeline::new(config(dir.path(), None), catalog(), clock())
        .expect("pipeline")
        .with_source(Box::new(BrokenSource));
    let err = pipeline.run_once().await.expect_err("must fail");

    let rendered = format!("{err:#}");
    assert!(rendered.contains("fetching keywords for business"));
    assert!(rendered.contains("upstream unavailable"));
    assert!(dir.path().join("categories/games.json").exists());
    assert!(!dir.path().join("metadata.json").exists());
    assert!(!dir.path().join("trending").exists());
}

#[tokio::test]
async fn observer_sees_categories_in_order() {
    let dir = tempdir().expect("tempdir");
    let observer = RecordingObserver::default();
    let pipeline = SyncPipeline::new(
        config(dir.path(), Some(vec!["finance", "games"])),
        catalog(),
        clock(),
    )
    .expect("pipeline")
    .with_observer(Box::new(observer.clone()));
    pipeline.run_once().await.expect("run");

    let events = observer.events.lock().unwrap().clone();
    assert_eq!(
        events,
        vec!["start:games", "done:games:50", "start:finance", "done:finance:50"]
    );
}

#[tokio::test]
async fn delay_is_applied_between_categories_only() {
    let dir = tempdir().expect("tempdir");
    let cfg = SyncConfig {
        category_delay: Duration::from_millis(40),
        ..config(dir.path(), Some(vec!["games", "business", "finance"]))
    };
    let pipeline = SyncPipeline::new(cfg, catalog(), clock()).expect("pipeline");

    let started = Instant::now();
    pipeline.run_once().await.expect("run");
    assert!(started.elapsed() >= Duration::from_millis(80));
}
