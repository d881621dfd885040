//! Keyword source contracts, the embedded catalog, and the sample generator.

pub mod auth;
pub mod catalog;

use std::sync::Arc;

use async_trait::async_trait;
use kwt_core::{BidStrength, RawBidAmount, RawKeywordRecord};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

pub use auth::{
    AppleSearchAdsCredentials, AuthError, BearerToken, JwtTokenProvider, TokenProvider,
};
pub use catalog::{Catalog, CatalogError, CategoryVocabulary};

pub const SAMPLE_BASE_POPULARITY: f64 = 95.0;
pub const SAMPLE_POPULARITY_STEP: f64 = 1.5;
pub const SAMPLE_POPULARITY_FLOOR: f64 = 10.0;
pub const SAMPLE_CURRENCY: &str = "USD";

/// Per-run state handed to every fetch.
#[derive(Debug, Clone)]
pub struct FetchContext {
    pub run_id: Uuid,
    pub bearer_token: Option<BearerToken>,
}

impl FetchContext {
    pub fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            bearer_token: None,
        }
    }

    pub fn with_bearer_token(mut self, token: BearerToken) -> Self {
        self.bearer_token = Some(token);
        self
    }
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("{0}")]
    Message(String),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

#[async_trait]
pub trait KeywordSource: Send + Sync {
    fn source_id(&self) -> &'static str;

    async fn fetch_keywords(
        &self,
        ctx: &FetchContext,
        category: &str,
    ) -> Result<Vec<RawKeywordRecord>, SourceError>;
}

/// Stand-in for the keyword-recommendation endpoint. Builds records from the
/// catalog vocabulary with popularity falling off by list position.
#[derive(Debug, Clone)]
pub struct SampleKeywordSource {
    catalog: Arc<Catalog>,
}

impl SampleKeywordSource {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }

    pub fn generate(&self, category: &str) -> Vec<RawKeywordRecord> {
        self.catalog
            .keywords_for(category)
            .iter()
            .enumerate()
            .map(|(index, keyword)| sample_record(category, index, keyword))
            .collect()
    }
}

#[async_trait]
impl KeywordSource for SampleKeywordSource {
    fn source_id(&self) -> &'static str {
        "sample"
    }

    async fn fetch_keywords(
        &self,
        ctx: &FetchContext,
        category: &str,
    ) -> Result<Vec<RawKeywordRecord>, SourceError> {
        debug!(run_id = %ctx.run_id, category, "generating sample keywords");
        Ok(self.generate(category))
    }
}

pub fn sample_popularity(index: usize) -> f64 {
    (SAMPLE_BASE_POPULARITY - index as f64 * SAMPLE_POPULARITY_STEP).max(SAMPLE_POPULARITY_FLOOR)
}

pub fn bid_strength_for_popularity(popularity: f64) -> BidStrength {
    if popularity > 80.0 {
        BidStrength::VeryHigh
    } else if popularity > 60.0 {
        BidStrength::High
    } else if popularity > 40.0 {
        BidStrength::Medium
    } else {
        BidStrength::Low
    }
}

/// Rounds from the exact binary value of `value`. `0.3 + 0.815` is stored just
/// below 1.115 and must land on 1.11; scaling by 100 first would give 1.12.
pub fn round_to_cents(value: f64) -> f64 {
    format!("{value:.2}").parse().unwrap_or(value)
}

fn sample_record(category: &str, index: usize, keyword: &str) -> RawKeywordRecord {
    let popularity = sample_popularity(index);
    RawKeywordRecord {
        id: Uuid::new_v4().to_string(),
        keyword: keyword.to_string(),
        search_popularity: Some(popularity),
        bid_strength: Some(bid_strength_for_popularity(popularity).as_str().to_string()),
        suggested_bid_amount: Some(RawBidAmount {
            min: Some(round_to_cents(0.3 + popularity / 100.0)),
            max: Some(round_to_cents(1.5 + popularity / 50.0)),
            currency: Some(SAMPLE_CURRENCY.to_string()),
        }),
        category: Some(category.to_string()),
    }
}
