//! Core keyword domain model and clock abstraction for KWT.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Suggested bid amount block as returned by the keyword-recommendation endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RawBidAmount {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}

/// External-API keyword shape handed from sources into the sync pipeline.
///
/// Everything except `id` and `keyword` is optional because upstream payloads
/// are not guaranteed to carry them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawKeywordRecord {
    pub id: String,
    pub keyword: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_popularity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bid_strength: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_bid_amount: Option<RawBidAmount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl RawKeywordRecord {
    pub fn minimal(id: impl Into<String>, keyword: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            keyword: keyword.into(),
            search_popularity: None,
            bid_strength: None,
            suggested_bid_amount: None,
            category: None,
        }
    }
}

/// Upstream bid-strength tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BidStrength {
    Low,
    Medium,
    High,
    VeryHigh,
}

impl BidStrength {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::VeryHigh => "VERY_HIGH",
        }
    }
}

impl fmt::Display for BidStrength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Internal four-tier competition rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CompetitionLevel {
    Low,
    #[default]
    Medium,
    High,
    VeryHigh,
}

impl CompetitionLevel {
    pub const ALL: [CompetitionLevel; 4] = [
        CompetitionLevel::VeryHigh,
        CompetitionLevel::High,
        CompetitionLevel::Medium,
        CompetitionLevel::Low,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::VeryHigh => "very_high",
        }
    }
}

impl fmt::Display for CompetitionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BidRange {
    pub min: f64,
    pub max: f64,
    pub currency: String,
}

/// Canonical persisted keyword representation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedKeywordRecord {
    pub id: String,
    pub keyword: String,
    pub search_popularity: f64,
    pub competition_level: CompetitionLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_bid_range: Option<BidRange>,
    pub category: String,
    pub last_updated: DateTime<Utc>,
}

/// Time source for everything that stamps or names output.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to a single instant; used for reproducible runs and tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
