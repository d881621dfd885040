//! Raw → canonical keyword mapping.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use kwt_core::{BidRange, Clock, CompetitionLevel, NormalizedKeywordRecord, RawKeywordRecord};

pub const DEFAULT_BID_CURRENCY: &str = "USD";

/// Fixed bid-strength mapping. Anything unrecognized, including a missing
/// value, lands on `Medium`.
pub fn competition_level_for(bid_strength: Option<&str>) -> CompetitionLevel {
    match bid_strength {
        Some("LOW") => CompetitionLevel::Low,
        Some("MEDIUM") => CompetitionLevel::Medium,
        Some("HIGH") => CompetitionLevel::High,
        Some("VERY_HIGH") => CompetitionLevel::VeryHigh,
        _ => CompetitionLevel::Medium,
    }
}

/// `"health-fitness"` → `"Health Fitness"`.
pub fn category_label(tag: &str) -> String {
    tag.split(|c: char| c == '-' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => {
                    let mut word: String = first.to_uppercase().collect();
                    word.push_str(&chars.as_str().to_lowercase());
                    word
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn normalize_record(raw: &RawKeywordRecord, now: DateTime<Utc>) -> NormalizedKeywordRecord {
    NormalizedKeywordRecord {
        id: raw.id.clone(),
        keyword: raw.keyword.clone(),
        search_popularity: raw.search_popularity.unwrap_or(0.0),
        competition_level: competition_level_for(raw.bid_strength.as_deref()),
        suggested_bid_range: raw.suggested_bid_amount.as_ref().map(|amount| BidRange {
            min: amount.min.unwrap_or(0.0),
            max: amount.max.unwrap_or(0.0),
            currency: amount
                .currency
                .clone()
                .unwrap_or_else(|| DEFAULT_BID_CURRENCY.to_string()),
        }),
        category: raw.category.as_deref().map(category_label).unwrap_or_default(),
        last_updated: now,
    }
}

/// Stamps each record with its own clock reading.
#[derive(Clone)]
pub struct Normalizer {
    clock: Arc<dyn Clock>,
}

impl Normalizer {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    pub fn normalize(&self, raw: &RawKeywordRecord) -> NormalizedKeywordRecord {
        normalize_record(raw, self.clock.now())
    }

    pub fn normalize_all(&self, raw: &[RawKeywordRecord]) -> Vec<NormalizedKeywordRecord> {
        raw.iter().map(|r| self.normalize(r)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use kwt_core::{FixedClock, RawBidAmount};

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 24, 12, 0, 0).single().unwrap()
    }

    #[test]
    fn bid_strength_mapping_is_fixed() {
        assert_eq!(competition_level_for(Some("LOW")), CompetitionLevel::Low);
        assert_eq!(competition_level_for(Some("MEDIUM")), CompetitionLevel::Medium);
        assert_eq!(competition_level_for(Some("HIGH")), CompetitionLevel::High);
        assert_eq!(competition_level_for(Some("VERY_HIGH")), CompetitionLevel::VeryHigh);
    }

    #[test]
    fn unrecognized_bid_strength_defaults_to_medium() {
        for input in [None, Some(""), Some("low"), Some("EXTREME"), Some("VERY HIGH")] {
            assert_eq!(competition_level_for(input), CompetitionLevel::Medium, "{input:?}");
        }
    }

    #[test]
    fn minimal_record_normalizes_without_failing() {
        let raw = RawKeywordRecord::minimal("k-1", "puzzle game");
        let normalized = normalize_record(&raw, at());
        assert_eq!(normalized.id, "k-1");
        assert_eq!(normalized.keyword, "puzzle game");
        assert_eq!(normalized.search_popularity, 0.0);
        assert_eq!(normalized.competition_level, CompetitionLevel::Medium);
        assert_eq!(normalized.suggested_bid_range, None);
        assert_eq!(normalized.category, "");
        assert_eq!(normalized.last_updated.to_rfc3339(), "2026-02-24T12:00:00+00:00");
    }

    #[test]
    fn present_but_empty_bid_amount_yields_zeroed_range() {
        let mut raw = RawKeywordRecord::minimal("k-2", "vpn app");
        raw.suggested_bid_amount = Some(RawBidAmount::default());
        let normalized = normalize_record(&raw, at());
        assert_eq!(
            normalized.suggested_bid_range,
            Some(BidRange {
                min: 0.0,
                max: 0.0,
                currency: DEFAULT_BID_CURRENCY.to_string(),
            })
        );
    }

    #[test]
    fn full_record_carries_bid_range_through() {
        let raw = RawKeywordRecord {
            id: "k-3".into(),
            keyword: "budget tracker".into(),
            search_popularity: Some(72.5),
            bid_strength: Some("HIGH".into()),
            suggested_bid_amount: Some(RawBidAmount {
                min: Some(1.03),
                max: Some(2.95),
                currency: Some("EUR".into()),
            }),
            category: Some("finance".into()),
        };
        let normalized = normalize_record(&raw, at());
        assert_eq!(normalized.search_popularity, 72.5);
        assert_eq!(normalized.competition_level, CompetitionLevel::High);
        assert_eq!(normalized.category, "Finance");
        let range = normalized.suggested_bid_range.expect("range");
        assert_eq!((range.min, range.max, range.currency.as_str()), (1.03, 2.95, "EUR"));
    }

    #[test]
    fn category_labels_are_title_cased() {
        assert_eq!(category_label("health-fitness"), "Health Fitness");
        assert_eq!(category_label("social-networking"), "Social Networking");
        assert_eq!(category_label("games"), "Games");
        assert_eq!(category_label("Health Fitness"), "Health Fitness");
        assert_eq!(category_label(""), "");
    }

    #[test]
    fn normalizer_stamps_from_clock() {
        let normalizer = Normalizer::new(Arc::new(FixedClock(at())));
        let out = normalizer.normalize_all(&[
            RawKeywordRecord::minimal("a", "one"),
            RawKeywordRecord::minimal("b", "two"),
        ]);
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|r| r.last_updated == at()));
    }
}
