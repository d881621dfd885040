//! Cross-category trending selection.

use kwt_core::NormalizedKeywordRecord;

pub const TRENDING_LIMIT: usize = 100;

/// Top `limit` records by popularity, highest first. The sort is stable, so
/// equal popularities keep their input order.
pub fn select_trending(
    records: &[NormalizedKeywordRecord],
    limit: usize,
) -> Vec<NormalizedKeywordRecord> {
    let mut ranked = records.to_vec();
    ranked.sort_by(|a, b| b.search_popularity.total_cmp(&a.search_popularity));
    ranked.truncate(limit);
    ranked
}
