//! Duplicate detection for analyzed candidates.
//!
//! Two records are duplicates when their canonical (English) names match
//! case-insensitively, or their formal names match case-insensitively and
//! their item counts are equal. The check runs against the in-memory
//! working set, never against the store.

use crate::models::AssessmentRecord;

pub fn is_duplicate(candidate: &AssessmentRecord, existing: &AssessmentRecord) -> bool {
    let same_canonical =
        candidate.canonical_name.to_lowercase() == existing.canonical_name.to_lowercase();
    let same_name_and_size = candidate.test_name.to_lowercase()
        == existing.test_name.to_lowercase()
        && candidate.item_count == existing.item_count;
    same_canonical || same_name_and_size
}

/// First record in `existing` that the candidate duplicates.
pub fn find_duplicate<'a>(
    candidate: &AssessmentRecord,
    existing: &'a [AssessmentRecord],
) -> Option<&'a AssessmentRecord> {
    existing
        .iter()
        .find(|record| record.id != candidate.id && is_duplicate(candidate, record))
}
