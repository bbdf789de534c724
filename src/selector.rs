//! Query selector.
//!
//! Picks the globally smallest margin. Ties go to the margin seen first,
//! so for a fixed pool and ledger snapshot the choice is always the same.

use crate::margin::margins;
use crate::types::{pool_size, Candidate, CandidateGroup, Margin, Offset};

/// Margin with the smallest value, first-seen on ties.
///
/// `None` means nothing is left to review.
pub fn select(margins: Vec<Margin>) -> Option<Margin> {
    let mut best: Option<Margin> = None;
    for margin in margins {
        if best.as_ref().map_or(true, |current| margin.value < current.value) {
            best = Some(margin);
        }
    }
    best
}

/// Partition, compute margins and select over a filtered pool.
pub fn select_from_pool(groups: &[CandidateGroup]) -> Option<Margin> {
    select(margins(groups))
}

/// Remove every candidate that denotes the same suggestion as `settled`
/// (same document, offset and label, any classifier).
pub fn remove_suggestion(groups: &[CandidateGroup], settled: &Candidate) -> Vec<CandidateGroup> {
    groups
        .iter()
        .map(|group| group.filtered(|c| !c.same_suggestion(settled)))
        .filter(|group| !group.is_empty())
        .collect()
}

/// Working pool and next recommendation after a piece of feedback.
#[derive(Debug, Clone, PartialEq)]
pub struct Reselection {
    /// Pool with the settled suggestion removed.
    pub pool: Vec<CandidateGroup>,
    /// Next recommendation, if any.
    pub margin: Option<Margin>,
}

/// Drop the suggestion the human just settled and select again, without
/// going back to the prediction source.
///
/// The pool never grows on this path: a review sweep shrinks monotonically
/// until it is empty.
pub fn select_after_feedback(current: &Candidate, previous_pool: &[CandidateGroup]) -> Reselection {
    let pool = remove_suggestion(previous_pool, current);
    let margin = select_from_pool(&pool);
    tracing::debug!(
        before = pool_size(previous_pool),
        after = pool_size(&pool),
        exhausted = margin.is_none(),
        "Reselected after feedback"
    );
    Reselection { pool, margin }
}

/// Simple variant: the single candidate with the lowest absolute confidence,
/// skipping spans the human has already annotated by hand.
///
/// `groups` and `annotated` must belong to the same document.
pub fn select_lowest_confidence(groups: &[CandidateGroup], annotated: &[Offset]) -> Option<Margin> {
    let mut best: Option<&Candidate> = None;
    for candidate in groups.iter().flat_map(CandidateGroup::iter) {
        if annotated.iter().any(|span| span.overlaps_chars(&candidate.offset)) {
            continue;
        }
        if best.map_or(true, |current| candidate.confidence.abs() < current.confidence.abs()) {
            best = Some(candidate);
        }
    }
    best.cloned().map(Margin::single)
}
