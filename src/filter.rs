//! Filter pipeline.
//!
//! Three ordered, idempotent stages, each returning a new pool:
//!
//! 1. [`drop_null_labels`] removes "no answer" placeholders
//! 2. [`drop_duplicates`] keeps the first candidate per
//!    `(classifier_id, label, document)` within each group
//! 3. [`drop_adjudicated`] removes candidates the human already rejected
//!    or skipped
//!
//! Groups emptied by a stage are dropped from its output.

use std::collections::{BTreeSet, HashSet};

use chrono::{DateTime, Utc};

use crate::engine::EngineError;
use crate::store::DecisionLedger;
use crate::types::{
    AdjudicationKey, Candidate, CandidateGroup, DecisionLedgerEntry, DocumentId, LayerId, UserAction, UserId,
};

/// Keep only the non-empty groups produced by `stage`.
fn each_group<F>(groups: &[CandidateGroup], stage: F) -> Vec<CandidateGroup>
where
    F: FnMut(&CandidateGroup) -> CandidateGroup,
{
    groups.iter().map(stage).filter(|g| !g.is_empty()).collect()
}

/// Stage 1: drop candidates with an unset label.
pub fn drop_null_labels(groups: &[CandidateGroup]) -> Vec<CandidateGroup> {
    each_group(groups, |group| group.filtered(Candidate::has_label))
}

/// Stage 2: drop later duplicates of `(classifier_id, label, document)`
/// within each group.
pub fn drop_duplicates(groups: &[CandidateGroup]) -> Vec<CandidateGroup> {
    each_group(groups, |group| {
        let mut seen = HashSet::new();
        group.filtered(|c| seen.insert(c.dedup_key()))
    })
}

/// Set of `(document, begin_token, end_token, label)` keys the human has
/// settled.
///
/// Membership is a set test: an item rejected twice is filtered once.
#[derive(Debug, Clone, Default)]
pub struct AdjudicationIndex {
    keys: HashSet<AdjudicationKey>,
}

impl AdjudicationIndex {
    /// Index `Rejected` and `Skipped` entries.
    ///
    /// With a `skip_marker`, only skips recorded at or after the marker
    /// count; earlier skips become eligible again. Rejections always count.
    /// Entries with inconsistent offsets are logged and ignored.
    pub fn from_entries<'a, I>(entries: I, skip_marker: Option<DateTime<Utc>>) -> Self
    where
        I: IntoIterator<Item = &'a DecisionLedgerEntry>,
    {
        let mut keys = HashSet::new();
        for entry in entries {
            let suppresses = match entry.action {
                UserAction::Rejected => true,
                UserAction::Skipped => skip_marker.map_or(true, |marker| entry.timestamp >= marker),
                UserAction::Shown | UserAction::Accepted => false,
            };
            if !suppresses {
                continue;
            }
            if let Err(e) = entry.offset.validate() {
                tracing::warn!(
                    entry_id = %entry.id,
                    document = %entry.document,
                    error = %e,
                    "Ignoring ledger entry with inconsistent offset"
                );
                continue;
            }
            keys.insert(entry.adjudication_key());
        }
        Self { keys }
    }

    /// Whether the candidate has been settled.
    pub fn contains(&self, candidate: &Candidate) -> bool {
        self.keys.contains(&candidate.adjudication_key())
    }

    /// Number of distinct settled keys.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether nothing has been settled.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Stage 3: drop candidates present in the adjudication index.
pub fn drop_adjudicated(groups: &[CandidateGroup], index: &AdjudicationIndex) -> Vec<CandidateGroup> {
    each_group(groups, |group| group.filtered(|c| !index.contains(c)))
}

/// Stages 1 and 2.
pub fn minimal(groups: &[CandidateGroup]) -> Vec<CandidateGroup> {
    drop_duplicates(&drop_null_labels(groups))
}

/// All three stages, in order.
pub fn apply(groups: &[CandidateGroup], index: &AdjudicationIndex) -> Vec<CandidateGroup> {
    drop_adjudicated(&minimal(groups), index)
}

/// Distinct documents of a pool, ascending.
pub fn documents_of(groups: &[CandidateGroup]) -> BTreeSet<DocumentId> {
    groups.iter().map(|g| g.document).collect()
}

/// Read the ledger for every document of the pool and index it.
pub async fn load_index<L: DecisionLedger>(
    ledger: &L,
    user: &UserId,
    layer: LayerId,
    documents: &BTreeSet<DocumentId>,
    skip_marker: Option<DateTime<Utc>>,
) -> Result<AdjudicationIndex, EngineError> {
    let mut entries = Vec::new();
    for document in documents {
        let mut found = ledger
            .entries_for(user, *document, layer)
            .await
            .map_err(EngineError::from_ledger_read)?;
        entries.append(&mut found);
    }
    let index = AdjudicationIndex::from_entries(&entries, skip_marker);
    tracing::debug!(
        user = %user,
        layer = %layer,
        entries = entries.len(),
        settled = index.len(),
        "Adjudication index loaded"
    );
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChangeLocation, ClassifierFamily, LedgerEntryId, Offset};
    use chrono::Duration;

    fn candidate(doc: u64, begin: u32, label: &str, clf: &str) -> Candidate {
        Candidate::new(
            DocumentId(doc),
            Offset::unchecked(begin * 10, begin * 10 + 5, begin, begin + 1),
            label,
            0.5,
            clf,
            1,
            "text",
            ClassifierFamily::Statistical,
        )
    }

    fn group(candidates: Vec<Candidate>) -> CandidateGroup {
        let first = &candidates[0];
        CandidateGroup::new(first.document, first.offset, candidates)
    }

    fn entry(c: &Candidate, action: UserAction, timestamp: DateTime<Utc>) -> DecisionLedgerEntry {
        DecisionLedgerEntry {
            id: LedgerEntryId::generate(),
            user: UserId::new("alice"),
            document: c.document,
            layer: LayerId(1),
            offset: c.offset,
            label: c.label.clone(),
            action,
            change_location: ChangeLocation::ActiveLearningSidebar,
            timestamp,
        }
    }

    #[test]
    fn test_null_labels_dropped_and_empty_groups_removed() {
        let pool = vec![
            group(vec![candidate(1, 1, "", "a")]),
            group(vec![candidate(1, 2, "PER", "a"), candidate(1, 2, "", "b")]),
        ];
        let out = drop_null_labels(&pool);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].len(), 1);
    }

    #[test]
    fn test_duplicates_first_encounter_wins() {
        let mut second = candidate(1, 1, "PER", "a");
        second.confidence = 0.9;
        let pool = vec![group(vec![
            candidate(1, 1, "PER", "a"),
            second,
            candidate(1, 1, "PER", "b"),
            candidate(1, 1, "LOC", "a"),
        ])];
        let out = drop_duplicates(&pool);
        assert_eq!(out[0].len(), 3);
        assert_eq!(out[0].candidates[0].confidence, 0.5);
    }

    #[test]
    fn test_duplicates_tracked_per_group() {
        let pool = vec![
            group(vec![candidate(1, 1, "PER", "a"), candidate(1, 1, "PER", "a")]),
            group(vec![candidate(1, 2, "PER", "a"), candidate(1, 2, "PER", "a")]),
        ];
        let out = drop_duplicates(&pool);
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|g| g.len() == 1));
    }

    #[test]
    fn test_stages_are_idempotent() {
        let pool = vec![group(vec![
            candidate(1, 1, "PER", "a"),
            candidate(1, 1, "PER", "a"),
            candidate(1, 1, "", "a"),
        ])];
        let once = minimal(&pool);
        assert_eq!(minimal(&once), once);
    }

    #[test]
    fn test_adjudicated_rejected_and_skipped_dropped() {
        let rejected = candidate(1, 1, "ORG", "a");
        let skipped = candidate(1, 2, "PER", "a");
        let shown = candidate(1, 3, "LOC", "a");
        let now = Utc::now();
        let entries = vec![
            entry(&rejected, UserAction::Rejected, now),
            entry(&skipped, UserAction::Skipped, now),
            entry(&shown, UserAction::Shown, now),
        ];
        let index = AdjudicationIndex::from_entries(&entries, None);
        let pool = vec![group(vec![rejected]), group(vec![skipped]), group(vec![shown])];

        let out = drop_adjudicated(&pool, &index);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].candidates[0].label, "LOC");
    }

    #[test]
    fn test_adjudication_ignores_classifier() {
        let rejected = candidate(1, 1, "ORG", "a");
        let index = AdjudicationIndex::from_entries(&[entry(&rejected, UserAction::Rejected, Utc::now())], None);
        assert!(index.contains(&candidate(1, 1, "ORG", "other-classifier")));
        assert!(!index.contains(&candidate(2, 1, "ORG", "a")));
    }

    #[test]
    fn test_rejected_twice_is_one_key() {
        let c = candidate(1, 1, "ORG", "a");
        let now = Utc::now();
        let index = AdjudicationIndex::from_entries(
            &[entry(&c, UserAction::Rejected, now), entry(&c, UserAction::Rejected, now)],
            None,
        );
        assert_eq!(index.len(), 1);
        assert_eq!(drop_adjudicated(&[group(vec![c])], &index).len(), 0);
    }

    #[test]
    fn test_skip_marker_reopens_earlier_skips_only() {
        let old_skip = candidate(1, 1, "PER", "a");
        let new_skip = candidate(1, 2, "PER", "a");
        let rejected = candidate(1, 3, "PER", "a");
        let marker = Utc::now();
        let entries = vec![
            entry(&old_skip, UserAction::Skipped, marker - Duration::minutes(5)),
            entry(&new_skip, UserAction::Skipped, marker + Duration::seconds(1)),
            entry(&rejected, UserAction::Rejected, marker - Duration::minutes(5)),
        ];
        let index = AdjudicationIndex::from_entries(&entries, Some(marker));

        assert!(!index.contains(&old_skip));
        assert!(index.contains(&new_skip));
        assert!(index.contains(&rejected));
    }

    #[test]
    fn test_inconsistent_ledger_entry_ignored() {
        let c = candidate(1, 1, "ORG", "a");
        let mut bad = entry(&c, UserAction::Rejected, Utc::now());
        bad.offset = Offset::unchecked(20, 10, 5, 1);
        let index = AdjudicationIndex::from_entries(&[bad], None);
        assert!(index.is_empty());
    }
}
