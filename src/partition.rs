//! Classifier partitioner.
//!
//! Confidence scores of different classifier families live on different
//! scales, so a group mixing families is split into one sub-group per
//! family before any margin is computed.

use crate::types::{CandidateGroup, ClassifierFamily};

/// Split a group by classifier family.
///
/// Sub-groups appear in order of each family's first member, and keep
/// their members in original order. A single-family group is returned
/// unchanged.
pub fn partition(group: &CandidateGroup) -> Vec<CandidateGroup> {
    let mut families: Vec<&ClassifierFamily> = Vec::new();
    for candidate in group.iter() {
        if !families.contains(&&candidate.family) {
            families.push(&candidate.family);
        }
    }

    if families.len() <= 1 {
        return vec![group.clone()];
    }

    tracing::trace!(
        document = %group.document,
        position = %group.position,
        families = families.len(),
        "Partitioning mixed-family group"
    );

    families
        .into_iter()
        .map(|family| group.filtered(|c| &c.family == family))
        .collect()
}

/// Partition every group of a pool.
pub fn partition_all(groups: &[CandidateGroup]) -> Vec<CandidateGroup> {
    groups.iter().flat_map(partition).collect()
}
