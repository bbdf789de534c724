//! Margin calculator.
//!
//! ## Algorithm
//!
//! - One candidate: the margin is its absolute confidence, its distance
//!   from the implicit decision boundary.
//! - Two or more: rank by confidence, descending; the margin is the
//!   smallest difference between two adjacent ranks. On equal differences
//!   the pair with the higher-ranked primary wins.
//!
//! Ranking is a stable sort, so candidates with equal confidence keep their
//! insertion order and the result is reproducible.

use crate::partition::partition_all;
use crate::types::{Candidate, CandidateGroup, Margin};

/// Margin of one family-homogeneous group. `None` for an empty group.
pub fn margin(group: &CandidateGroup) -> Option<Margin> {
    match group.candidates.as_slice() {
        [] => None,
        [only] => Some(Margin::single(only.clone())),
        members => {
            let mut ranked: Vec<&Candidate> = members.iter().collect();
            ranked.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

            let mut best = 0;
            let mut best_diff = f64::INFINITY;
            for (i, pair) in ranked.windows(2).enumerate() {
                let diff = (pair[0].confidence - pair[1].confidence).abs();
                if diff < best_diff {
                    best = i;
                    best_diff = diff;
                }
            }

            Some(Margin::pair(ranked[best].clone(), ranked[best + 1].clone()))
        }
    }
}

/// Partition every group by family and compute one margin per sub-group,
/// in pool order.
pub fn margins(groups: &[CandidateGroup]) -> Vec<Margin> {
    partition_all(groups).iter().filter_map(margin).collect()
}
