//! Performance benchmarks for query selection.
//!
//! Run with: `cargo bench --bench selection`
//!
//! ## Performance Targets
//!
//! | Operation | Target | Notes |
//! |-----------|--------|-------|
//! | Full pipeline, 10k candidates | <10ms | Filter, partition, margin, select |
//! | Reselection after feedback | <5ms | No prediction source access |

use criterion::{
    black_box, criterion_group, criterion_main,
    BenchmarkId, Criterion, Throughput,
};

use active_query::filter::{self, AdjudicationIndex};
use active_query::pool::materialize;
use active_query::selector::{select_after_feedback, select_from_pool};
use active_query::{
    CandidateGroup, ChangeLocation, DecisionLedgerEntry, DocumentId, FamilyRules, LayerId, Offset, PoolScope,
    Prediction, Predictions, UserAction, UserId,
};

const LABELS: [&str; 5] = ["PER", "LOC", "ORG", "MISC", "EVENT"];
const CLASSIFIERS: [&str; 3] = ["OpenNlpNer", "StringMatchingRecommender", "spacy"];

/// Build a pool of roughly `size` candidates over ten documents.
fn make_pool(size: usize) -> Vec<CandidateGroup> {
    let model: Predictions = (0..size)
        .map(|i| {
            let token = (i / 4) as u32;
            Prediction {
                document: DocumentId((i % 10) as u64),
                layer: LayerId(1),
                offset: Offset::unchecked(token * 6, token * 6 + 5, token, token + 1),
                label: Some(LABELS[i % LABELS.len()].to_string()),
                // Deterministic spread over [0, 1).
                confidence: ((i * 7919) % 1000) as f64 / 1000.0,
                classifier_id: CLASSIFIERS[i % CLASSIFIERS.len()].to_string(),
                recommender_id: (i % CLASSIFIERS.len()) as u64,
                covered_text: String::new(),
            }
        })
        .collect();
    materialize(model.candidates_for_layer(LayerId(1), PoolScope::Project), &FamilyRules::default())
}

/// Benchmark the filter-to-selection pipeline on a built pool.
fn bench_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline");

    for size in [100, 1_000, 10_000] {
        let pool = make_pool(size);
        let rejected: Vec<DecisionLedgerEntry> = pool
            .iter()
            .flat_map(|g| g.iter())
            .step_by(10)
            .map(|c| {
                DecisionLedgerEntry::for_candidate(
                    UserId::new("bench"),
                    LayerId(1),
                    c,
                    UserAction::Rejected,
                    ChangeLocation::default(),
                    chrono::Utc::now(),
                )
            })
            .collect();
        let index = AdjudicationIndex::from_entries(&rejected, None);

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("candidates", size), &pool, |b, pool| {
            b.iter(|| select_from_pool(&filter::apply(black_box(pool), &index)))
        });
    }

    group.finish();
}

/// Benchmark reselection after one piece of feedback.
fn bench_reselection(c: &mut Criterion) {
    let mut group = c.benchmark_group("reselection");

    for size in [100, 1_000, 10_000] {
        let pool = filter::minimal(&make_pool(size));
        let current = select_from_pool(&pool).map(|m| m.primary);

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::new("candidates", size), &pool, |b, pool| {
            b.iter(|| current.as_ref().map(|c| select_after_feedback(black_box(c), pool)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_pipeline, bench_reselection);
criterion_main!(benches);
