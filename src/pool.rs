//! Candidate pool builder.
//!
//! Pulls the live predictions of one layer from the prediction source and
//! materializes them as per-span groups of [`Candidate`]s. Malformed
//! predictions are logged and excluded one by one; they never abort the
//! build.

use crate::engine::EngineError;
use crate::policy::FamilyRules;
use crate::store::{Prediction, PredictionGroup, PredictionSource, PoolScope};
use crate::types::{Candidate, CandidateGroup, LayerId, ProjectId, UserId};

/// Build the candidate pool for `layer` within `scope`.
///
/// No predictions yet is a successfully built, empty pool. Only a failing
/// source is an error.
pub async fn build_pool<P: PredictionSource>(
    source: &P,
    families: &FamilyRules,
    user: &UserId,
    project: ProjectId,
    layer: LayerId,
    scope: PoolScope,
) -> Result<Vec<CandidateGroup>, EngineError> {
    let predictions = source
        .get_predictions(user, project)
        .await
        .map_err(EngineError::from_source)?;

    let Some(predictions) = predictions else {
        tracing::debug!(user = %user, project = %project, "No predictions available yet");
        return Ok(Vec::new());
    };

    let groups = materialize(predictions.candidates_for_layer(layer, scope), families);
    tracing::debug!(
        user = %user,
        project = %project,
        layer = %layer,
        groups = groups.len(),
        "Candidate pool built"
    );
    Ok(groups)
}

/// Turn raw prediction groups into candidate groups.
///
/// Groups left with no valid member are dropped.
pub fn materialize(groups: Vec<PredictionGroup>, families: &FamilyRules) -> Vec<CandidateGroup> {
    groups
        .into_iter()
        .filter_map(|group| {
            let candidates: Vec<Candidate> = group
                .predictions
                .into_iter()
                .filter_map(|p| to_candidate(p, families))
                .collect();
            if candidates.is_empty() {
                None
            } else {
                Some(CandidateGroup::new(group.document, group.position, candidates))
            }
        })
        .collect()
}

/// Convert one prediction, or log why it is excluded.
pub fn to_candidate(prediction: Prediction, families: &FamilyRules) -> Option<Candidate> {
    if let Err(e) = prediction.offset.validate() {
        tracing::warn!(
            document = %prediction.document,
            classifier_id = %prediction.classifier_id,
            error = %e,
            "Excluding prediction with inconsistent offset"
        );
        return None;
    }

    if !prediction.confidence.is_finite() {
        tracing::warn!(
            document = %prediction.document,
            offset = %prediction.offset,
            classifier_id = %prediction.classifier_id,
            "Excluding prediction with non-finite confidence"
        );
        return None;
    }

    let Some(family) = families.resolve(&prediction.classifier_id) else {
        tracing::warn!(
            document = %prediction.document,
            offset = %prediction.offset,
            "Excluding prediction without classifier id"
        );
        return None;
    };

    Some(Candidate::new(
        prediction.document,
        prediction.offset,
        prediction.label.unwrap_or_default(),
        prediction.confidence,
        prediction.classifier_id,
        prediction.recommender_id,
        prediction.covered_text,
        family,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryPredictionSource, Predictions};
    use crate::types::{ClassifierFamily, DocumentId, Offset};

    fn prediction(doc: u64, offset: Offset, label: Option<&str>, confidence: f64, clf: &str) -> Prediction {
        Prediction {
            document: DocumentId(doc),
            layer: LayerId(1),
            offset,
            label: label.map(str::to_string),
            confidence,
            classifier_id: clf.to_string(),
            recommender_id: 1,
            covered_text: String::new(),
        }
    }

    fn span(begin: u32) -> Offset {
        Offset::unchecked(begin, begin + 4, begin, begin + 1)
    }

    #[test]
    fn test_to_candidate_resolves_family() {
        let families = FamilyRules::default();
        let c = to_candidate(prediction(1, span(0), Some("PER"), 0.7, "OpenNlpNer"), &families).unwrap();
        assert_eq!(c.family, ClassifierFamily::Statistical);
        assert_eq!(c.label, "PER");
    }

    #[test]
    fn test_unset_label_becomes_empty() {
        let families = FamilyRules::default();
        let c = to_candidate(prediction(1, span(0), None, 0.7, "OpenNlpNer"), &families).unwrap();
        assert!(!c.has_label());
    }

    #[test]
    fn test_malformed_predictions_are_excluded() {
        let families = FamilyRules::default();
        let reversed = Offset::unchecked(20, 10, 0, 1);
        assert!(to_candidate(prediction(1, reversed, Some("PER"), 0.7, "x"), &families).is_none());
        assert!(to_candidate(prediction(1, span(0), Some("PER"), f64::NAN, "x"), &families).is_none());
        assert!(to_candidate(prediction(1, span(0), Some("PER"), 0.7, ""), &families).is_none());
    }

    #[test]
    fn test_materialize_drops_groups_left_empty() {
        let families = FamilyRules::default();
        let reversed = Offset::unchecked(20, 10, 0, 1);
        let model: Predictions = vec![
            prediction(1, reversed, Some("PER"), 0.7, "x"),
            prediction(1, span(30), Some("LOC"), 0.7, "x"),
        ]
        .into_iter()
        .collect();

        let groups = materialize(model.candidates_for_layer(LayerId(1), PoolScope::Project), &families);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].candidates[0].label, "LOC");
    }

    #[tokio::test]
    async fn test_build_pool_without_predictions_is_empty() {
        let source = InMemoryPredictionSource::new();
        let pool = build_pool(
            &source,
            &FamilyRules::default(),
            &UserId::new("alice"),
            ProjectId(1),
            LayerId(1),
            PoolScope::Project,
        )
        .await
        .unwrap();
        assert!(pool.is_empty());
    }

    #[tokio::test]
    async fn test_build_pool_surfaces_unavailable_source() {
        let source = InMemoryPredictionSource::new();
        source.set_offline(true);
        let err = build_pool(
            &source,
            &FamilyRules::default(),
            &UserId::new("alice"),
            ProjectId(1),
            LayerId(1),
            PoolScope::Project,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, EngineError::PredictionSourceUnavailable(_)));
    }

    #[tokio::test]
    async fn test_build_pool_project_scope_concatenates_documents() {
        let source = InMemoryPredictionSource::new();
        let user = UserId::new("alice");
        source.set_predictions(
            user.clone(),
            ProjectId(1),
            vec![
                prediction(1, span(0), Some("PER"), 0.7, "OpenNlp"),
                prediction(2, span(0), Some("PER"), 0.7, "OpenNlp"),
            ]
            .into_iter()
            .collect(),
        );

        let pool = build_pool(&source, &FamilyRules::default(), &user, ProjectId(1), LayerId(1), PoolScope::Project)
            .await
            .unwrap();
        assert_eq!(pool.len(), 2);
        assert_ne!(pool[0].document, pool[1].document);
    }
}
