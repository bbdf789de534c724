//! Prediction model handed out by a prediction source.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::{DocumentId, LayerId, Offset};

/// One raw prediction as produced by a recommender.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Document the span belongs to.
    pub document: DocumentId,
    /// Layer the prediction targets.
    pub layer: LayerId,
    /// Span position. Not validated.
    pub offset: Offset,
    /// Predicted label, unset for "no answer" placeholders.
    #[serde(default)]
    pub label: Option<String>,
    /// Confidence score.
    pub confidence: f64,
    /// Classifier that produced the prediction.
    pub classifier_id: String,
    /// Recommender configuration id.
    pub recommender_id: u64,
    /// Covered document text.
    #[serde(default)]
    pub covered_text: String,
}

/// Which documents a pool covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "scope", content = "document", rename_all = "snake_case")]
pub enum PoolScope {
    /// A single document.
    Document(DocumentId),
    /// Every document of the project.
    Project,
}

impl PoolScope {
    /// Whether `document` is inside this scope.
    pub fn contains(&self, document: DocumentId) -> bool {
        match self {
            Self::Document(d) => *d == document,
            Self::Project => true,
        }
    }
}

/// Raw predictions sharing one span position of one document.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionGroup {
    /// Document.
    pub document: DocumentId,
    /// Shared span position.
    pub position: Offset,
    /// Members in insertion order.
    pub predictions: Vec<Prediction>,
}

/// All live predictions of one (user, project).
///
/// Insertion order is preserved inside each span position; positions are
/// ordered by document, then by offset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Predictions {
    predictions: Vec<Prediction>,
}

impl Predictions {
    /// Create an empty model.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a prediction.
    pub fn push(&mut self, prediction: Prediction) {
        self.predictions.push(prediction);
    }

    /// Number of raw predictions.
    pub fn len(&self) -> usize {
        self.predictions.len()
    }

    /// Whether the model holds no predictions.
    pub fn is_empty(&self) -> bool {
        self.predictions.is_empty()
    }

    /// All raw predictions in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, Prediction> {
        self.predictions.iter()
    }

    /// Predictions for `layer` within `scope`, grouped by span position.
    ///
    /// Groups never span documents.
    pub fn candidates_for_layer(&self, layer: LayerId, scope: PoolScope) -> Vec<PredictionGroup> {
        let mut by_position: BTreeMap<(DocumentId, Offset), Vec<Prediction>> = BTreeMap::new();
        for prediction in &self.predictions {
            if prediction.layer != layer || !scope.contains(prediction.document) {
                continue;
            }
            by_position
                .entry((prediction.document, prediction.offset))
                .or_default()
                .push(prediction.clone());
        }

        by_position
            .into_iter()
            .map(|((document, position), predictions)| PredictionGroup {
                document,
                position,
                predictions,
            })
            .collect()
    }

    /// Resolve a UI selection back to the prediction that produced it.
    ///
    /// When several classifiers predicted the same label at the same span,
    /// the first one inserted wins.
    pub fn lookup(&self, document: DocumentId, offset: Offset, label: &str) -> Option<&Prediction> {
        self.predictions.iter().find(|p| {
            p.document == document && p.offset == offset && p.label.as_deref() == Some(label)
        })
    }
}

impl FromIterator<Prediction> for Predictions {
    fn from_iter<I: IntoIterator<Item = Prediction>>(iter: I) -> Self {
        let mut model = Self::new();
        for prediction in iter {
            model.push(prediction);
        }
        model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prediction(doc: u64, layer: u64, begin: u32, label: Option<&str>, clf: &str) -> Prediction {
        Prediction {
            document: DocumentId(doc),
            layer: LayerId(layer),
            offset: Offset::unchecked(begin, begin + 3, begin, begin + 1),
            label: label.map(str::to_string),
            confidence: 0.5,
            classifier_id: clf.to_string(),
            recommender_id: 1,
            covered_text: "abc".to_string(),
        }
    }

    #[test]
    fn test_grouping_by_position_and_document() {
        let model: Predictions = vec![
            prediction(2, 1, 0, Some("PER"), "a"),
            prediction(1, 1, 10, Some("LOC"), "a"),
            prediction(1, 1, 0, Some("PER"), "a"),
            prediction(1, 1, 10, Some("ORG"), "b"),
            prediction(1, 9, 10, Some("ORG"), "b"),
        ]
        .into_iter()
        .collect();

        let groups = model.candidates_for_layer(LayerId(1), PoolScope::Project);
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].document, DocumentId(1));
        assert_eq!(groups[0].position.begin_char, 0);
        assert_eq!(groups[1].predictions.len(), 2);
        assert_eq!(groups[1].predictions[0].label.as_deref(), Some("LOC"));
        assert_eq!(groups[2].document, DocumentId(2));
    }

    #[test]
    fn test_document_scope() {
        let model: Predictions = vec![
            prediction(1, 1, 0, Some("PER"), "a"),
            prediction(2, 1, 0, Some("PER"), "a"),
        ]
        .into_iter()
        .collect();

        let groups = model.candidates_for_layer(LayerId(1), PoolScope::Document(DocumentId(2)));
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].document, DocumentId(2));
    }

    #[test]
    fn test_lookup_first_inserted_wins() {
        let model: Predictions = vec![
            prediction(1, 1, 0, Some("PER"), "first"),
            prediction(1, 1, 0, Some("PER"), "second"),
            prediction(1, 1, 0, None, "third"),
        ]
        .into_iter()
        .collect();

        let offset = Offset::unchecked(0, 3, 0, 1);
        let found = model.lookup(DocumentId(1), offset, "PER").unwrap();
        assert_eq!(found.classifier_id, "first");
        assert!(model.lookup(DocumentId(1), offset, "LOC").is_none());
    }
}
