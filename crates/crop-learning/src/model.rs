//! The trained crop model: a decision tree plus its label decoder.
//!
//! A [`CropModel`] is created by [`Trainer::train`](crate::Trainer::train) or
//! loaded through [`ArtifactStore::load_pair`](crate::ArtifactStore::load_pair).
//! It is immutable once built; retraining produces a new one.

use crate::config::{SplitCriterion, TreeParams};
use crate::encoder::{CropQuery, FeatureEncoder, FeatureVector};
use crate::error::{CropLearningError, Result};
use crate::labels::LabelEncoder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::tree::decision_tree_classifier::{
    DecisionTreeClassifier, DecisionTreeClassifierParameters,
    SplitCriterion as TreeSplitCriterion,
};
use tracing::{debug, warn};

/// The concrete smartcore classifier persisted in the model artifact.
pub(crate) type TreeClassifier = DecisionTreeClassifier<f64, u32, DenseMatrix<f64>, Vec<u32>>;

/// Payload of the model artifact.
///
/// smartcore refuses to fit a single class, so a dataset with one distinct
/// crop is stored as a constant that answers every query with that label id.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) enum Classifier {
    Tree(TreeClassifier),
    Constant(u32),
}

impl Classifier {
    fn predict(&self, rows: &[Vec<f64>]) -> Result<Vec<u32>> {
        match self {
            Self::Tree(tree) => tree
                .predict(&DenseMatrix::from_2d_vec(&rows.to_vec()))
                .map_err(|e| CropLearningError::InferenceFailed(e.to_string())),
            Self::Constant(id) => Ok(vec![*id; rows.len()]),
        }
    }
}

/// Metadata shared by both artifacts of one training run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Identifies the training run; both artifact files carry the same id.
    pub training_id: String,
    /// Hash of the category ordering the model was trained with.
    pub schema_tag: String,
    pub feature_len: usize,
    pub trained_at: DateTime<Utc>,
}

/// A trained classifier and the label decoder fitted alongside it.
#[derive(Debug)]
pub struct CropModel {
    pub(crate) metadata: ModelMetadata,
    pub(crate) classifier: Classifier,
    pub(crate) labels: LabelEncoder,
    pub(crate) encoder: FeatureEncoder,
}

impl CropModel {
    pub(crate) fn from_parts(
        metadata: ModelMetadata,
        classifier: Classifier,
        labels: LabelEncoder,
        encoder: FeatureEncoder,
    ) -> Self {
        Self {
            metadata,
            classifier,
            labels,
            encoder,
        }
    }

    pub fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    pub fn labels(&self) -> &LabelEncoder {
        &self.labels
    }

    /// Crop names the model can return.
    pub fn classes(&self) -> &[String] {
        self.labels.classes()
    }

    /// Predict the top-1 crop for one query.
    ///
    /// # Errors
    ///
    /// [`CropLearningError::Decode`] if the classifier returns an id the label
    /// decoder does not know (mismatched artifacts), or
    /// [`CropLearningError::InferenceFailed`] if the classifier itself fails.
    pub fn predict(&self, query: &CropQuery) -> Result<String> {
        let features = self.encoder.encode_query(query);
        let id = self.predict_id(&features)?;
        let crop = self.decode(id)?;
        debug!("Predicted '{crop}' for {query}");
        Ok(crop.to_string())
    }

    /// Predict one crop per query, in order.
    pub fn predict_batch(&self, queries: &[CropQuery]) -> Result<Vec<String>> {
        if queries.is_empty() {
            return Ok(Vec::new());
        }
        let rows: Vec<Vec<f64>> = queries
            .iter()
            .map(|q| self.encoder.encode_query(q).to_f64_row())
            .collect();
        let ids = self.classify(&rows)?;
        ids.into_iter()
            .map(|id| self.decode(id).map(str::to_string))
            .collect()
    }

    fn predict_id(&self, features: &FeatureVector) -> Result<u32> {
        let ids = self.classify(&[features.to_f64_row()])?;
        ids.into_iter().next().ok_or_else(|| {
            CropLearningError::InferenceFailed("classifier returned no prediction".to_string())
        })
    }

    fn classify(&self, rows: &[Vec<f64>]) -> Result<Vec<u32>> {
        self.classifier.predict(rows)
    }

    fn decode(&self, id: u32) -> Result<&str> {
        self.labels.decode(id).inspect_err(|e| {
            warn!(
                training_id = %self.metadata.training_id,
                "Classifier and label decoder disagree: {e}"
            );
        })
    }
}

/// Fit a decision tree on encoded rows and label ids.
///
/// With a single distinct label there is nothing to split and the result is a
/// [`Classifier::Constant`].
pub(crate) fn fit_tree(
    features: &[FeatureVector],
    label_ids: &[u32],
    params: &TreeParams,
) -> Result<Classifier> {
    let Some(&first) = label_ids.first() else {
        return Err(CropLearningError::TrainingFailed(
            "no rows to fit".to_string(),
        ));
    };
    if label_ids.iter().all(|&id| id == first) {
        debug!("Single crop in dataset, storing constant classifier");
        return Ok(Classifier::Constant(first));
    }

    let rows: Vec<Vec<f64>> = features.iter().map(FeatureVector::to_f64_row).collect();
    let x = DenseMatrix::from_2d_vec(&rows);
    let y = label_ids.to_vec();

    let parameters = DecisionTreeClassifierParameters {
        criterion: match params.criterion {
            SplitCriterion::Gini => TreeSplitCriterion::Gini,
            SplitCriterion::Entropy => TreeSplitCriterion::Entropy,
            SplitCriterion::ClassificationError => TreeSplitCriterion::ClassificationError,
        },
        max_depth: params.max_depth,
        min_samples_leaf: params.min_samples_leaf,
        // smartcore stops splitting once n <= min_samples_split, while
        // TreeParams keeps the usual "split while n >= min_samples_split".
        min_samples_split: params.min_samples_split.saturating_sub(1),
        seed: Some(params.random_seed),
    };

    DecisionTreeClassifier::fit(&x, &y, parameters)
        .map(Classifier::Tree)
        .map_err(|e| CropLearningError::TrainingFailed(e.to_string()))
}
