//! The training routine.
//!
//! [`Trainer::train`] runs these stages in order:
//!
//! 1. **Loading**: read and normalize the CSV ([`Dataset::from_csv`])
//! 2. **Encoding**: one-hot encode every row and fit the label encoder
//! 3. **Fitting**: fit the decision tree with the configured seed
//! 4. **Saving**: write both artifacts atomically
//!
//! Any failure before **Saving** leaves the artifact directory untouched.
//!
//! # Example
//!
//! ```rust,ignore
//! use crop_learning::{LearningConfig, Trainer};
//!
//! let config = LearningConfig::builder().base_dir("ml").build()?;
//! let trainer = Trainer::builder()
//!     .config(config)
//!     .on_progress(|u| println!("{:.0}% - {}", u.progress * 100.0, u.message))
//!     .build();
//!
//! let result = trainer.train()?;
//! println!("trained on {} rows, {} crops", result.rows, result.classes.len());
//! ```
//!
//! The tree is fitted on every row. There is no held-out split, so the run
//! reports no accuracy figure.

use crate::artifact::ArtifactStore;
use crate::config::LearningConfig;
use crate::dataset::Dataset;
use crate::encoder::{FeatureEncoder, FeatureVector};
use crate::error::Result;
use crate::labels::LabelEncoder;
use crate::model::{self, CropModel, ModelMetadata};
use crate::progress::{ProgressCallback, ProgressUpdate, TrainingStage};
use crate::types::TrainingResult;
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::time::Instant;
use tracing::{error, info};

/// Fits and persists the crop model.
pub struct Trainer {
    config: LearningConfig,
    encoder: FeatureEncoder,
    progress_callback: Option<ProgressCallback>,
}

impl std::fmt::Debug for Trainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Trainer")
            .field("config", &self.config)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl Trainer {
    #[must_use]
    pub fn builder() -> TrainerBuilder {
        TrainerBuilder::default()
    }

    pub fn config(&self) -> &LearningConfig {
        &self.config
    }

    /// Train on the configured CSV and overwrite both artifacts.
    ///
    /// # Errors
    ///
    /// - [`Configuration`](crate::CropLearningError::Configuration): missing CSV,
    ///   missing column, no rows, empty crop label
    /// - [`TrainingFailed`](crate::CropLearningError::TrainingFailed): the tree could not be fitted
    /// - [`Io`](crate::CropLearningError::Io): the artifacts could not be written
    pub fn train(&self) -> Result<TrainingResult> {
        let result = self.run();
        if let Err(ref e) = result {
            error!("Training failed: {e}");
            self.report(TrainingStage::Failed, e.to_string());
        }
        result
    }

    /// Fit a model from an already-loaded dataset without touching disk.
    pub fn fit(&self, dataset: &Dataset) -> Result<CropModel> {
        self.report(
            TrainingStage::Encoding,
            format!("Encoding {} rows", dataset.len()),
        );
        let features: Vec<FeatureVector> = dataset
            .rows()
            .iter()
            .map(|row| self.encoder.encode_query(&row.query))
            .collect();

        let labels = LabelEncoder::fit(dataset.crops());
        let label_ids = labels.transform(dataset.crops())?;

        self.report(
            TrainingStage::Fitting,
            format!("Fitting decision tree over {} crops", labels.len()),
        );
        let classifier = model::fit_tree(&features, &label_ids, &self.config.tree)?;

        let ordering = self.encoder.ordering();
        let trained_at = Utc::now();
        let metadata = ModelMetadata {
            training_id: training_id(&trained_at.to_rfc3339(), dataset, &labels),
            schema_tag: ordering.schema_tag(),
            feature_len: ordering.feature_len(),
            trained_at,
        };

        Ok(CropModel::from_parts(
            metadata,
            classifier,
            labels,
            self.encoder,
        ))
    }

    fn run(&self) -> Result<TrainingResult> {
        let started = Instant::now();
        self.config.validate()?;

        self.report(
            TrainingStage::Loading,
            format!("Loading {}", self.config.dataset_path.display()),
        );
        let dataset = Dataset::from_csv(&self.config.dataset_path)?;
        info!(
            "Loaded {} rows from {}",
            dataset.len(),
            self.config.dataset_path.display()
        );

        let model = self.fit(&dataset)?;

        let store = ArtifactStore::new(&self.config);
        self.report(
            TrainingStage::Saving,
            format!("Writing artifacts to {}", self.config.artifact_dir.display()),
        );
        store.save_pair(&model)?;

        let result = TrainingResult {
            training_id: model.metadata.training_id.clone(),
            rows: dataset.len(),
            classes: model.classes().to_vec(),
            class_counts: dataset.crop_counts(),
            feature_len: model.metadata.feature_len,
            random_seed: self.config.tree.random_seed,
            model_path: store.model_path().to_path_buf(),
            label_path: store.label_path().to_path_buf(),
            duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        };

        self.report(
            TrainingStage::Complete,
            format!(
                "Trained on {} rows, {} crops",
                result.rows,
                result.classes.len()
            ),
        );
        Ok(result)
    }

    fn report(&self, stage: TrainingStage, message: impl Into<String>) {
        if let Some(ref callback) = self.progress_callback {
            callback(ProgressUpdate::new(stage, message));
        }
    }
}

/// Short id shared by both artifacts of one run.
fn training_id(timestamp: &str, dataset: &Dataset, labels: &LabelEncoder) -> String {
    let mut hasher = Sha256::new();
    hasher.update(timestamp.as_bytes());
    hasher.update(dataset.len().to_le_bytes());
    for class in labels.classes() {
        hasher.update(class.as_bytes());
        hasher.update([0u8]);
    }
    let digest = format!("{:x}", hasher.finalize());
    digest[..16].to_string()
}

/// Builder for [`Trainer`].
#[derive(Default)]
pub struct TrainerBuilder {
    config: Option<LearningConfig>,
    encoder: Option<FeatureEncoder>,
    progress_callback: Option<ProgressCallback>,
}

impl std::fmt::Debug for TrainerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrainerBuilder")
            .field("config", &self.config)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl TrainerBuilder {
    /// Paths and tree parameters. Defaults to [`LearningConfig::default`].
    #[must_use]
    pub fn config(mut self, config: LearningConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Override the encoder. Only useful for tests of ordering mismatches.
    #[must_use]
    pub fn encoder(mut self, encoder: FeatureEncoder) -> Self {
        self.encoder = Some(encoder);
        self
    }

    #[must_use]
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        self.progress_callback = Some(std::sync::Arc::new(callback));
        self
    }

    #[must_use]
    pub fn build(self) -> Trainer {
        Trainer {
            config: self.config.unwrap_or_default(),
            encoder: self.encoder.unwrap_or_default(),
            progress_callback: self.progress_callback,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::TrainingRow;
    use crate::encoder::CropQuery;

    fn row(soil: &str, season: &str, rainfall: &str, crop: &str) -> TrainingRow {
        TrainingRow {
            query: CropQuery::new(soil, season, rainfall),
            crop: crop.to_string(),
        }
    }

    #[test]
    fn test_fit_two_rows_in_memory() {
        let dataset = Dataset::from_rows(vec![
            row("clay", "winter", "low", "wheat"),
            row("sandy", "summer", "high", "rice"),
        ]);
        let model = Trainer::builder().build().fit(&dataset).unwrap();
        assert_eq!(
            model.predict(&CropQuery::new("clay", "winter", "low")).unwrap(),
            "wheat"
        );
        assert_eq!(
            model.predict(&CropQuery::new("sandy", "summer", "high")).unwrap(),
            "rice"
        );
    }

    #[test]
    fn test_single_crop_always_predicts_it() {
        let dataset = Dataset::from_rows(vec![
            row("clay", "winter", "low", "wheat"),
            row("sandy", "summer", "high", "wheat"),
        ]);
        let model = Trainer::builder().build().fit(&dataset).unwrap();
        assert_eq!(model.classes(), ["wheat".to_string()]);
        for query in [
            CropQuery::new("clay", "winter", "low"),
            CropQuery::new("loamy", "monsoon", "medium"),
            CropQuery::new("peat", "spring", "none"),
        ] {
            assert_eq!(model.predict(&query).unwrap(), "wheat");
        }
    }

    #[test]
    fn test_unbounded_tree_reproduces_distinct_rows() {
        let dataset = Dataset::from_rows(vec![
            row("clay", "winter", "low", "wheat"),
            row("clay", "winter", "high", "rice"),
            row("clay", "summer", "low", "maize"),
            row("sandy", "winter", "low", "millet"),
            row("loamy", "monsoon", "medium", "cotton"),
        ]);
        let model = Trainer::builder().build().fit(&dataset).unwrap();
        for training_row in dataset.rows() {
            assert_eq!(model.predict(&training_row.query).unwrap(), training_row.crop);
        }
    }

    #[test]
    fn test_training_id_is_short_hex() {
        let dataset = Dataset::from_rows(vec![row("clay", "winter", "low", "wheat")]);
        let labels = LabelEncoder::fit(dataset.crops());
        let id = training_id("2026-10-18T00:00:00Z", &dataset, &labels);
        assert_eq!(id.len(), 16);
        assert_ne!(id, training_id("2026-10-18T00:00:01Z", &dataset, &labels));
    }
}
