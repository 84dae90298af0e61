//! The advisor: request handlers around the crop pipeline.
//!
//! Every action returns its result together with the [`Messages`] a user
//! should see. Pipeline failures are turned into error messages here; none
//! of these methods return `Err` or panic on a missing or broken model.

use crate::forms::{ChoiceField, CropRecommendationForm, FormErrors, choice_fields, title_case};
use crate::messages::Messages;
use crop_learning::{
    ArtifactStatus, CropLearningError, CropQuery, FeatureEncoder, LearningConfig, ModelCache,
    ProgressCallback, Trainer, TrainingResult, copy_atomic, read_crop_counts, read_queries,
};
use serde::Serialize;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

pub const MODEL_NOT_FOUND: &str =
    "Model not found. Please run the training script to generate the model.";
pub const RETRAIN_SUCCEEDED: &str = "Model retrained and saved successfully.";
pub const UPLOAD_MISSING: &str = "Please choose a CSV file to upload.";
pub const UPLOAD_SUCCEEDED: &str = "Dataset uploaded successfully.";

/// Counts shown when the dataset cannot be read.
const SAMPLE_CROP_COUNTS: [(&str, usize); 3] = [("Wheat", 2), ("Rice", 2), ("Maize", 1)];

/// Response to a crop recommendation request.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SuggestionPage {
    /// The form as submitted, for redisplay.
    pub form: CropRecommendationForm,
    pub prediction: Option<String>,
    /// Both artifact files are present on disk.
    pub model_loaded: bool,
    pub messages: Messages,
    pub form_errors: FormErrors,
}

/// Result of an action plus its user messages.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionOutcome<T> {
    pub value: Option<T>,
    pub messages: Messages,
}

impl<T> ActionOutcome<T> {
    fn succeeded(value: T, messages: Messages) -> Self {
        Self {
            value: Some(value),
            messages,
        }
    }

    fn failed(messages: Messages) -> Self {
        Self {
            value: None,
            messages,
        }
    }

    pub fn is_success(&self) -> bool {
        self.value.is_some()
    }
}

/// One answered row of a batch request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchSuggestion {
    pub query: CropQuery,
    pub crop: String,
}

/// Snapshot of the dataset and artifacts on disk.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelStatus {
    pub model_loaded: bool,
    pub dataset_present: bool,
    pub dataset_path: PathBuf,
    pub artifacts: ArtifactStatus,
}

/// One row of the crop frequency table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CropCount {
    pub crop: String,
    pub count: usize,
}

/// Crop frequency over the current dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CropInsights {
    pub rows: Vec<CropCount>,
    /// False when the table is the built-in sample.
    pub from_dataset: bool,
    pub messages: Messages,
}

impl CropInsights {
    /// `Crop,Count` CSV text.
    pub fn to_csv(&self) -> String {
        let mut out = String::from("Crop,Count\n");
        for row in &self.rows {
            out.push_str(&csv_field(&row.crop));
            out.push(',');
            out.push_str(&row.count.to_string());
            out.push('\n');
        }
        out
    }
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Front end to training and prediction for one base directory.
pub struct Advisor {
    config: LearningConfig,
    encoder: FeatureEncoder,
    cache: ModelCache,
    progress_callback: Option<ProgressCallback>,
}

impl std::fmt::Debug for Advisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Advisor")
            .field("config", &self.config)
            .field("cache", &self.cache)
            .finish()
    }
}

impl Advisor {
    pub fn new(config: LearningConfig) -> Self {
        let encoder = FeatureEncoder::default();
        let cache = ModelCache::with_encoder(&config, encoder);
        Self {
            config,
            encoder,
            cache,
            progress_callback: None,
        }
    }

    /// Report training progress from [`retrain_model`](Self::retrain_model).
    #[must_use]
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn config(&self) -> &LearningConfig {
        &self.config
    }

    /// Validate the form and, if valid, predict a crop.
    pub fn crop_suggestion(&self, form: &CropRecommendationForm) -> SuggestionPage {
        let mut page = SuggestionPage {
            form: form.clone(),
            model_loaded: self.cache.store().exists(),
            ..Default::default()
        };

        let query = match form.validate(self.encoder.ordering()) {
            Ok(query) => query,
            Err(errors) => {
                page.form_errors = errors;
                return page;
            }
        };

        if !page.model_loaded {
            page.messages.error(MODEL_NOT_FOUND);
            return page;
        }

        match self.cache.predict(&query) {
            Ok(crop) => {
                info!("Recommended '{crop}' for {query}");
                page.prediction = Some(crop);
            }
            Err(e) => {
                warn!("Prediction for {query} failed: {e}");
                page.messages.error(prediction_failure_message(&e));
                if matches!(e.root(), CropLearningError::ArtifactMissing { .. }) {
                    page.model_loaded = false;
                }
            }
        }
        page
    }

    /// Predict a crop for every row of a CSV with the three feature columns.
    ///
    /// Rows are not checked against the choice lists; unknown values encode
    /// to all-zero blocks as in single predictions.
    pub fn crop_suggestions(&self, queries_csv: &Path) -> ActionOutcome<Vec<BatchSuggestion>> {
        let mut messages = Messages::new();
        let queries = match read_queries(queries_csv) {
            Ok(queries) => queries,
            Err(e) => {
                messages.error(format!("Failed to read queries: {e}"));
                return ActionOutcome::failed(messages);
            }
        };

        match self.cache.predict_batch(&queries) {
            Ok(crops) => {
                info!("Recommended crops for {} queries", crops.len());
                let suggestions = queries
                    .into_iter()
                    .zip(crops)
                    .map(|(query, crop)| BatchSuggestion { query, crop })
                    .collect();
                ActionOutcome::succeeded(suggestions, messages)
            }
            Err(e) => {
                warn!("Batch prediction failed: {e}");
                messages.error(prediction_failure_message(&e));
                ActionOutcome::failed(messages)
            }
        }
    }

    /// Retrain from the dataset and replace both artifacts.
    pub fn retrain_model(&self) -> ActionOutcome<TrainingResult> {
        let mut messages = Messages::new();
        let mut builder = Trainer::builder()
            .config(self.config.clone())
            .encoder(self.encoder);
        if let Some(ref callback) = self.progress_callback {
            let callback = Arc::clone(callback);
            builder = builder.on_progress(move |update| callback(update));
        }

        match builder.build().train() {
            Ok(result) => {
                self.cache.invalidate();
                messages.success(RETRAIN_SUCCEEDED);
                ActionOutcome::succeeded(result, messages)
            }
            Err(e) => {
                error!("Retrain failed: {e}");
                messages.error(format!("Failed to retrain model: {e}"));
                ActionOutcome::failed(messages)
            }
        }
    }

    /// Store an uploaded CSV as the training dataset.
    ///
    /// `None` means no file was chosen. The copy goes through a temporary file,
    /// so a failed upload leaves the previous dataset in place. The content is
    /// not validated until the next retrain.
    pub fn upload_dataset<R: Read>(&self, upload: Option<R>) -> ActionOutcome<u64> {
        let mut messages = Messages::new();
        let Some(source) = upload else {
            messages.error(UPLOAD_MISSING);
            return ActionOutcome::failed(messages);
        };

        match copy_atomic(source, &self.config.dataset_path) {
            Ok(bytes) => {
                info!(
                    "Stored {bytes} byte dataset at {}",
                    self.config.dataset_path.display()
                );
                messages.success(UPLOAD_SUCCEEDED);
                ActionOutcome::succeeded(bytes, messages)
            }
            Err(e) => {
                error!("Dataset upload failed: {e}");
                messages.error(format!("Failed to save dataset: {e}"));
                ActionOutcome::failed(messages)
            }
        }
    }

    /// [`upload_dataset`](Self::upload_dataset) from a file on disk.
    pub fn import_dataset(&self, path: &Path) -> ActionOutcome<u64> {
        match File::open(path) {
            Ok(file) => self.upload_dataset(Some(file)),
            Err(e) => {
                let mut messages = Messages::new();
                messages.error(format!(
                    "Failed to save dataset: could not open {}: {e}",
                    path.display()
                ));
                ActionOutcome::failed(messages)
            }
        }
    }

    pub fn model_status(&self) -> ModelStatus {
        let artifacts = self.cache.store().status();
        ModelStatus {
            model_loaded: artifacts.model_loaded,
            dataset_present: self.config.dataset_path.is_file(),
            dataset_path: self.config.dataset_path.clone(),
            artifacts,
        }
    }

    pub fn choices(&self) -> Vec<ChoiceField> {
        choice_fields(self.encoder.ordering())
    }

    /// Crop frequency over the dataset, most frequent first.
    ///
    /// Only the `crop` column is read, so a dataset that cannot train (header
    /// only, blank labels) still gets a real table. The sample table is shown
    /// only when the file or its `crop` column is missing.
    pub fn crop_insights(&self) -> CropInsights {
        let mut messages = Messages::new();
        match read_crop_counts(&self.config.dataset_path) {
            Ok(counts) => {
                let mut rows: Vec<CropCount> = counts
                    .into_iter()
                    .map(|(crop, count)| CropCount {
                        crop: title_case(&crop),
                        count,
                    })
                    .collect();
                rows.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.crop.cmp(&b.crop)));
                CropInsights {
                    rows,
                    from_dataset: true,
                    messages,
                }
            }
            Err(e) => {
                warn!("Showing sample crop counts: {e}");
                messages.warning(format!("Dataset unavailable, showing sample counts: {e}"));
                CropInsights {
                    rows: SAMPLE_CROP_COUNTS
                        .iter()
                        .map(|&(crop, count)| CropCount {
                            crop: crop.to_string(),
                            count,
                        })
                        .collect(),
                    from_dataset: false,
                    messages,
                }
            }
        }
    }
}

fn prediction_failure_message(err: &CropLearningError) -> String {
    match err.root() {
        CropLearningError::ArtifactMissing { .. } => MODEL_NOT_FOUND.to_string(),
        CropLearningError::DependencyUnavailable(_) => {
            format!("Prediction dependencies missing: {err}")
        }
        _ => format!("Prediction failed: {err}"),
    }
}
