//! Configuration for training and artifact locations.
//!
//! Use [`LearningConfig::builder()`] for a validated configuration, or
//! deserialize one from JSON (every field has a default).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default seed for the decision tree fit.
pub const DEFAULT_RANDOM_SEED: u64 = 42;

/// Split quality measure for the decision tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SplitCriterion {
    #[default]
    Gini,
    Entropy,
    ClassificationError,
}

/// Decision tree hyperparameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeParams {
    /// Maximum depth. `None` grows until leaves are pure.
    pub max_depth: Option<u16>,
    pub min_samples_leaf: usize,
    pub min_samples_split: usize,
    pub criterion: SplitCriterion,
    pub random_seed: u64,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_samples_leaf: 1,
            min_samples_split: 2,
            criterion: SplitCriterion::Gini,
            random_seed: DEFAULT_RANDOM_SEED,
        }
    }
}

/// Paths and hyperparameters for the crop pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningConfig {
    /// CSV with `soil_type,season,rainfall_level,crop` columns.
    /// Default: "ml/data/crop_dataset.csv"
    pub dataset_path: PathBuf,

    /// Directory holding both artifacts. Created by training if absent.
    /// Default: "ml"
    pub artifact_dir: PathBuf,

    /// Default: "crop_model.bin"
    pub model_file_name: String,

    /// Default: "label_encoder.bin"
    pub label_file_name: String,

    pub tree: TreeParams,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self::rooted_at("ml")
    }
}

impl LearningConfig {
    pub fn builder() -> LearningConfigBuilder {
        LearningConfigBuilder::default()
    }

    /// Default layout under `base`: `base/data/crop_dataset.csv` plus both
    /// artifacts directly in `base`.
    pub fn rooted_at(base: impl AsRef<Path>) -> Self {
        let base = base.as_ref();
        Self {
            dataset_path: base.join("data").join("crop_dataset.csv"),
            artifact_dir: base.to_path_buf(),
            model_file_name: "crop_model.bin".to_string(),
            label_file_name: "label_encoder.bin".to_string(),
            tree: TreeParams::default(),
        }
    }

    pub fn model_path(&self) -> PathBuf {
        self.artifact_dir.join(&self.model_file_name)
    }

    pub fn label_path(&self) -> PathBuf {
        self.artifact_dir.join(&self.label_file_name)
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        for (field, name) in [
            ("model_file_name", &self.model_file_name),
            ("label_file_name", &self.label_file_name),
        ] {
            if name.trim().is_empty() || name.contains(['/', '\\']) {
                return Err(ConfigValidationError::InvalidFileName {
                    field: field.to_string(),
                    value: name.clone(),
                });
            }
        }

        if self.model_file_name == self.label_file_name {
            return Err(ConfigValidationError::SharedArtifactPath(
                self.model_file_name.clone(),
            ));
        }

        if self.tree.max_depth == Some(0) {
            return Err(ConfigValidationError::InvalidMaxDepth);
        }

        if self.tree.min_samples_leaf == 0 {
            return Err(ConfigValidationError::InvalidMinimum {
                field: "min_samples_leaf".to_string(),
                value: self.tree.min_samples_leaf,
                minimum: 1,
            });
        }

        if self.tree.min_samples_split < 2 {
            return Err(ConfigValidationError::InvalidMinimum {
                field: "min_samples_split".to_string(),
                value: self.tree.min_samples_split,
                minimum: 2,
            });
        }

        Ok(())
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid file name for '{field}': '{value}' (must be a bare, non-empty file name)")]
    InvalidFileName { field: String, value: String },

    #[error("Model and label encoder cannot share the file name '{0}'")]
    SharedArtifactPath(String),

    #[error("Invalid max depth: 0 (use no limit or at least 1)")]
    InvalidMaxDepth,

    #[error("Invalid value for '{field}': {value} (must be at least {minimum})")]
    InvalidMinimum {
        field: String,
        value: usize,
        minimum: usize,
    },
}

impl From<ConfigValidationError> for crate::error::CropLearningError {
    fn from(err: ConfigValidationError) -> Self {
        crate::error::CropLearningError::InvalidConfig(err.to_string())
    }
}

/// Builder for [`LearningConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct LearningConfigBuilder {
    base_dir: Option<PathBuf>,
    dataset_path: Option<PathBuf>,
    artifact_dir: Option<PathBuf>,
    model_file_name: Option<String>,
    label_file_name: Option<String>,
    max_depth: Option<Option<u16>>,
    min_samples_leaf: Option<usize>,
    min_samples_split: Option<usize>,
    criterion: Option<SplitCriterion>,
    random_seed: Option<u64>,
}

impl LearningConfigBuilder {
    /// Root for the default dataset and artifact locations.
    ///
    /// Explicit [`dataset_path`](Self::dataset_path) and
    /// [`artifact_dir`](Self::artifact_dir) take precedence.
    pub fn base_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(path.into());
        self
    }

    pub fn dataset_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.dataset_path = Some(path.into());
        self
    }

    pub fn artifact_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.artifact_dir = Some(path.into());
        self
    }

    pub fn model_file_name(mut self, name: impl Into<String>) -> Self {
        self.model_file_name = Some(name.into());
        self
    }

    pub fn label_file_name(mut self, name: impl Into<String>) -> Self {
        self.label_file_name = Some(name.into());
        self
    }

    /// Limit tree depth. `None` means unbounded.
    pub fn max_depth(mut self, depth: Option<u16>) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn min_samples_leaf(mut self, n: usize) -> Self {
        self.min_samples_leaf = Some(n);
        self
    }

    pub fn min_samples_split(mut self, n: usize) -> Self {
        self.min_samples_split = Some(n);
        self
    }

    pub fn criterion(mut self, criterion: SplitCriterion) -> Self {
        self.criterion = Some(criterion);
        self
    }

    pub fn random_seed(mut self, seed: u64) -> Self {
        self.random_seed = Some(seed);
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `LearningConfig` or an error if validation fails.
    pub fn build(self) -> Result<LearningConfig, ConfigValidationError> {
        let base = match self.base_dir {
            Some(dir) => LearningConfig::rooted_at(dir),
            None => LearningConfig::default(),
        };
        let defaults = TreeParams::default();

        let config = LearningConfig {
            dataset_path: self.dataset_path.unwrap_or(base.dataset_path),
            artifact_dir: self.artifact_dir.unwrap_or(base.artifact_dir),
            model_file_name: self.model_file_name.unwrap_or(base.model_file_name),
            label_file_name: self.label_file_name.unwrap_or(base.label_file_name),
            tree: TreeParams {
                max_depth: self.max_depth.unwrap_or(defaults.max_depth),
                min_samples_leaf: self.min_samples_leaf.unwrap_or(defaults.min_samples_leaf),
                min_samples_split: self.min_samples_split.unwrap_or(defaults.min_samples_split),
                criterion: self.criterion.unwrap_or(defaults.criterion),
                random_seed: self.random_seed.unwrap_or(defaults.random_seed),
            },
        };

        config.validate()?;
        Ok(config)
    }
}
