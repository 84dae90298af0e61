//! crop-learning: crop recommendation from soil, season and rainfall.
//!
//! This crate trains a decision tree on a small CSV of labelled field
//! conditions and answers "which crop fits these conditions?" with a single
//! crop name.
//!
//! # Features
//!
//! - **Fixed one-hot encoding**: 6 soil types, 3 seasons and 3 rainfall levels
//!   become 12 binary features in a fixed order
//! - **Deterministic training**: the tree is fitted with a fixed seed, so the
//!   same CSV always yields the same predictions
//! - **Paired artifacts**: classifier and label encoder are stored as two
//!   files sharing a training id, written atomically
//! - **Cached inference**: [`ModelCache`] reloads only when the files change
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use crop_learning::{CropQuery, LearningConfig, ModelCache, Trainer};
//!
//! let config = LearningConfig::builder().base_dir("ml").build()?;
//!
//! Trainer::builder().config(config.clone()).build().train()?;
//!
//! let cache = ModelCache::new(&config);
//! let crop = cache.predict(&CropQuery::new("clay", "winter", "low"))?;
//! println!("recommended: {crop}");
//! ```
//!
//! # Architecture
//!
//! ```text
//! crop_dataset.csv ──► Dataset ──► FeatureEncoder ──┐
//!                                   LabelEncoder ───┼─► Trainer ──► ArtifactStore
//!                                                   │                 │
//!                                                   │    crop_model.bin + label_encoder.bin
//!                                                   │                 │
//! CropQuery ──► ModelCache ◄────────────────────────┴─────────────────┘
//!                   │
//!                   ▼
//!               crop name
//! ```
//!
//! # Error Handling
//!
//! All fallible operations return [`Result<T>`], i.e.
//! `Result<T, CropLearningError>`:
//!
//! - [`CropLearningError::Configuration`] - the training CSV is unusable
//! - [`CropLearningError::ArtifactMissing`] - no trained model on disk
//! - [`CropLearningError::DependencyUnavailable`] - the artifact needs a
//!   classifier this build cannot load
//! - [`CropLearningError::Decode`] - predicted id unknown to the label encoder
//! - [`CropLearningError::ArtifactMismatch`] - the two files do not belong together
//!
//! Prediction-side errors answer `true` to
//! [`CropLearningError::is_model_unavailable`]; front ends show them as a
//! message instead of failing the request.
//!
//! # Thread Safety
//!
//! [`CropModel`] is immutable and [`ModelCache`] is `Send + Sync`, so one cache
//! can serve concurrent predictions. Training runs synchronously on the
//! calling thread.

mod artifact;
mod cache;
mod config;
mod dataset;
mod encoder;
mod error;
mod labels;
mod model;
mod pipeline;
mod progress;
mod types;

// Re-export public API
//
// Configuration types
pub use config::{
    ConfigValidationError, DEFAULT_RANDOM_SEED, LearningConfig, LearningConfigBuilder,
    SplitCriterion, TreeParams,
};
// Error types
pub use error::{CropLearningError, Result, ResultExt};
// Encoding
pub use encoder::{
    CategoryOrdering, CropQuery, Dimension, FeatureEncoder, FeatureVector, RAINFALL_LEVELS,
    SEASONS, SOIL_TYPES, normalize,
};
pub use labels::LabelEncoder;
// Training input
pub use dataset::{
    Dataset, QUERY_COLUMNS, REQUIRED_COLUMNS, TrainingRow, read_crop_counts, read_queries,
};
// Artifacts and inference
pub use artifact::{
    ALGORITHM, ArtifactHeader, ArtifactKind, ArtifactStamp, ArtifactStore, FORMAT_VERSION,
    FileStamp, copy_atomic,
};
pub use cache::ModelCache;
pub use model::{CropModel, ModelMetadata};
// Training
pub use pipeline::{Trainer, TrainerBuilder};
pub use progress::{ParseTrainingStageError, ProgressCallback, ProgressUpdate, TrainingStage};
pub use types::{ArtifactStatus, TrainingResult};
