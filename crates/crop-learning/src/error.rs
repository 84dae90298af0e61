//! Error types for the crop-learning crate.
//!
//! This module provides [`CropLearningError`], the error type returned by every
//! fallible operation in the crate, using `thiserror`.
//!
//! Errors fall into two groups:
//!
//! - **Training-side** errors ([`Configuration`](CropLearningError::Configuration),
//!   [`TrainingFailed`](CropLearningError::TrainingFailed)) abort a training run
//!   before any artifact is written.
//! - **Prediction-side** errors ([`ArtifactMissing`](CropLearningError::ArtifactMissing),
//!   [`DependencyUnavailable`](CropLearningError::DependencyUnavailable),
//!   [`Decode`](CropLearningError::Decode), [`ArtifactMismatch`](CropLearningError::ArtifactMismatch),
//!   [`ArtifactCorrupt`](CropLearningError::ArtifactCorrupt),
//!   [`InferenceFailed`](CropLearningError::InferenceFailed)) mean "no prediction
//!   available" and are meant to be shown to the user, not propagated as crashes.
//!   See [`CropLearningError::is_model_unavailable`].
//!
//! Errors are serializable as `{code, message}` so a front end can render them.

use serde::Serialize;
use serde::ser::SerializeStruct;
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for crop training and prediction.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum CropLearningError {
    /// The training CSV is missing, unreadable, or lacks required content.
    ///
    /// Fatal to a training run. Nothing is written to the artifact directory.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// One of the two artifact files does not exist.
    #[error("Model not available: artifact not found at {}", path.display())]
    ArtifactMissing {
        /// The path that was expected to hold the artifact.
        path: PathBuf,
    },

    /// The artifact needs a component this build does not provide
    /// (an unknown algorithm or a newer artifact format).
    #[error("Dependency unavailable: {0}")]
    DependencyUnavailable(String),

    /// The classifier predicted a label id the label decoder does not know.
    #[error("Label id {id} is outside the decoder range (0..{known})")]
    Decode {
        /// The predicted id.
        id: u32,
        /// Number of classes known to the decoder.
        known: usize,
    },

    /// The two artifact files do not belong together, or were produced with a
    /// different category ordering than the running encoder.
    #[error("Artifact mismatch: {0}")]
    ArtifactMismatch(String),

    /// An artifact file exists but cannot be decoded.
    #[error("Artifact at {} is corrupt: {reason}", path.display())]
    ArtifactCorrupt { path: PathBuf, reason: String },

    /// The classifier failed to fit.
    #[error("Training failed: {0}")]
    TrainingFailed(String),

    /// The loaded classifier failed to produce a prediction.
    #[error("Inference failed: {0}")]
    InferenceFailed(String),

    /// Invalid configuration values.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<CropLearningError>,
    },
}

impl CropLearningError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        CropLearningError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Get error code for frontend handling.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::ArtifactMissing { .. } => "ARTIFACT_MISSING",
            Self::DependencyUnavailable(_) => "DEPENDENCY_UNAVAILABLE",
            Self::Decode { .. } => "DECODE_ERROR",
            Self::ArtifactMismatch(_) => "ARTIFACT_MISMATCH",
            Self::ArtifactCorrupt { .. } => "ARTIFACT_CORRUPT",
            Self::TrainingFailed(_) => "TRAINING_FAILED",
            Self::InferenceFailed(_) => "INFERENCE_FAILED",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Returns the innermost error, skipping any context wrappers.
    pub fn root(&self) -> &CropLearningError {
        match self {
            Self::WithContext { source, .. } => source.root(),
            other => other,
        }
    }

    /// True when the error means "no prediction available" rather than a
    /// failure the caller must abort on.
    pub fn is_model_unavailable(&self) -> bool {
        matches!(
            self.root(),
            Self::ArtifactMissing { .. }
                | Self::DependencyUnavailable(_)
                | Self::Decode { .. }
                | Self::ArtifactMismatch(_)
                | Self::ArtifactCorrupt { .. }
                | Self::InferenceFailed(_)
        )
    }

    /// True for errors raised because the training input is unusable.
    pub fn is_configuration(&self) -> bool {
        matches!(self.root(), Self::Configuration(_))
    }
}

impl Serialize for CropLearningError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("CropLearningError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for crop-learning operations.
pub type Result<T> = std::result::Result<T, CropLearningError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| CropLearningError::Polars(e).with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, std::io::Error> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| CropLearningError::Io(e).with_context(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code() {
        assert_eq!(
            CropLearningError::Configuration("missing".to_string()).error_code(),
            "CONFIGURATION_ERROR"
        );
        assert_eq!(
            CropLearningError::Decode { id: 9, known: 2 }.error_code(),
            "DECODE_ERROR"
        );
    }

    #[test]
    fn test_model_unavailable_kinds() {
        let missing = CropLearningError::ArtifactMissing {
            path: PathBuf::from("ml/crop_model.bin"),
        };
        assert!(missing.is_model_unavailable());
        assert!(CropLearningError::Decode { id: 3, known: 1 }.is_model_unavailable());
        assert!(CropLearningError::DependencyUnavailable("x".into()).is_model_unavailable());
        assert!(!CropLearningError::Configuration("x".into()).is_model_unavailable());
        assert!(!CropLearningError::TrainingFailed("x".into()).is_model_unavailable());
    }

    #[test]
    fn test_with_context_preserves_kind() {
        let error = CropLearningError::ArtifactMismatch("training ids differ".to_string())
            .with_context("Loading artifacts");
        assert!(error.to_string().contains("Loading artifacts"));
        assert_eq!(error.error_code(), "ARTIFACT_MISMATCH");
        assert!(error.is_model_unavailable());
    }

    #[test]
    fn test_error_serialization() {
        let error = CropLearningError::Configuration("Dataset must contain columns".to_string());
        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains("CONFIGURATION_ERROR"));
        assert!(json.contains("Dataset must contain columns"));
    }
}
