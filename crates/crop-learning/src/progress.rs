//! Progress reporting for training runs.
//!
//! A training run passes through [`TrainingStage`]s in order and reports each
//! one to an optional [`ProgressCallback`].
//!
//! # Example
//!
//! ```
//! use crop_learning::{LearningConfig, ProgressUpdate, Trainer};
//!
//! let trainer = Trainer::builder()
//!     .config(LearningConfig::default())
//!     .on_progress(|update: ProgressUpdate| {
//!         println!("[{}] {:.0}% - {}", update.stage, update.progress * 100.0, update.message);
//!     })
//!     .build();
//! ```

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// The current stage of a training run.
///
/// Terminal states: [`Complete`](Self::Complete) and [`Failed`](Self::Failed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum TrainingStage {
    /// Reading and normalizing the CSV.
    #[default]
    Loading,
    /// Building feature vectors and fitting the label encoder.
    Encoding,
    /// Fitting the decision tree.
    Fitting,
    /// Writing both artifacts.
    Saving,
    Complete,
    Failed,
}

impl TrainingStage {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            TrainingStage::Loading => "loading",
            TrainingStage::Encoding => "encoding",
            TrainingStage::Fitting => "fitting",
            TrainingStage::Saving => "saving",
            TrainingStage::Complete => "complete",
            TrainingStage::Failed => "failed",
        }
    }

    /// Fraction of the run finished once this stage starts.
    #[must_use]
    pub fn progress(&self) -> f64 {
        match self {
            TrainingStage::Loading => 0.0,
            TrainingStage::Encoding => 0.25,
            TrainingStage::Fitting => 0.5,
            TrainingStage::Saving => 0.75,
            TrainingStage::Complete | TrainingStage::Failed => 1.0,
        }
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, TrainingStage::Complete | TrainingStage::Failed)
    }
}

impl fmt::Display for TrainingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error type for parsing a [`TrainingStage`] from a string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseTrainingStageError {
    invalid_value: String,
}

impl ParseTrainingStageError {
    #[must_use]
    pub fn invalid_value(&self) -> &str {
        &self.invalid_value
    }
}

impl fmt::Display for ParseTrainingStageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid training stage: '{}'. Valid values are: loading, encoding, fitting, \
             saving, complete, failed",
            self.invalid_value
        )
    }
}

impl std::error::Error for ParseTrainingStageError {}

impl FromStr for TrainingStage {
    type Err = ParseTrainingStageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "loading" => Ok(TrainingStage::Loading),
            "encoding" => Ok(TrainingStage::Encoding),
            "fitting" => Ok(TrainingStage::Fitting),
            "saving" => Ok(TrainingStage::Saving),
            "complete" => Ok(TrainingStage::Complete),
            "failed" => Ok(TrainingStage::Failed),
            _ => Err(ParseTrainingStageError {
                invalid_value: s.to_string(),
            }),
        }
    }
}

/// A progress update from a training run.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    pub stage: TrainingStage,

    /// Overall progress from 0.0 to 1.0.
    pub progress: f64,

    /// Human-readable status message.
    pub message: String,
}

impl ProgressUpdate {
    pub fn new(stage: TrainingStage, message: impl Into<String>) -> Self {
        Self {
            stage,
            progress: stage.progress(),
            message: message.into(),
        }
    }
}

impl Default for ProgressUpdate {
    fn default() -> Self {
        Self::new(TrainingStage::default(), String::new())
    }
}

/// Type alias for a progress callback function.
///
/// The callback should return quickly; it runs inline with training.
pub type ProgressCallback = Arc<dyn Fn(ProgressUpdate) + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_training_stage_roundtrip() {
        let stages = [
            TrainingStage::Loading,
            TrainingStage::Encoding,
            TrainingStage::Fitting,
            TrainingStage::Saving,
            TrainingStage::Complete,
            TrainingStage::Failed,
        ];

        for stage in stages {
            let parsed: TrainingStage = stage.as_str().parse().unwrap();
            assert_eq!(parsed, stage);
        }
    }

    #[test]
    fn test_training_stage_from_str_invalid() {
        let err = "explainability".parse::<TrainingStage>().unwrap_err();
        assert_eq!(err.invalid_value(), "explainability");
        assert!(err.to_string().contains("Valid values"));
    }

    #[test]
    fn test_progress_is_monotonic() {
        let order = [
            TrainingStage::Loading,
            TrainingStage::Encoding,
            TrainingStage::Fitting,
            TrainingStage::Saving,
            TrainingStage::Complete,
        ];
        for pair in order.windows(2) {
            assert!(pair[0].progress() < pair[1].progress());
        }
    }

    #[test]
    fn test_is_terminal() {
        assert!(TrainingStage::Complete.is_terminal());
        assert!(TrainingStage::Failed.is_terminal());
        assert!(!TrainingStage::Fitting.is_terminal());
    }

    #[test]
    fn test_progress_update_default() {
        let update = ProgressUpdate::default();
        assert_eq!(update.stage, TrainingStage::Loading);
        assert_eq!(update.progress, 0.0);
        assert!(update.message.is_empty());
    }
}
