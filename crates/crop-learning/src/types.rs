//! Result types returned by training and status queries.

use crate::artifact::ArtifactHeader;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Summary of a completed training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct TrainingResult {
    /// Identifier written into both artifact headers.
    pub training_id: String,

    /// Number of CSV rows the tree was fitted on.
    pub rows: usize,

    /// Distinct crop names, in class-id order.
    pub classes: Vec<String>,

    /// Rows per crop.
    pub class_counts: BTreeMap<String, usize>,

    pub feature_len: usize,

    pub random_seed: u64,

    pub model_path: PathBuf,

    pub label_path: PathBuf,

    /// Wall-clock time of the whole run.
    pub duration_ms: u64,
}

/// What is on disk right now, for status displays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactStatus {
    /// Both artifact files exist.
    pub model_loaded: bool,

    pub model_path: PathBuf,

    pub label_path: PathBuf,

    /// Headers, when both files could be read.
    pub headers: Option<(ArtifactHeader, ArtifactHeader)>,

    /// Why the headers could not be read, when the files exist but are unusable.
    pub problem: Option<String>,
}
