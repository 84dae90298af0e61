//! Paired on-disk artifacts: the classifier and its label encoder.
//!
//! Each file is MessagePack holding an [`ArtifactHeader`] and a payload:
//!
//! ```text
//! crop_model.bin      { header: {kind: classifier, ...},    payload: <decision tree or constant> }
//! label_encoder.bin   { header: {kind: label_encoder, ...}, payload: [crop names] }
//! ```
//!
//! Both headers carry the same `training_id` and the `schema_tag` of the
//! category ordering they were trained with. [`ArtifactStore::load_pair`]
//! refuses a pair whose ids differ or whose tag does not match the running
//! encoder.
//!
//! Writes go to a temporary file in the artifact directory and are renamed into
//! place, so a crash leaves either the old or the new file, never a torn one.
//! The two renames are not atomic together; a crash between them leaves
//! mismatched training ids, which loading detects.

use crate::config::LearningConfig;
use crate::encoder::{CategoryOrdering, FeatureEncoder};
use crate::error::{CropLearningError, Result, ResultExt};
use crate::labels::LabelEncoder;
use crate::model::{Classifier, CropModel, ModelMetadata};
use crate::types::ArtifactStatus;
use chrono::{DateTime, Utc};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info, warn};

/// Artifact layout version written by this build.
pub const FORMAT_VERSION: u32 = 2;

/// The only classifier family this build can load.
pub const ALGORITHM: &str = "decision_tree";

/// Which half of the pair a file holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Classifier,
    LabelEncoder,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Classifier => "classifier",
            Self::LabelEncoder => "label_encoder",
        }
    }
}

/// Header stored at the front of both artifact files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactHeader {
    pub format_version: u32,
    pub kind: ArtifactKind,
    pub algorithm: String,
    pub schema_tag: String,
    pub training_id: String,
    pub feature_len: usize,
    pub trained_at: DateTime<Utc>,
}

impl ArtifactHeader {
    fn new(kind: ArtifactKind, metadata: &ModelMetadata) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            kind,
            algorithm: ALGORITHM.to_string(),
            schema_tag: metadata.schema_tag.clone(),
            training_id: metadata.training_id.clone(),
            feature_len: metadata.feature_len,
            trained_at: metadata.trained_at,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct ArtifactFile<P> {
    header: ArtifactHeader,
    payload: P,
}

/// Modification time and size of one artifact file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStamp {
    pub modified: SystemTime,
    pub len: u64,
}

/// Stamps of both artifact files, compared to detect on-disk changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArtifactStamp {
    pub model: FileStamp,
    pub labels: FileStamp,
}

/// Reads and writes the artifact pair at fixed paths.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    artifact_dir: PathBuf,
    model_path: PathBuf,
    label_path: PathBuf,
}

impl ArtifactStore {
    pub fn new(config: &LearningConfig) -> Self {
        Self {
            artifact_dir: config.artifact_dir.clone(),
            model_path: config.model_path(),
            label_path: config.label_path(),
        }
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    pub fn label_path(&self) -> &Path {
        &self.label_path
    }

    /// Whether both files are present. Says nothing about whether they load.
    pub fn exists(&self) -> bool {
        self.model_path.is_file() && self.label_path.is_file()
    }

    /// Current stamp of both files.
    ///
    /// # Errors
    ///
    /// [`CropLearningError::ArtifactMissing`] if either file is absent.
    pub fn stamp(&self) -> Result<ArtifactStamp> {
        Ok(ArtifactStamp {
            model: file_stamp(&self.model_path)?,
            labels: file_stamp(&self.label_path)?,
        })
    }

    /// Write both artifacts, classifier first, each via temp file and rename.
    pub fn save_pair(&self, model: &CropModel) -> Result<()> {
        fs::create_dir_all(&self.artifact_dir).context(format!(
            "Creating artifact directory {}",
            self.artifact_dir.display()
        ))?;

        let classifier = ArtifactFile {
            header: ArtifactHeader::new(ArtifactKind::Classifier, &model.metadata),
            payload: &model.classifier,
        };
        let labels = ArtifactFile {
            header: ArtifactHeader::new(ArtifactKind::LabelEncoder, &model.metadata),
            payload: model.labels.classes(),
        };

        let classifier_bytes = encode(&classifier, &self.model_path)?;
        let label_bytes = encode(&labels, &self.label_path)?;

        self.write_atomic(&self.model_path, &classifier_bytes)?;
        self.write_atomic(&self.label_path, &label_bytes)?;

        info!(
            training_id = %model.metadata.training_id,
            "Saved model to {} and label encoder to {}",
            self.model_path.display(),
            self.label_path.display()
        );
        Ok(())
    }

    /// Load and cross-check both artifacts.
    ///
    /// # Errors
    ///
    /// - [`ArtifactMissing`](CropLearningError::ArtifactMissing) if either file is absent
    /// - [`DependencyUnavailable`](CropLearningError::DependencyUnavailable) for an
    ///   unknown algorithm or a newer format version
    /// - [`ArtifactMismatch`](CropLearningError::ArtifactMismatch) if the headers
    ///   disagree with each other or with `ordering`
    /// - [`ArtifactCorrupt`](CropLearningError::ArtifactCorrupt) if a file cannot
    ///   be decoded
    pub fn load_pair(&self, ordering: &CategoryOrdering) -> Result<CropModel> {
        let model_bytes = read_artifact(&self.model_path)?;
        let label_bytes = read_artifact(&self.label_path)?;

        let model_header = read_header(&model_bytes, &self.model_path)?;
        let label_header = read_header(&label_bytes, &self.label_path)?;
        check_header(&model_header, ArtifactKind::Classifier)?;
        check_header(&label_header, ArtifactKind::LabelEncoder)?;
        check_pair(&model_header, &label_header, ordering)?;

        let classifier: ArtifactFile<Classifier> = decode(&model_bytes, &self.model_path)?;
        let labels: ArtifactFile<Vec<String>> = decode(&label_bytes, &self.label_path)?;
        let labels = LabelEncoder::from_classes(labels.payload)?;

        debug!(
            training_id = %model_header.training_id,
            classes = labels.len(),
            "Loaded artifact pair"
        );

        let metadata = ModelMetadata {
            training_id: model_header.training_id,
            schema_tag: model_header.schema_tag,
            feature_len: model_header.feature_len,
            trained_at: model_header.trained_at,
        };
        Ok(CropModel::from_parts(
            metadata,
            classifier.payload,
            labels,
            FeatureEncoder::new(*ordering),
        ))
    }

    /// Read both headers without building the model.
    pub fn inspect(&self) -> Result<(ArtifactHeader, ArtifactHeader)> {
        let model_header = read_header(&read_artifact(&self.model_path)?, &self.model_path)?;
        let label_header = read_header(&read_artifact(&self.label_path)?, &self.label_path)?;
        Ok((model_header, label_header))
    }

    /// Summarize what is on disk without loading the classifier.
    pub fn status(&self) -> ArtifactStatus {
        let model_loaded = self.exists();
        let (headers, problem) = if model_loaded {
            match self.inspect() {
                Ok(pair) => (Some(pair), None),
                Err(e) => (None, Some(e.to_string())),
            }
        } else {
            (None, None)
        };
        ArtifactStatus {
            model_loaded,
            model_path: self.model_path.clone(),
            label_path: self.label_path.clone(),
            headers,
            problem,
        }
    }

    fn write_atomic(&self, dest: &Path, bytes: &[u8]) -> Result<()> {
        let mut tmp = tempfile::NamedTempFile::new_in(&self.artifact_dir)
            .context(format!("Creating temporary file for {}", dest.display()))?;
        tmp.write_all(bytes)
            .context(format!("Writing {}", tmp.path().display()))?;
        tmp.as_file()
            .sync_all()
            .context(format!("Flushing {}", tmp.path().display()))?;
        tmp.persist(dest)
            .map_err(|e| e.error)
            .context(format!("Moving artifact into {}", dest.display()))?;
        debug!("Wrote {} bytes to {}", bytes.len(), dest.display());
        Ok(())
    }
}

/// Copy `source` into `dest` via a temporary file in `dest`'s directory.
///
/// Used for dataset uploads so a half-written CSV is never visible to training.
pub fn copy_atomic(mut source: impl std::io::Read, dest: &Path) -> Result<u64> {
    let dir = match dest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir).context(format!("Creating directory {}", dir.display()))?;

    let mut tmp = tempfile::NamedTempFile::new_in(&dir)
        .context(format!("Creating temporary file for {}", dest.display()))?;
    let written = std::io::copy(&mut source, &mut tmp)
        .context(format!("Writing {}", tmp.path().display()))?;
    tmp.as_file()
        .sync_all()
        .context(format!("Flushing {}", tmp.path().display()))?;
    tmp.persist(dest)
        .map_err(|e| e.error)
        .context(format!("Moving file into {}", dest.display()))?;
    Ok(written)
}

fn file_stamp(path: &Path) -> Result<FileStamp> {
    let meta = fs::metadata(path).map_err(|e| missing_or_io(e, path))?;
    Ok(FileStamp {
        modified: meta.modified()?,
        len: meta.len(),
    })
}

fn read_artifact(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| missing_or_io(e, path))
}

fn missing_or_io(err: std::io::Error, path: &Path) -> CropLearningError {
    if err.kind() == ErrorKind::NotFound {
        CropLearningError::ArtifactMissing {
            path: path.to_path_buf(),
        }
    } else {
        CropLearningError::Io(err).with_context(format!("Reading {}", path.display()))
    }
}

fn encode<P: Serialize>(file: &ArtifactFile<P>, path: &Path) -> Result<Vec<u8>> {
    rmp_serde::to_vec_named(file).map_err(|e| {
        CropLearningError::TrainingFailed(format!(
            "could not serialize artifact for {}: {e}",
            path.display()
        ))
    })
}

fn decode<P: DeserializeOwned>(bytes: &[u8], path: &Path) -> Result<ArtifactFile<P>> {
    rmp_serde::from_slice(bytes).map_err(|e| CropLearningError::ArtifactCorrupt {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

fn read_header(bytes: &[u8], path: &Path) -> Result<ArtifactHeader> {
    decode::<IgnoredAny>(bytes, path).map(|file| file.header)
}

fn check_header(header: &ArtifactHeader, expected: ArtifactKind) -> Result<()> {
    if header.format_version > FORMAT_VERSION {
        return Err(CropLearningError::DependencyUnavailable(format!(
            "{} artifact uses format version {}, this build reads up to {}",
            expected.as_str(),
            header.format_version,
            FORMAT_VERSION
        )));
    }
    if header.algorithm != ALGORITHM {
        return Err(CropLearningError::DependencyUnavailable(format!(
            "{} artifact was produced by '{}', only '{}' is supported",
            expected.as_str(),
            header.algorithm,
            ALGORITHM
        )));
    }
    if header.kind != expected {
        return Err(CropLearningError::ArtifactMismatch(format!(
            "expected a {} artifact, found {}",
            expected.as_str(),
            header.kind.as_str()
        )));
    }
    Ok(())
}

fn check_pair(
    model: &ArtifactHeader,
    labels: &ArtifactHeader,
    ordering: &CategoryOrdering,
) -> Result<()> {
    if model.training_id != labels.training_id {
        warn!(
            model = %model.training_id,
            labels = %labels.training_id,
            "Classifier and label encoder come from different training runs"
        );
        return Err(CropLearningError::ArtifactMismatch(format!(
            "classifier is from training run {} but label encoder is from {}",
            model.training_id, labels.training_id
        )));
    }

    let expected = ordering.schema_tag();
    for header in [model, labels] {
        if header.schema_tag != expected {
            warn!(
                kind = header.kind.as_str(),
                "Artifact was trained with a different category ordering"
            );
            return Err(CropLearningError::ArtifactMismatch(format!(
                "{} artifact schema tag {} does not match the encoder's {}",
                header.kind.as_str(),
                header.schema_tag,
                expected
            )));
        }
    }

    if model.feature_len != ordering.feature_len() {
        return Err(CropLearningError::ArtifactMismatch(format!(
            "classifier expects {} features, encoder produces {}",
            model.feature_len,
            ordering.feature_len()
        )));
    }
    Ok(())
}
