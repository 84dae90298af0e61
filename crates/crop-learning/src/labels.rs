//! Crop name <-> class id mapping.

use crate::encoder::normalize;
use crate::error::{CropLearningError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Maps normalized crop names to class ids.
///
/// Ids are positions in the sorted list of distinct names, so the order rows
/// appear in the dataset never affects them.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    /// Fit over raw crop names. Names are normalized before deduplication.
    pub fn fit<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let distinct: BTreeSet<String> = names.into_iter().map(|n| normalize(n.as_ref())).collect();
        Self {
            classes: distinct.into_iter().collect(),
        }
    }

    /// Rebuild from a persisted class list. The list must already be sorted
    /// and distinct.
    pub(crate) fn from_classes(classes: Vec<String>) -> Result<Self> {
        if classes.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(CropLearningError::ArtifactMismatch(
                "label encoder classes are not sorted and distinct".to_string(),
            ));
        }
        Ok(Self { classes })
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Class id of a crop name, if it was seen during fitting.
    pub fn encode(&self, name: &str) -> Option<u32> {
        let name = normalize(name);
        self.classes
            .binary_search(&name)
            .ok()
            .and_then(|idx| u32::try_from(idx).ok())
    }

    /// Encode every name, failing on the first one not seen during fitting.
    pub fn transform<I, S>(&self, names: I) -> Result<Vec<u32>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names
            .into_iter()
            .map(|name| {
                let name = name.as_ref();
                self.encode(name).ok_or_else(|| {
                    CropLearningError::Configuration(format!("unknown crop label '{name}'"))
                })
            })
            .collect()
    }

    /// Crop name for a class id.
    pub fn decode(&self, id: u32) -> Result<&str> {
        usize::try_from(id)
            .ok()
            .and_then(|idx| self.classes.get(idx))
            .map(String::as_str)
            .ok_or(CropLearningError::Decode {
                id,
                known: self.classes.len(),
            })
    }
}
