//! One-hot feature encoding for crop queries.
//!
//! The [`CategoryOrdering`] fixes, per feature dimension, the position of every
//! allowed value. [`FeatureEncoder`] expands a [`CropQuery`] against it into a
//! 12-element 0/1 [`FeatureVector`]:
//!
//! ```text
//! soil_type (6)                         season (3)               rainfall_level (3)
//! clay sandy loamy silt peat chalk  |  winter summer monsoon  |  low medium high
//! ```
//!
//! Training and prediction both go through this module; the ordering is never
//! restated elsewhere. A value outside its list contributes an all-zero block.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Allowed soil types, in feature order.
pub const SOIL_TYPES: [&str; 6] = ["clay", "sandy", "loamy", "silt", "peat", "chalk"];

/// Allowed seasons, in feature order.
pub const SEASONS: [&str; 3] = ["winter", "summer", "monsoon"];

/// Allowed rainfall levels, in feature order.
pub const RAINFALL_LEVELS: [&str; 3] = ["low", "medium", "high"];

static STANDARD_SCHEMA_TAG: Lazy<String> =
    Lazy::new(|| CategoryOrdering::standard().compute_schema_tag());

/// Trim and lower-case a categorical value.
///
/// This is the only normalization applied to soil, season, rainfall and crop
/// values anywhere in the pipeline.
pub fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

/// One categorical feature dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    SoilType,
    Season,
    RainfallLevel,
}

impl Dimension {
    /// All dimensions in encoding order.
    pub const ALL: [Dimension; 3] = [Self::SoilType, Self::Season, Self::RainfallLevel];

    /// Column / field name used in the CSV header and in forms.
    pub fn column_name(&self) -> &'static str {
        match self {
            Self::SoilType => "soil_type",
            Self::Season => "season",
            Self::RainfallLevel => "rainfall_level",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column_name())
    }
}

/// The fixed, position-significant value lists for each dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryOrdering {
    soil_types: &'static [&'static str],
    seasons: &'static [&'static str],
    rainfall_levels: &'static [&'static str],
}

impl Default for CategoryOrdering {
    fn default() -> Self {
        Self::standard()
    }
}

impl CategoryOrdering {
    /// The ordering every artifact in this crate is trained and read with.
    pub const fn standard() -> Self {
        Self::new(&SOIL_TYPES, &SEASONS, &RAINFALL_LEVELS)
    }

    /// An ordering over other value lists. Artifacts trained with it carry a
    /// different schema tag and will not load under [`standard`](Self::standard).
    pub const fn new(
        soil_types: &'static [&'static str],
        seasons: &'static [&'static str],
        rainfall_levels: &'static [&'static str],
    ) -> Self {
        Self {
            soil_types,
            seasons,
            rainfall_levels,
        }
    }

    /// Values allowed for `dimension`, in feature order.
    pub fn values(&self, dimension: Dimension) -> &'static [&'static str] {
        match dimension {
            Dimension::SoilType => self.soil_types,
            Dimension::Season => self.seasons,
            Dimension::RainfallLevel => self.rainfall_levels,
        }
    }

    /// Dimensions paired with their values, in encoding order.
    pub fn dimensions(&self) -> impl Iterator<Item = (Dimension, &'static [&'static str])> + '_ {
        Dimension::ALL.into_iter().map(|d| (d, self.values(d)))
    }

    /// Whether `value` (already normalized) is allowed for `dimension`.
    pub fn contains(&self, dimension: Dimension, value: &str) -> bool {
        self.values(dimension).contains(&value)
    }

    /// Total length of an encoded feature vector.
    pub fn feature_len(&self) -> usize {
        self.soil_types.len() + self.seasons.len() + self.rainfall_levels.len()
    }

    /// Canonical text form, hashed into the schema tag.
    pub fn canonical(&self) -> String {
        self.dimensions()
            .map(|(d, values)| format!("{}={}", d.column_name(), values.join(",")))
            .collect::<Vec<_>>()
            .join(";")
    }

    /// Lowercase hex SHA-256 of [`canonical`](Self::canonical).
    ///
    /// Stored in both artifact headers; a loaded pair whose tag differs from
    /// the running encoder's is refused.
    pub fn schema_tag(&self) -> String {
        if *self == Self::standard() {
            return STANDARD_SCHEMA_TAG.clone();
        }
        self.compute_schema_tag()
    }

    fn compute_schema_tag(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.canonical().as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

/// A normalized (soil type, season, rainfall level) triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CropQuery {
    pub soil_type: String,
    pub season: String,
    pub rainfall_level: String,
}

impl CropQuery {
    /// Build a query, normalizing each field.
    pub fn new(soil_type: &str, season: &str, rainfall_level: &str) -> Self {
        Self {
            soil_type: normalize(soil_type),
            season: normalize(season),
            rainfall_level: normalize(rainfall_level),
        }
    }

    /// The value of one dimension.
    pub fn value(&self, dimension: Dimension) -> &str {
        match dimension {
            Dimension::SoilType => &self.soil_type,
            Dimension::Season => &self.season,
            Dimension::RainfallLevel => &self.rainfall_level,
        }
    }
}

impl fmt::Display for CropQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "soil={}, season={}, rainfall={}",
            self.soil_type, self.season, self.rainfall_level
        )
    }
}

/// A one-hot encoded query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FeatureVector(Vec<u8>);

impl FeatureVector {
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Row form consumed by the classifier.
    pub fn to_f64_row(&self) -> Vec<f64> {
        self.0.iter().map(|&bit| f64::from(bit)).collect()
    }
}

/// Expands crop queries into feature vectors.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureEncoder {
    ordering: CategoryOrdering,
}

impl FeatureEncoder {
    pub fn new(ordering: CategoryOrdering) -> Self {
        Self { ordering }
    }

    pub fn ordering(&self) -> &CategoryOrdering {
        &self.ordering
    }

    /// Encode already-normalized values.
    pub fn encode(&self, soil_type: &str, season: &str, rainfall_level: &str) -> FeatureVector {
        let mut bits = Vec::with_capacity(self.ordering.feature_len());
        for (value, allowed) in [
            (soil_type, self.ordering.soil_types),
            (season, self.ordering.seasons),
            (rainfall_level, self.ordering.rainfall_levels),
        ] {
            bits.extend(allowed.iter().map(|category| u8::from(value == *category)));
        }
        FeatureVector(bits)
    }

    pub fn encode_query(&self, query: &CropQuery) -> FeatureVector {
        self.encode(&query.soil_type, &query.season, &query.rainfall_level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn block(vector: &FeatureVector, dimension: Dimension) -> &[u8] {
        let ordering = CategoryOrdering::standard();
        let mut start = 0;
        for (d, values) in ordering.dimensions() {
            if d == dimension {
                return &vector.as_slice()[start..start + values.len()];
            }
            start += values.len();
        }
        unreachable!()
    }

    #[test]
    fn test_feature_len_is_twelve() {
        let encoder = FeatureEncoder::default();
        assert_eq!(encoder.ordering().feature_len(), 12);
        assert_eq!(encoder.encode("clay", "winter", "low").len(), 12);
        assert_eq!(encoder.encode("", "", "").len(), 12);
        assert_eq!(encoder.encode("granite", "autumn", "extreme").len(), 12);
    }

    #[test]
    fn test_each_value_sets_exactly_one_bit_in_its_block() {
        let encoder = FeatureEncoder::default();
        let ordering = CategoryOrdering::standard();
        for (dimension, values) in ordering.dimensions() {
            for (position, value) in values.iter().enumerate() {
                let mut query = CropQuery::new("unknown", "unknown", "unknown");
                match dimension {
                    Dimension::SoilType => query.soil_type = value.to_string(),
                    Dimension::Season => query.season = value.to_string(),
                    Dimension::RainfallLevel => query.rainfall_level = value.to_string(),
                }
                let vector = encoder.encode_query(&query);
                let bits = block(&vector, dimension);
                assert_eq!(bits.iter().map(|&b| b as usize).sum::<usize>(), 1);
                assert_eq!(bits[position], 1, "{dimension}={value}");
                // Other dimensions got unknown values.
                assert_eq!(vector.as_slice().iter().map(|&b| b as usize).sum::<usize>(), 1);
            }
        }
    }

    #[test]
    fn test_unknown_value_gives_zero_block() {
        let encoder = FeatureEncoder::default();
        let vector = encoder.encode("granite", "summer", "low");
        assert_eq!(block(&vector, Dimension::SoilType), &[0, 0, 0, 0, 0, 0]);
        assert_eq!(block(&vector, Dimension::Season), &[0, 1, 0]);
        assert_eq!(block(&vector, Dimension::RainfallLevel), &[1, 0, 0]);
    }

    #[test]
    fn test_encode_is_case_sensitive_without_normalization() {
        let encoder = FeatureEncoder::default();
        let raw = encoder.encode("Clay", "winter", "low");
        assert_eq!(block(&raw, Dimension::SoilType), &[0, 0, 0, 0, 0, 0]);

        let query = CropQuery::new("  Clay ", "WINTER", "Low");
        let normalized = encoder.encode_query(&query);
        assert_eq!(
            normalized.as_slice(),
            &[1, 0, 0, 0, 0, 0, 1, 0, 0, 1, 0, 0]
        );
    }

    #[test]
    fn test_full_vector_layout() {
        let encoder = FeatureEncoder::default();
        let vector = encoder.encode("chalk", "monsoon", "high");
        assert_eq!(vector.as_slice(), &[0, 0, 0, 0, 0, 1, 0, 0, 1, 0, 0, 1]);
        assert_eq!(
            vector.to_f64_row(),
            vec![0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0]
        );
    }

    #[test]
    fn test_schema_tag_is_stable_hex() {
        let ordering = CategoryOrdering::standard();
        let tag = ordering.schema_tag();
        assert_eq!(tag.len(), 64);
        assert!(tag.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(tag, ordering.compute_schema_tag());
        assert_eq!(
            ordering.canonical(),
            "soil_type=clay,sandy,loamy,silt,peat,chalk;season=winter,summer,monsoon;rainfall_level=low,medium,high"
        );
    }

    #[test]
    fn test_schema_tag_changes_with_ordering() {
        static REORDERED: [&str; 3] = ["summer", "winter", "monsoon"];
        let reordered = CategoryOrdering {
            seasons: &REORDERED,
            ..CategoryOrdering::standard()
        };
        assert_ne!(reordered.schema_tag(), CategoryOrdering::standard().schema_tag());
    }

    #[test]
    fn test_contains_uses_normalized_values() {
        let ordering = CategoryOrdering::standard();
        assert!(ordering.contains(Dimension::Season, "monsoon"));
        assert!(!ordering.contains(Dimension::Season, "Monsoon"));
        assert!(ordering.contains(Dimension::RainfallLevel, &normalize(" Medium ")));
    }
}
