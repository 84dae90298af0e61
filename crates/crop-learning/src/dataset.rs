//! Training dataset loading.
//!
//! The CSV is read with polars, every column as a string. Only the four
//! required columns are looked at; any others are ignored.
//!
//! [`read_queries`] and [`read_crop_counts`] read the same kind of file with
//! looser requirements: the three feature columns for batch prediction, or
//! just the `crop` column for frequency tables.

use crate::encoder::{CropQuery, normalize};
use crate::error::{CropLearningError, Result, ResultExt};
use polars::io::csv::read::CsvReadOptions;
use polars::prelude::*;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// Header names the training CSV must contain (case-sensitive).
pub const REQUIRED_COLUMNS: [&str; 4] = ["soil_type", "season", "rainfall_level", "crop"];

/// Header names a batch query CSV must contain.
pub const QUERY_COLUMNS: [&str; 3] = ["soil_type", "season", "rainfall_level"];

/// One normalized training row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainingRow {
    pub query: CropQuery,
    pub crop: String,
}

/// Normalized training rows.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    rows: Vec<TrainingRow>,
}

impl Dataset {
    /// Load and normalize the CSV at `path`.
    ///
    /// # Errors
    ///
    /// [`CropLearningError::Configuration`] when the file does not exist, a
    /// required column is missing, there are no data rows, or a row has an
    /// empty crop label.
    pub fn from_csv(path: impl AsRef<Path>) -> Result<Self> {
        let df = read_csv(path.as_ref(), &REQUIRED_COLUMNS)?;
        Self::from_dataframe(&df)
    }

    /// Normalize rows out of an already-loaded frame.
    pub fn from_dataframe(df: &DataFrame) -> Result<Self> {
        require_columns(df, &REQUIRED_COLUMNS)?;

        if df.height() == 0 {
            return Err(CropLearningError::Configuration(
                "Dataset contains no rows".to_string(),
            ));
        }

        let soil = string_values(df, "soil_type")?;
        let season = string_values(df, "season")?;
        let rainfall = string_values(df, "rainfall_level")?;
        let crop = string_values(df, "crop")?;

        let mut rows = Vec::with_capacity(df.height());
        for (idx, (((soil, season), rainfall), crop)) in soil
            .into_iter()
            .zip(season)
            .zip(rainfall)
            .zip(crop)
            .enumerate()
        {
            let crop = normalize(&crop);
            if crop.is_empty() {
                // idx + 2: one for the header, one for 1-based numbering
                return Err(CropLearningError::Configuration(format!(
                    "Row {} has an empty crop label",
                    idx + 2
                )));
            }
            rows.push(TrainingRow {
                query: CropQuery::new(&soil, &season, &rainfall),
                crop,
            });
        }

        debug!("Normalized {} training rows", rows.len());
        Ok(Self { rows })
    }

    pub fn from_rows(rows: Vec<TrainingRow>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[TrainingRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn crops(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().map(|row| row.crop.as_str())
    }

    /// Rows per crop, sorted by crop name.
    pub fn crop_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for crop in self.crops() {
            *counts.entry(crop.to_string()).or_insert(0) += 1;
        }
        counts
    }
}

/// Normalized queries from a CSV with the three feature columns, in file order.
///
/// A header-only file yields no queries. The `crop` column, if present, is
/// ignored.
///
/// # Errors
///
/// [`CropLearningError::Configuration`] when the file does not exist or a
/// feature column is missing.
pub fn read_queries(path: impl AsRef<Path>) -> Result<Vec<CropQuery>> {
    let df = read_csv(path.as_ref(), &QUERY_COLUMNS)?;
    require_columns(&df, &QUERY_COLUMNS)?;

    let soil = string_values(&df, "soil_type")?;
    let season = string_values(&df, "season")?;
    let rainfall = string_values(&df, "rainfall_level")?;
    Ok(soil
        .iter()
        .zip(&season)
        .zip(&rainfall)
        .map(|((soil, season), rainfall)| CropQuery::new(soil, season, rainfall))
        .collect())
}

/// Rows per normalized crop, reading only the `crop` column.
///
/// Blank and null crop cells are skipped. A header-only file gives an empty map.
///
/// # Errors
///
/// [`CropLearningError::Configuration`] when the file does not exist or has
/// no `crop` column.
pub fn read_crop_counts(path: impl AsRef<Path>) -> Result<BTreeMap<String, usize>> {
    let df = read_csv(path.as_ref(), &["crop"])?;
    require_columns(&df, &["crop"])?;

    let mut counts = BTreeMap::new();
    for crop in string_values(&df, "crop")? {
        let crop = normalize(&crop);
        if !crop.is_empty() {
            *counts.entry(crop).or_insert(0) += 1;
        }
    }
    Ok(counts)
}

/// Read a CSV with every column as a string.
fn read_csv(path: &Path, expected: &[&str]) -> Result<DataFrame> {
    if !path.is_file() {
        return Err(CropLearningError::Configuration(format!(
            "Dataset not found at {}. Please add a CSV with columns: {}",
            path.display(),
            expected.join(",")
        )));
    }

    debug!("Reading CSV from {}", path.display());
    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .and_then(|reader| reader.finish())
        .map_err(|e| {
            CropLearningError::Configuration(format!(
                "Could not read dataset {}: {e}",
                path.display()
            ))
        })
}

fn require_columns(df: &DataFrame, required: &[&str]) -> Result<()> {
    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|name| df.column(name).is_err())
        .collect();
    if missing.is_empty() {
        return Ok(());
    }
    Err(CropLearningError::Configuration(format!(
        "Dataset must contain columns: {} (missing: {})",
        required.join(", "),
        missing.join(", ")
    )))
}

/// Column values as owned strings; nulls become "".
fn string_values(df: &DataFrame, name: &str) -> Result<Vec<String>> {
    let column = df.column(name).context(format!("Reading column '{name}'"))?;
    let casted = column
        .cast(&DataType::String)
        .context(format!("Casting column '{name}' to string"))?;
    let values = casted
        .str()
        .context(format!("Reading column '{name}' as string"))?
        .into_iter()
        .map(|value| value.unwrap_or_default().to_string())
        .collect();
    Ok(values)
}
