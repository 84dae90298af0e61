//! Integration tests for training, artifact persistence and cached prediction.
//!
//! Each test trains into its own temporary directory laid out like the
//! default `ml/` tree: `data/crop_dataset.csv` plus the two artifact files.

use crop_learning::{
    ArtifactStore, CategoryOrdering, CropLearningError, CropQuery, Dataset, FeatureEncoder,
    LearningConfig, ModelCache, ProgressUpdate, Trainer, TrainingStage, read_queries,
};
use pretty_assertions::assert_eq;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

// ============================================================================
// Helper Functions
// ============================================================================

fn fixtures_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

/// A fresh base directory with `fixture` installed as the training CSV.
fn workspace_with(fixture: &str) -> (TempDir, LearningConfig) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let config = LearningConfig::rooted_at(dir.path());
    install_dataset(&config, fixture);
    (dir, config)
}

fn install_dataset(config: &LearningConfig, fixture: &str) {
    let dest = &config.dataset_path;
    fs::create_dir_all(dest.parent().unwrap()).unwrap();
    fs::copy(fixtures_path().join(fixture), dest).expect("Failed to copy fixture");
}

fn train(config: &LearningConfig) -> crop_learning::TrainingResult {
    Trainer::builder()
        .config(config.clone())
        .build()
        .train()
        .expect("Training should succeed")
}

fn artifact_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_file())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

// ============================================================================
// Training and Prediction
// ============================================================================

#[test]
fn test_two_row_dataset_predicts_each_crop() {
    let (_dir, config) = workspace_with("two_crops.csv");
    let result = train(&config);

    assert_eq!(result.rows, 2);
    assert_eq!(result.classes, vec!["rice".to_string(), "wheat".to_string()]);
    assert_eq!(result.feature_len, 12);
    assert_eq!(result.random_seed, 42);
    assert!(result.model_path.is_file());
    assert!(result.label_path.is_file());

    let cache = ModelCache::new(&config);
    assert_eq!(
        cache.predict(&CropQuery::new("clay", "winter", "low")).unwrap(),
        "wheat"
    );
    assert_eq!(
        cache.predict(&CropQuery::new("Sandy", " SUMMER ", "high")).unwrap(),
        "rice"
    );
}

#[test]
fn test_prediction_for_unknown_values_still_returns_a_known_crop() {
    let (_dir, config) = workspace_with("two_crops.csv");
    train(&config);

    let cache = ModelCache::new(&config);
    let crop = cache
        .predict(&CropQuery::new("volcanic", "spring", "extreme"))
        .unwrap();
    assert!(crop == "rice" || crop == "wheat", "unexpected crop {crop}");
}

#[test]
fn test_training_is_deterministic() {
    let (_a, config_a) = workspace_with("crop_dataset.csv");
    let (_b, config_b) = workspace_with("crop_dataset.csv");
    let result_a = train(&config_a);
    let result_b = train(&config_b);
    assert_eq!(result_a.classes, result_b.classes);
    assert_eq!(result_a.class_counts, result_b.class_counts);

    let cache_a = ModelCache::new(&config_a);
    let cache_b = ModelCache::new(&config_b);
    for soil in crop_learning::SOIL_TYPES {
        for season in crop_learning::SEASONS {
            for rainfall in crop_learning::RAINFALL_LEVELS {
                let query = CropQuery::new(soil, season, rainfall);
                let a = cache_a.predict(&query).unwrap();
                let b = cache_b.predict(&query).unwrap();
                assert_eq!(a, b, "predictions diverged for {query}");
                assert!(result_a.classes.contains(&a));
            }
        }
    }
}

#[test]
fn test_unbounded_tree_reproduces_every_training_row() {
    let (_dir, config) = workspace_with("crop_dataset.csv");
    train(&config);
    let dataset = Dataset::from_csv(&config.dataset_path).unwrap();

    let cache = ModelCache::new(&config);
    for row in dataset.rows() {
        assert_eq!(
            cache.predict(&row.query).unwrap(),
            row.crop,
            "training row {} not reproduced",
            row.query
        );
    }

    let queries: Vec<CropQuery> = dataset.rows().iter().map(|r| r.query.clone()).collect();
    let expected: Vec<String> = dataset.crops().map(str::to_string).collect();
    assert_eq!(cache.predict_batch(&queries).unwrap(), expected);
}

#[test]
fn test_single_crop_dataset_always_predicts_that_crop() {
    let (_dir, config) = workspace_with("single_crop.csv");
    let result = train(&config);
    assert_eq!(result.classes, vec!["wheat".to_string()]);

    let cache = ModelCache::new(&config);
    assert_eq!(
        cache.predict(&CropQuery::new("clay", "winter", "low")).unwrap(),
        "wheat"
    );
    assert_eq!(
        cache.predict(&CropQuery::new("peat", "monsoon", "high")).unwrap(),
        "wheat"
    );
}

#[test]
fn test_batch_prediction_from_query_csv() {
    let (_dir, config) = workspace_with("two_crops.csv");
    train(&config);

    let queries = read_queries(fixtures_path().join("two_crop_queries.csv")).unwrap();
    let crops = ModelCache::new(&config).predict_batch(&queries).unwrap();
    assert_eq!(crops, vec!["wheat", "rice", "wheat"]);
    assert!(ModelCache::new(&config).predict_batch(&[]).unwrap().is_empty());
}

#[test]
fn test_dataset_normalizes_and_ignores_extra_columns() {
    let (_dir, config) = workspace_with("crop_dataset.csv");
    let result = train(&config);

    assert_eq!(result.rows, 18);
    assert_eq!(result.class_counts.get("rice"), Some(&3));
    assert!(!result.classes.iter().any(|c| c.chars().any(char::is_uppercase)));
    let mut sorted = result.classes.clone();
    sorted.sort();
    assert_eq!(result.classes, sorted);
}

#[test]
fn test_progress_reports_stages_in_order() {
    let (_dir, config) = workspace_with("two_crops.csv");
    let stages = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&stages);

    Trainer::builder()
        .config(config)
        .on_progress(move |update: ProgressUpdate| sink.lock().unwrap().push(update.stage))
        .build()
        .train()
        .unwrap();

    assert_eq!(
        *stages.lock().unwrap(),
        vec![
            TrainingStage::Loading,
            TrainingStage::Encoding,
            TrainingStage::Fitting,
            TrainingStage::Saving,
            TrainingStage::Complete,
        ]
    );
}

// ============================================================================
// Training Failures
// ============================================================================

#[test]
fn test_missing_column_fails_without_writing_artifacts() {
    let (dir, config) = workspace_with("missing_crop_column.csv");
    let err = Trainer::builder()
        .config(config)
        .build()
        .train()
        .unwrap_err();

    assert!(err.is_configuration());
    assert!(err.to_string().contains("crop"));
    assert_eq!(artifact_files(dir.path()), Vec::<String>::new());
}

#[test]
fn test_missing_dataset_is_configuration_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = LearningConfig::rooted_at(dir.path());
    let err = Trainer::builder().config(config).build().train().unwrap_err();
    assert_eq!(err.error_code(), "CONFIGURATION_ERROR");
    assert!(err.to_string().contains("Dataset not found"));
}

#[test]
fn test_header_only_dataset_is_configuration_error() {
    let (dir, config) = workspace_with("header_only.csv");
    let err = Trainer::builder().config(config).build().train().unwrap_err();
    assert!(err.is_configuration());
    assert_eq!(artifact_files(dir.path()), Vec::<String>::new());
}

#[test]
fn test_empty_crop_label_is_configuration_error() {
    let (_dir, config) = workspace_with("empty_crop_label.csv");
    let err = Trainer::builder().config(config).build().train().unwrap_err();
    assert!(err.is_configuration());
    assert!(err.to_string().contains("Row 3"));
}

#[test]
fn test_failed_retrain_keeps_previous_artifacts() {
    let (_dir, config) = workspace_with("two_crops.csv");
    let first = train(&config);

    install_dataset(&config, "missing_crop_column.csv");
    let stages = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&stages);
    let err = Trainer::builder()
        .config(config.clone())
        .on_progress(move |u: ProgressUpdate| sink.lock().unwrap().push(u.stage))
        .build()
        .train()
        .unwrap_err();
    assert!(err.is_configuration());
    assert_eq!(stages.lock().unwrap().last(), Some(&TrainingStage::Failed));

    let (header, _) = ArtifactStore::new(&config).inspect().unwrap();
    assert_eq!(header.training_id, first.training_id);
}

// ============================================================================
// Artifact Loading
// ============================================================================

#[test]
fn test_missing_artifacts_report_model_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let cache = ModelCache::new(&LearningConfig::rooted_at(dir.path()));
    let err = cache
        .predict(&CropQuery::new("clay", "winter", "low"))
        .unwrap_err();
    assert!(err.is_model_unavailable());
    assert!(matches!(err, CropLearningError::ArtifactMissing { .. }));
}

#[test]
fn test_only_one_artifact_present_is_missing() {
    let (_dir, config) = workspace_with("two_crops.csv");
    train(&config);
    fs::remove_file(config.label_path()).unwrap();

    let err = ModelCache::new(&config).get().unwrap_err();
    assert_eq!(err.error_code(), "ARTIFACT_MISSING");
    assert!(!ArtifactStore::new(&config).exists());
}

#[test]
fn test_artifacts_from_different_runs_are_refused() {
    let (_a, config_a) = workspace_with("two_crops.csv");
    let (_b, config_b) = workspace_with("crop_dataset.csv");
    train(&config_a);
    train(&config_b);

    fs::copy(config_b.label_path(), config_a.label_path()).unwrap();

    let err = ModelCache::new(&config_a).get().unwrap_err();
    assert_eq!(err.error_code(), "ARTIFACT_MISMATCH");
    assert!(err.is_model_unavailable());
}

#[test]
fn test_artifacts_from_other_category_ordering_are_refused() {
    let (_dir, config) = workspace_with("two_crops.csv");
    train(&config);

    static SOILS: [&str; 2] = ["clay", "sandy"];
    let other = FeatureEncoder::new(CategoryOrdering::new(
        &SOILS,
        &crop_learning::SEASONS,
        &crop_learning::RAINFALL_LEVELS,
    ));
    let err = ModelCache::with_encoder(&config, other).get().unwrap_err();
    assert_eq!(err.error_code(), "ARTIFACT_MISMATCH");
}

#[test]
fn test_corrupt_artifact_is_reported() {
    let (_dir, config) = workspace_with("two_crops.csv");
    train(&config);
    fs::write(config.model_path(), b"not messagepack").unwrap();

    let err = ModelCache::new(&config).get().unwrap_err();
    assert!(err.is_model_unavailable());
    assert_eq!(err.error_code(), "ARTIFACT_CORRUPT");
}

#[test]
fn test_no_temporary_files_left_behind() {
    let (dir, config) = workspace_with("two_crops.csv");
    train(&config);
    train(&config);
    assert_eq!(
        artifact_files(dir.path()),
        vec!["crop_model.bin".to_string(), "label_encoder.bin".to_string()]
    );
}

// ============================================================================
// Model Cache
// ============================================================================

#[test]
fn test_cache_reuses_loaded_model() {
    let (_dir, config) = workspace_with("two_crops.csv");
    train(&config);

    let cache = ModelCache::new(&config);
    let first = cache.get().unwrap();
    let second = cache.get().unwrap();
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn test_cache_picks_up_retrained_model() {
    let (_dir, config) = workspace_with("two_crops.csv");
    let first = train(&config);
    let cache = ModelCache::new(&config);
    assert_eq!(cache.get().unwrap().metadata().training_id, first.training_id);

    install_dataset(&config, "crop_dataset.csv");
    let second = train(&config);
    cache.invalidate();

    let model = cache.get().unwrap();
    assert_eq!(model.metadata().training_id, second.training_id);
    assert_eq!(model.classes(), second.classes.as_slice());
}

#[test]
fn test_cache_reports_missing_after_deletion() {
    let (_dir, config) = workspace_with("two_crops.csv");
    train(&config);
    let cache = ModelCache::new(&config);
    cache.get().unwrap();
    assert!(cache.is_loaded());

    fs::remove_file(config.model_path()).unwrap();
    let err = cache.get().unwrap_err();
    assert_eq!(err.error_code(), "ARTIFACT_MISSING");
    assert!(!cache.is_loaded());
}

#[test]
fn test_status_reads_headers_without_loading() {
    let (_dir, config) = workspace_with("two_crops.csv");
    let store = ArtifactStore::new(&config);
    assert!(!store.status().model_loaded);

    let result = train(&config);
    let status = store.status();
    assert!(status.model_loaded);
    let (model, labels) = status.headers.expect("headers should be readable");
    assert_eq!(model.training_id, result.training_id);
    assert_eq!(labels.training_id, result.training_id);
    assert_eq!(model.schema_tag, CategoryOrdering::standard().schema_tag());
    assert_eq!(status.problem, None);
}
