//! Process-wide cache of the loaded model.
//!
//! Loading the artifacts on every request would be wasteful, so a
//! [`ModelCache`] holds the last loaded [`CropModel`] together with the
//! [`ArtifactStamp`] it was loaded from. Each [`get`](ModelCache::get) compares
//! the stamp on disk against the cached one and reloads when they differ.
//!
//! File modification times can be coarse, so a retrain that lands within the
//! same tick and size could go unnoticed. Callers that retrain in-process call
//! [`invalidate`](ModelCache::invalidate) afterwards.
//!
//! The lock is a `parking_lot::RwLock`. Readers share the cached model through
//! an `Arc`, so a reload never blocks an in-flight prediction.

use crate::artifact::{ArtifactStamp, ArtifactStore};
use crate::config::LearningConfig;
use crate::encoder::{CropQuery, FeatureEncoder};
use crate::error::Result;
use crate::model::CropModel;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info};

struct Loaded {
    stamp: ArtifactStamp,
    model: Arc<CropModel>,
}

/// Lazily loaded, stamp-checked model shared between requests.
pub struct ModelCache {
    store: ArtifactStore,
    encoder: FeatureEncoder,
    loaded: RwLock<Option<Loaded>>,
}

static_assertions::assert_impl_all!(ModelCache: Send, Sync);

impl std::fmt::Debug for ModelCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelCache")
            .field("store", &self.store)
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

impl ModelCache {
    pub fn new(config: &LearningConfig) -> Self {
        Self::with_encoder(config, FeatureEncoder::default())
    }

    /// Cache whose loads are checked against `encoder`'s category ordering.
    pub fn with_encoder(config: &LearningConfig, encoder: FeatureEncoder) -> Self {
        Self {
            store: ArtifactStore::new(config),
            encoder,
            loaded: RwLock::new(None),
        }
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Whether a model is currently held in memory.
    pub fn is_loaded(&self) -> bool {
        self.loaded.read().is_some()
    }

    /// Return the current model, loading or reloading it if the files changed.
    ///
    /// # Errors
    ///
    /// Any error from [`ArtifactStore::load_pair`]. A failed load clears the
    /// cache, so deleted artifacts are reported as missing instead of serving
    /// the stale model.
    pub fn get(&self) -> Result<Arc<CropModel>> {
        let stamp = match self.store.stamp() {
            Ok(stamp) => stamp,
            Err(e) => {
                self.invalidate();
                return Err(e);
            }
        };

        if let Some(model) = Self::fresh(self.loaded.read().as_ref(), &stamp) {
            return Ok(model);
        }

        let mut guard = self.loaded.write();
        // Another thread may have reloaded while we waited for the write lock.
        if let Some(model) = Self::fresh(guard.as_ref(), &stamp) {
            return Ok(model);
        }

        match self.store.load_pair(self.encoder.ordering()) {
            Ok(model) => {
                let model = Arc::new(model);
                info!(
                    training_id = %model.metadata().training_id,
                    "Loaded crop model from {}",
                    self.store.model_path().display()
                );
                *guard = Some(Loaded {
                    stamp,
                    model: Arc::clone(&model),
                });
                Ok(model)
            }
            Err(e) => {
                *guard = None;
                Err(e)
            }
        }
    }

    fn fresh(loaded: Option<&Loaded>, stamp: &ArtifactStamp) -> Option<Arc<CropModel>> {
        loaded
            .filter(|l| l.stamp == *stamp)
            .map(|l| Arc::clone(&l.model))
    }

    /// Predict the top-1 crop through the cached model.
    pub fn predict(&self, query: &CropQuery) -> Result<String> {
        self.get()?.predict(query)
    }

    /// Predict one crop per query with the current model, in order.
    pub fn predict_batch(&self, queries: &[CropQuery]) -> Result<Vec<String>> {
        self.get()?.predict_batch(queries)
    }

    /// Drop the cached model; the next [`get`](Self::get) reloads from disk.
    pub fn invalidate(&self) {
        if self.loaded.write().take().is_some() {
            debug!("Crop model cache invalidated");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_without_artifacts_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ModelCache::new(&LearningConfig::rooted_at(dir.path()));
        let err = cache.get().unwrap_err();
        assert_eq!(err.error_code(), "ARTIFACT_MISSING");
        assert!(!cache.is_loaded());
    }

    #[test]
    fn test_invalidate_on_empty_cache_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ModelCache::new(&LearningConfig::rooted_at(dir.path()));
        cache.invalidate();
        assert!(!cache.is_loaded());
    }
}
