//! Resolving a [`LearningConfig`] from a JSON file, environment and flags.
//!
//! Precedence, lowest first: built-in defaults rooted at [`DEFAULT_BASE_DIR`],
//! the JSON config file, the base directory (flag or `CROP_ADVISOR_HOME`),
//! then per-command flags.

use crate::error::{AdvisorError, Result};
use crop_learning::LearningConfig;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DEFAULT_BASE_DIR: &str = "ml";

/// Values that override the config file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub base_dir: Option<PathBuf>,
    pub config_file: Option<PathBuf>,
    pub dataset_path: Option<PathBuf>,
    pub random_seed: Option<u64>,
    pub max_depth: Option<u16>,
}

impl ConfigOverrides {
    /// Merge everything into a validated configuration.
    pub fn resolve(&self) -> Result<LearningConfig> {
        let mut config = match self.config_file {
            Some(ref path) => {
                let mut config = load_config_file(path)?;
                if let Some(ref base) = self.base_dir {
                    let rooted = LearningConfig::rooted_at(base);
                    config.dataset_path = rooted.dataset_path;
                    config.artifact_dir = rooted.artifact_dir;
                }
                config
            }
            None => LearningConfig::rooted_at(
                self.base_dir
                    .as_deref()
                    .unwrap_or_else(|| Path::new(DEFAULT_BASE_DIR)),
            ),
        };

        if let Some(ref path) = self.dataset_path {
            config.dataset_path = path.clone();
        }
        if let Some(seed) = self.random_seed {
            config.tree.random_seed = seed;
        }
        if let Some(depth) = self.max_depth {
            config.tree.max_depth = Some(depth);
        }

        config.validate()?;
        debug!(
            dataset = %config.dataset_path.display(),
            artifacts = %config.artifact_dir.display(),
            "Resolved configuration"
        );
        Ok(config)
    }
}

/// Read a JSON [`LearningConfig`]. Missing fields take their defaults.
pub fn load_config_file(path: &Path) -> Result<LearningConfig> {
    let text = std::fs::read_to_string(path).map_err(|source| AdvisorError::ConfigRead {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| AdvisorError::ConfigParse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults_root_at_ml() {
        let config = ConfigOverrides::default().resolve().unwrap();
        assert_eq!(config, LearningConfig::rooted_at("ml"));
    }

    #[test]
    fn test_flags_override_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("advisor.json");
        std::fs::write(
            &file,
            r#"{"model_file_name": "tree.bin", "tree": {"random_seed": 7, "max_depth": 4}}"#,
        )
        .unwrap();

        let overrides = ConfigOverrides {
            base_dir: Some(dir.path().join("home")),
            config_file: Some(file),
            random_seed: Some(11),
            ..Default::default()
        };
        let config = overrides.resolve().unwrap();
        assert_eq!(config.model_file_name, "tree.bin");
        assert_eq!(config.artifact_dir, dir.path().join("home"));
        assert_eq!(config.tree.random_seed, 11);
        assert_eq!(config.tree.max_depth, Some(4));
    }

    #[test]
    fn test_bad_json_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("advisor.json");
        std::fs::write(&file, "{not json").unwrap();
        let err = ConfigOverrides {
            config_file: Some(file),
            ..Default::default()
        }
        .resolve()
        .unwrap_err();
        assert_eq!(err.error_code(), "CONFIG_PARSE_ERROR");
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let err = ConfigOverrides {
            max_depth: Some(0),
            ..Default::default()
        }
        .resolve()
        .unwrap_err();
        assert!(matches!(err, AdvisorError::InvalidConfig(_)));
    }
}
