//! Training configuration
//!
//! [`TrainerConfig`] is read from TOML, then overridden by `SALESCAST_*`
//! environment variables, then by CLI flags. Every section has defaults, so
//! an empty file is a valid configuration.

use crate::errors::{Result, TrainerError};
use crate::search::{BoostingSpace, SearchSettings};
use salescast_core::model::ForestParams;
use salescast_core::preprocessor::TargetEncoderConfig;
use salescast_core::{ColumnRoles, LeakagePolicy, ModelFamily};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Complete training configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    /// Seed for the split, the folds, the search and every model
    pub seed: u64,
    /// Families to train, in tie-breaking order
    pub families: Vec<ModelFamily>,
    pub split: SplitConfig,
    pub search: SearchConfig,
    pub boosting_space: BoostingSpace,
    pub forest: ForestConfig,
    pub features: FeatureConfig,
    pub artifacts: ArtifactConfig,
    pub logging: LoggingConfig,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            families: ModelFamily::ALL.to_vec(),
            split: SplitConfig::default(),
            search: SearchConfig::default(),
            boosting_space: BoostingSpace::default(),
            forest: ForestConfig::default(),
            features: FeatureConfig::default(),
            artifacts: ArtifactConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl TrainerConfig {
    pub fn search_settings(&self) -> SearchSettings {
        SearchSettings {
            iterations: self.search.iterations,
            folds: self.search.folds,
            seed: self.seed,
        }
    }

    /// Configured families in order, each once
    pub fn training_families(&self) -> Vec<ModelFamily> {
        let mut families = Vec::new();
        for family in &self.families {
            if !families.contains(family) {
                families.push(*family);
            }
        }
        families
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    /// Fraction of rows held out for evaluation
    pub test_fraction: f64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self { test_fraction: 0.2 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub iterations: usize,
    pub folds: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            iterations: 25,
            folds: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestConfig {
    pub random_forest: ForestParams,
    pub extra_trees: ForestParams,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            random_forest: ForestParams::random_forest(),
            extra_trees: ForestParams::extra_trees(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    pub leakage_policy: LeakagePolicy,
    pub roles: ColumnRoles,
    pub target_encoding: TargetEncoderConfig,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            leakage_policy: LeakagePolicy::TrainOnly,
            roles: ColumnRoles::sales_default(),
            target_encoding: TargetEncoderConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactConfig {
    pub directory: PathBuf,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("artifacts"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing` filter directive, e.g. `info` or `salescast_trainer=debug`
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Environment variables consulted by [`ConfigManager::load_from_env`]
pub const ENV_SEED: &str = "SALESCAST_SEED";
pub const ENV_ARTIFACT_DIR: &str = "SALESCAST_ARTIFACT_DIR";
pub const ENV_LOG_LEVEL: &str = "SALESCAST_LOG_LEVEL";
pub const ENV_SEARCH_ITERATIONS: &str = "SALESCAST_SEARCH_ITERATIONS";
pub const ENV_FOLDS: &str = "SALESCAST_FOLDS";

/// Loads, layers and validates a [`TrainerConfig`]
#[derive(Debug, Default)]
pub struct ConfigManager {
    config: TrainerConfig,
    /// Dotted key → value of every override applied so far
    overrides: BTreeMap<String, String>,
}

impl ConfigManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: TrainerConfig) -> Self {
        Self {
            config,
            overrides: BTreeMap::new(),
        }
    }

    /// Replace the configuration with the contents of a TOML file
    pub fn load_from_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        let content = std::fs::read_to_string(path).map_err(|e| {
            TrainerError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        self.config = toml::from_str(&content)
            .map_err(|e| TrainerError::Config(format!("failed to parse {}: {}", path.display(), e)))?;
        Ok(())
    }

    /// Apply `SALESCAST_*` overrides from the process environment
    pub fn load_from_env(&mut self) -> Result<()> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup(ENV_SEED) {
            self.config.seed = parse_env(ENV_SEED, &val)?;
            self.overrides.insert("seed".into(), val);
        }
        if let Some(val) = lookup(ENV_ARTIFACT_DIR) {
            self.config.artifacts.directory = PathBuf::from(&val);
            self.overrides.insert("artifacts.directory".into(), val);
        }
        if let Some(val) = lookup(ENV_LOG_LEVEL) {
            self.config.logging.level = val.clone();
            self.overrides.insert("logging.level".into(), val);
        }
        if let Some(val) = lookup(ENV_SEARCH_ITERATIONS) {
            self.config.search.iterations = parse_env(ENV_SEARCH_ITERATIONS, &val)?;
            self.overrides.insert("search.iterations".into(), val);
        }
        if let Some(val) = lookup(ENV_FOLDS) {
            self.config.search.folds = parse_env(ENV_FOLDS, &val)?;
            self.overrides.insert("search.folds".into(), val);
        }
        Ok(())
    }

    /// Record an override applied outside this manager (e.g. a CLI flag)
    pub fn set_override(&mut self, key: impl Into<String>, value: impl ToString) {
        self.overrides.insert(key.into(), value.to_string());
    }

    pub fn overrides(&self) -> &BTreeMap<String, String> {
        &self.overrides
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut TrainerConfig {
        &mut self.config
    }

    pub fn into_config(self) -> TrainerConfig {
        self.config
    }

    /// Reject configurations training cannot run with
    pub fn validate(&self) -> Result<()> {
        let config = &self.config;
        let invalid = |msg: String| Err(TrainerError::Config(msg));

        let fraction = config.split.test_fraction;
        if !(fraction > 0.0 && fraction < 1.0) {
            return invalid(format!("split.test_fraction must be in (0, 1), got {fraction}"));
        }
        if config.search.folds < 2 {
            return invalid(format!("search.folds must be >= 2, got {}", config.search.folds));
        }
        if config.search.iterations == 0 {
            return invalid("search.iterations must be >= 1".into());
        }
        if config.families.is_empty() {
            return invalid("at least one model family must be enabled".into());
        }
        config
            .boosting_space
            .size()
            .map_err(|e| TrainerError::Config(e.to_string()))?;
        config.forest.random_forest.validate()?;
        config.forest.extra_trees.validate()?;
        config.features.roles.validate()?;
        let te = config.features.target_encoding;
        if !(te.smoothing > 0.0) || !te.min_samples_leaf.is_finite() {
            return invalid("target_encoding.smoothing must be positive".into());
        }

        let mut seen = Vec::new();
        for family in &config.families {
            if seen.contains(family) {
                warn!("Model family {} listed twice; training it once", family);
            } else {
                seen.push(*family);
            }
        }
        Ok(())
    }

    /// Enabled families with duplicates removed, in configured order
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(&self.config)
            .map_err(|e| TrainerError::Config(format!("failed to serialize config: {e}")))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to: {}", path.display());
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| TrainerError::Config(format!("{key}={value:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_are_valid() {
        let manager = ConfigManager::new();
        assert!(manager.validate().is_ok());
        let config = manager.config();
        assert_eq!(config.seed, 42);
        assert_eq!(config.search.iterations, 25);
        assert_eq!(config.search.folds, 5);
        assert_eq!(config.families, ModelFamily::ALL);
        assert_eq!(config.features.leakage_policy, LeakagePolicy::TrainOnly);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_SEED, "7"),
            (ENV_FOLDS, "3"),
            (ENV_ARTIFACT_DIR, "/tmp/out"),
        ]
        .into_iter()
        .collect();

        let mut manager = ConfigManager::new();
        manager
            .apply_overrides_from(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(manager.config().seed, 7);
        assert_eq!(manager.config().search.folds, 3);
        assert_eq!(manager.config().artifacts.directory, PathBuf::from("/tmp/out"));
        assert_eq!(manager.overrides().len(), 3);
    }

    #[test]
    fn test_bad_env_value_is_an_error() {
        let mut manager = ConfigManager::new();
        let err = manager
            .apply_overrides_from(|key| (key == ENV_SEED).then(|| "forty-two".to_string()))
            .unwrap_err();
        assert!(matches!(err, TrainerError::Config(_)));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut manager = ConfigManager::new();
        manager.config_mut().search.folds = 1;
        assert!(manager.validate().is_err());

        let mut manager = ConfigManager::new();
        manager.config_mut().split.test_fraction = 1.5;
        assert!(manager.validate().is_err());

        let mut manager = ConfigManager::new();
        manager.config_mut().boosting_space.learning_rate.clear();
        assert!(manager.validate().is_err());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("salescast.toml");

        let mut manager = ConfigManager::new();
        manager.config_mut().seed = 1234;
        manager.config_mut().features.leakage_policy = LeakagePolicy::WholeTable;
        manager.save_to_file(&path).unwrap();

        let mut loaded = ConfigManager::new();
        loaded.load_from_file(&path).unwrap();
        assert_eq!(loaded.config(), manager.config());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("partial.toml");
        std::fs::write(&path, "seed = 9\n[search]\niterations = 3\n").unwrap();

        let mut manager = ConfigManager::new();
        manager.load_from_file(&path).unwrap();
        assert_eq!(manager.config().seed, 9);
        assert_eq!(manager.config().search.iterations, 3);
        assert_eq!(manager.config().search.folds, 5);
        assert_eq!(manager.config().boosting_space, BoostingSpace::default());
    }

    #[test]
    fn test_duplicate_families_are_collapsed() {
        let mut manager = ConfigManager::new();
        manager.config_mut().families = vec![ModelFamily::ExtraTrees, ModelFamily::ExtraTrees];
        assert!(manager.validate().is_ok());
        assert_eq!(
            manager.config().training_families(),
            [ModelFamily::ExtraTrees]
        );
    }
}
