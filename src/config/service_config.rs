//! Service Configuration - engine tables and tunables as TOML values
//!
//! Every table the engine consults (stage proportions, importance groups,
//! crop water needs, window reasons) is a field here. Each struct implements
//! `Default` with the built-in values from [`super::defaults`], so a missing
//! config file changes nothing.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::defaults;
use crate::model::ForestParams;
use crate::types::StageDefinition;

/// Environment variable naming the config file.
pub const CONFIG_ENV_VAR: &str = "AGRI_CONFIG";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "agri_config.toml";

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for one service deployment.
///
/// Load with `ServiceConfig::load()` which searches:
/// 1. `$AGRI_CONFIG` env var
/// 2. `./agri_config.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Model artifact, dataset and training parameters
    #[serde(default)]
    pub model: ModelConfig,

    /// Per-crop stage tables
    #[serde(default)]
    pub phenology: PhenologyConfig,

    /// Importance grouping and capping
    #[serde(default)]
    pub importance: ImportanceConfig,

    /// Irrigation heuristic tables and thresholds
    #[serde(default)]
    pub irrigation: IrrigationConfig,
}

impl ServiceConfig {
    /// Load configuration using the standard search order:
    /// 1. `$AGRI_CONFIG` environment variable
    /// 2. `./agri_config.toml` in the current working directory
    /// 3. Built-in defaults
    pub fn load() -> Self {
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded service config from AGRI_CONFIG");
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from AGRI_CONFIG, falling back");
                    }
                }
            } else {
                warn!(path = %path, "AGRI_CONFIG points to non-existent file, falling back");
            }
        }

        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded service config from ./agri_config.toml");
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./agri_config.toml, using defaults");
                }
            }
        }

        info!("No agri_config.toml found, using built-in defaults");
        Self::default()
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;

        // Unknown keys only warn; existing configs keep working
        for w in super::validation::validate_unknown_keys(&contents) {
            warn!("{}", w);
        }

        let config: Self =
            toml::from_str(&contents).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `AGRI_MODEL_PATH`, `AGRI_DATASET_PATH` and `AGRI_SERVER_ADDR`.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("AGRI_MODEL_PATH") {
            self.model.artifact_path = PathBuf::from(path);
        }
        if let Ok(path) = std::env::var("AGRI_DATASET_PATH") {
            self.model.dataset_path = PathBuf::from(path);
        }
        if let Ok(addr) = std::env::var("AGRI_SERVER_ADDR") {
            self.server.addr = addr;
        }
    }

    /// Serialize the current config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = self.to_toml()?;
        std::fs::write(path, contents).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        info!(path = %path.display(), "Service config saved");
        Ok(())
    }

    /// Validate all tables for internal consistency.
    ///
    /// Rules:
    /// - Stage tables: codes and proportions strictly increase, proportions in (0, 1], last = 1.0
    /// - Forests: at least one tree, depth > 0
    /// - Importance ceiling in (0, 100], top-N > 0, every group has a rule
    /// - Irrigation multipliers finite and positive, cool threshold < hot threshold
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        if self.server.addr.trim().is_empty() {
            errors.push("server.addr must not be empty".to_string());
        }
        if self.server.max_body_bytes == 0 {
            errors.push("server.max_body_bytes must be > 0".to_string());
        }

        let m = &self.model;
        if !(0.0..0.9).contains(&m.test_fraction) {
            errors.push(format!(
                "model.test_fraction ({}) must be in [0, 0.9)",
                m.test_fraction
            ));
        }
        Self::check_forest(&m.yield_forest, "model.yield_forest", &mut errors);
        Self::check_forest(&m.cycle_forest, "model.cycle_forest", &mut errors);

        if self.phenology.default_season_length_days <= 0 {
            errors.push("phenology.default_season_length_days must be > 0".to_string());
        }
        for (crop, stages) in &self.phenology.crops {
            Self::check_stage_table(crop, stages, &mut errors);
        }

        let imp = &self.importance;
        if !(imp.ceiling_percent > 0.0 && imp.ceiling_percent <= 100.0) {
            errors.push(format!(
                "importance.ceiling_percent ({}) must be in (0, 100]",
                imp.ceiling_percent
            ));
        }
        if imp.top_n == 0 {
            errors.push("importance.top_n must be > 0".to_string());
        }
        if imp.groups.is_empty() {
            errors.push("importance.groups must declare at least one group".to_string());
        }
        for g in &imp.groups {
            if g.prefixes.is_empty() && g.substrings.is_empty() {
                errors.push(format!(
                    "importance group '{}' has no prefix or substring rule",
                    g.name
                ));
            }
        }

        let irr = &self.irrigation;
        if irr.window_count == 0 {
            errors.push("irrigation.window_count must be > 0".to_string());
        }
        if irr.window_days <= 0 {
            errors.push("irrigation.window_days must be > 0".to_string());
        }
        for (name, value) in [
            ("irrigation.hot_multiplier", irr.hot_multiplier),
            ("irrigation.cool_multiplier", irr.cool_multiplier),
            ("irrigation.rain_window_factor", irr.rain_window_factor),
            ("irrigation.baseline_mm_per_window", irr.baseline_mm_per_window),
            ("irrigation.default_crop_need_mm", irr.default_crop_need_mm),
        ] {
            if !value.is_finite() || value <= 0.0 {
                errors.push(format!("{name} ({value}) must be finite and > 0"));
            }
        }
        if irr.cool_threshold_c >= irr.hot_threshold_c {
            errors.push(format!(
                "irrigation.cool_threshold_c ({}) must be < hot_threshold_c ({})",
                irr.cool_threshold_c, irr.hot_threshold_c
            ));
        }
        if !(0.0..=1.0).contains(&irr.rain_offset_fraction) {
            errors.push(format!(
                "irrigation.rain_offset_fraction ({}) must be in [0, 1]",
                irr.rain_offset_fraction
            ));
        }
        if irr.skip_threshold_mm < 0.0 {
            errors.push("irrigation.skip_threshold_mm must be >= 0".to_string());
        }
        for need in &irr.crop_needs {
            if need.patterns.is_empty() || need.base_mm < 0.0 {
                errors.push(format!(
                    "irrigation.crop_needs entry {:?} needs a pattern and base_mm >= 0",
                    need.patterns
                ));
            }
        }

        // Reject NaN/Inf anywhere (sweep all f64 fields via serialization)
        if let Ok(value) = toml::Value::try_from(self) {
            let mut bad = Vec::new();
            collect_non_finite(&value, "", &mut bad);
            for key in bad {
                errors.push(format!("{key} must be a finite number"));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    fn check_forest(params: &ForestParams, name: &str, errors: &mut Vec<String>) {
        if params.n_trees == 0 {
            errors.push(format!("{name}.n_trees must be > 0"));
        }
        if params.max_depth == 0 {
            errors.push(format!("{name}.max_depth must be > 0"));
        }
        if params.min_samples_split < 2 {
            errors.push(format!("{name}.min_samples_split must be >= 2"));
        }
        if params.min_samples_leaf == 0 {
            errors.push(format!("{name}.min_samples_leaf must be > 0"));
        }
    }

    fn check_stage_table(crop: &str, stages: &[StageDefinition], errors: &mut Vec<String>) {
        let Some(last) = stages.last() else {
            errors.push(format!("phenology.crops.{crop}: stage table is empty"));
            return;
        };
        for pair in stages.windows(2) {
            if pair[1].code <= pair[0].code {
                errors.push(format!(
                    "phenology.crops.{crop}: stage codes must increase ({} after {})",
                    pair[1].code, pair[0].code
                ));
            }
            if pair[1].proportion <= pair[0].proportion {
                errors.push(format!(
                    "phenology.crops.{crop}: proportions must increase ({} after {})",
                    pair[1].proportion, pair[0].proportion
                ));
            }
        }
        for s in stages {
            if !(s.proportion > 0.0 && s.proportion <= 1.0) {
                errors.push(format!(
                    "phenology.crops.{crop}: stage '{}' proportion {} outside (0, 1]",
                    s.name, s.proportion
                ));
            }
        }
        if (last.proportion - 1.0).abs() > 1e-9 {
            errors.push(format!(
                "phenology.crops.{crop}: last stage '{}' must have proportion 1.0",
                last.name
            ));
        }
    }
}

fn collect_non_finite(value: &toml::Value, path: &str, out: &mut Vec<String>) {
    match value {
        toml::Value::Float(f) if !f.is_finite() => out.push(path.to_string()),
        toml::Value::Table(table) => {
            for (k, v) in table {
                let child = if path.is_empty() {
                    k.clone()
                } else {
                    format!("{path}.{k}")
                };
                collect_non_finite(v, &child, out);
            }
        }
        toml::Value::Array(items) => {
            for (i, v) in items.iter().enumerate() {
                collect_non_finite(v, &format!("{path}[{i}]"), out);
            }
        }
        _ => {}
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(PathBuf, std::io::Error),
    Parse(PathBuf, toml::de::Error),
    Serialize(toml::ser::Error),
    Validation(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(path, e) => write!(f, "Config I/O error ({}): {}", path.display(), e),
            ConfigError::Parse(path, e) => {
                write!(f, "Config parse error ({}): {}", path.display(), e)
            }
            ConfigError::Serialize(e) => write!(f, "Config serialization error: {}", e),
            ConfigError::Validation(errors) => {
                writeln!(f, "Config validation failed:")?;
                for e in errors {
                    writeln!(f, "  - {}", e)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Server
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server bind address.
    ///
    /// Can be overridden by `AGRI_SERVER_ADDR` env var or `--addr` CLI flag.
    #[serde(default = "default_server_addr")]
    pub addr: String,

    /// Request bodies above this size are rejected.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_server_addr() -> String {
    defaults::SERVER_ADDR.to_string()
}

fn default_max_body_bytes() -> usize {
    defaults::MAX_REQUEST_BODY_BYTES
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: default_server_addr(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

// ============================================================================
// Model
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Where the trained artifact is read from and written to.
    pub artifact_path: PathBuf,
    /// CSV used for startup training and `/train` without a path.
    pub dataset_path: PathBuf,
    /// Train from `dataset_path` at startup when no artifact exists.
    pub train_on_missing: bool,
    pub seed: u64,
    /// Held-out fraction for reported metrics.
    pub test_fraction: f64,
    pub yield_forest: ForestParams,
    /// Parameters shared by every phenology sub-model.
    pub cycle_forest: ForestParams,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            artifact_path: PathBuf::from(defaults::MODEL_ARTIFACT_PATH),
            dataset_path: PathBuf::from(defaults::DATASET_PATH),
            train_on_missing: true,
            seed: defaults::TRAINING_SEED,
            test_fraction: defaults::TEST_FRACTION,
            yield_forest: ForestParams::yield_default(),
            cycle_forest: ForestParams::cycle_default(),
        }
    }
}

// ============================================================================
// Phenology
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PhenologyConfig {
    pub default_season_length_days: i64,
    /// Stage table per crop name; lookup ignores case.
    pub crops: BTreeMap<String, Vec<StageDefinition>>,
}

impl Default for PhenologyConfig {
    fn default() -> Self {
        Self {
            default_season_length_days: defaults::DEFAULT_SEASON_LENGTH_DAYS,
            crops: defaults::stage_tables(),
        }
    }
}

// ============================================================================
// Importance
// ============================================================================

/// Named family of features, matched case-insensitively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportanceGroup {
    pub name: String,
    #[serde(default)]
    pub prefixes: Vec<String>,
    #[serde(default)]
    pub substrings: Vec<String>,
}

impl ImportanceGroup {
    pub fn matches(&self, feature: &str) -> bool {
        self.matches_prefix(feature) || self.matches_substring(feature)
    }

    pub fn matches_prefix(&self, feature: &str) -> bool {
        let lower = feature.to_lowercase();
        self.prefixes.iter().any(|p| lower.starts_with(&p.to_lowercase()))
    }

    pub fn matches_substring(&self, feature: &str) -> bool {
        let lower = feature.to_lowercase();
        self.substrings.iter().any(|s| lower.contains(&s.to_lowercase()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportanceConfig {
    pub ceiling_percent: f64,
    pub top_n: usize,
    /// Declaration order breaks ties in the final ranking.
    pub groups: Vec<ImportanceGroup>,
}

impl Default for ImportanceConfig {
    fn default() -> Self {
        Self {
            ceiling_percent: defaults::IMPORTANCE_CEILING_PERCENT,
            top_n: defaults::IMPORTANCE_TOP_N,
            groups: defaults::importance_groups(),
        }
    }
}

// ============================================================================
// Irrigation
// ============================================================================

/// Base water need for crops whose name contains any of `patterns`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CropWaterNeed {
    pub patterns: Vec<String>,
    /// mm per window
    pub base_mm: f64,
}

/// Reason text for an irrigated window at a given zero-based index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowReason {
    pub window: usize,
    pub reason: String,
}

/// Irrigation guidance for one BBCH stage code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageWaterNeed {
    pub code: u8,
    pub frequency: String,
    pub amount: String,
    pub priority: String,
}

/// Additive soil-factor adjustments.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SoilAdjustments {
    pub clay: f64,
    pub sandy: f64,
    pub poor_drainage: f64,
    pub good_drainage: f64,
}

impl Default for SoilAdjustments {
    fn default() -> Self {
        Self {
            clay: -0.1,
            sandy: 0.15,
            poor_drainage: -0.1,
            good_drainage: 0.05,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IrrigationConfig {
    pub window_count: usize,
    pub window_days: i64,
    pub default_crop_need_mm: f64,
    pub baseline_mm_per_window: f64,
    pub skip_threshold_mm: f64,
    pub rain_offset_fraction: f64,
    pub rain_window_factor: f64,
    pub hot_threshold_c: f64,
    pub hot_multiplier: f64,
    pub cool_threshold_c: f64,
    pub cool_multiplier: f64,
    pub skip_reason: String,
    pub default_reason: String,
    pub soil: SoilAdjustments,
    /// First matching entry wins.
    pub crop_needs: Vec<CropWaterNeed>,
    pub window_reasons: Vec<WindowReason>,
    pub stage_needs: Vec<StageWaterNeed>,
}

impl Default for IrrigationConfig {
    fn default() -> Self {
        Self {
            window_count: defaults::IRRIGATION_WINDOW_COUNT,
            window_days: defaults::IRRIGATION_WINDOW_DAYS,
            default_crop_need_mm: defaults::DEFAULT_CROP_NEED_MM,
            baseline_mm_per_window: defaults::BASELINE_MM_PER_WINDOW,
            skip_threshold_mm: defaults::SKIP_THRESHOLD_MM,
            rain_offset_fraction: defaults::RAIN_OFFSET_FRACTION,
            rain_window_factor: defaults::RAIN_WINDOW_FACTOR,
            hot_threshold_c: defaults::HOT_THRESHOLD_C,
            hot_multiplier: defaults::HOT_MULTIPLIER,
            cool_threshold_c: defaults::COOL_THRESHOLD_C,
            cool_multiplier: defaults::COOL_MULTIPLIER,
            skip_reason: defaults::SKIP_REASON.to_string(),
            default_reason: defaults::DEFAULT_IRRIGATE_REASON.to_string(),
            soil: SoilAdjustments::default(),
            crop_needs: defaults::crop_water_needs(),
            window_reasons: defaults::window_reasons(),
            stage_needs: defaults::stage_water_needs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validates() {
        let config = ServiceConfig::default();
        assert!(config.validate().is_ok(), "Default config must always validate");
    }

    #[test]
    fn test_empty_toml_produces_defaults() {
        let config: ServiceConfig = toml::from_str("").expect("empty TOML should parse");
        assert_eq!(config.server.addr, "0.0.0.0:5000");
        assert_eq!(config.model.yield_forest.n_trees, 100);
        assert_eq!(config.model.cycle_forest.max_depth, 12);
        assert_eq!(config.phenology.default_season_length_days, 120);
        assert_eq!(config.importance.ceiling_percent, 50.0);
        assert_eq!(config.irrigation.window_count, 4);
        assert_eq!(config.phenology.crops["Rice"].len(), 8);
        assert_eq!(config.phenology.crops["Sugarcane"].len(), 4);
    }

    #[test]
    fn test_partial_toml_override() {
        let toml_str = r#"
[server]
addr = "127.0.0.1:9000"

[irrigation]
skip_threshold_mm = 30.0

[[irrigation.crop_needs]]
patterns = ["millet"]
base_mm = 60.0
"#;
        let config: ServiceConfig = toml::from_str(toml_str).expect("partial TOML should parse");
        assert_eq!(config.server.addr, "127.0.0.1:9000");
        assert_eq!(config.irrigation.skip_threshold_mm, 30.0);
        assert_eq!(config.irrigation.crop_needs.len(), 1);
        // Non-overridden values retain defaults
        assert_eq!(config.irrigation.hot_threshold_c, 34.0);
        assert_eq!(config.irrigation.window_reasons.len(), 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_catches_non_monotone_stages() {
        let mut config = ServiceConfig::default();
        config.phenology.crops.insert(
            "Millet".to_string(),
            vec![
                StageDefinition::new(0, "Germination", 0.3),
                StageDefinition::new(1, "Leaf Development", 0.2),
                StageDefinition::new(8, "Maturity", 0.9),
            ],
        );
        let result = config.validate();
        assert!(result.is_err());
        if let Err(ConfigError::Validation(errors)) = result {
            assert!(errors.iter().any(|e| e.contains("proportions must increase")));
            assert!(errors.iter().any(|e| e.contains("must have proportion 1.0")));
        }
    }

    #[test]
    fn test_validation_catches_bad_ceiling_and_forest() {
        let mut config = ServiceConfig::default();
        config.importance.ceiling_percent = 0.0;
        config.model.yield_forest.n_trees = 0;
        let result = config.validate();
        if let Err(ConfigError::Validation(errors)) = result {
            assert_eq!(errors.len(), 2, "got: {errors:?}");
        } else {
            panic!("expected validation failure");
        }
    }

    #[test]
    fn test_validation_catches_inverted_temperature_thresholds() {
        let mut config = ServiceConfig::default();
        config.irrigation.cool_threshold_c = 40.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_catches_nan_multiplier() {
        let mut config = ServiceConfig::default();
        config.irrigation.hot_multiplier = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_group_matching_ignores_case() {
        let groups = defaults::importance_groups();
        let temp = groups.iter().find(|g| g.name == "Temp").unwrap();
        let crop = groups.iter().find(|g| g.name == "Crop").unwrap();
        assert!(temp.matches("Avg_Temp"));
        assert!(temp.matches("TMAX"));
        assert!(crop.matches("Crop_Rice"));
        assert!(!crop.matches("Soil_Crop_History"));
    }

    #[test]
    fn test_roundtrip_toml() {
        let original = ServiceConfig::default();
        let toml_str = original.to_toml().expect("serialization should work");
        let roundtripped: ServiceConfig =
            toml::from_str(&toml_str).expect("deserialization should work");
        assert_eq!(original.phenology.crops, roundtripped.phenology.crops);
        assert_eq!(original.irrigation.crop_needs, roundtripped.irrigation.crop_needs);
        assert_eq!(original.importance.groups, roundtripped.importance.groups);
        assert_eq!(original.model.artifact_path, roundtripped.model.artifact_path);
    }

    #[test]
    fn test_load_from_file_rejects_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agri_config.toml");
        std::fs::write(&path, "[importance]\ntop_n = 0\n").unwrap();
        assert!(matches!(
            ServiceConfig::load_from_file(&path),
            Err(ConfigError::Validation(_))
        ));
    }
}
