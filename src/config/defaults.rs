//! System-wide default constants and built-in tables.
//!
//! Every table here is only a starting value: the engine components receive
//! their tables through configuration, so a deployment can override any of
//! them in `agri_config.toml` without touching scheduling logic.

use std::collections::BTreeMap;

use crate::types::StageDefinition;

use super::{CropWaterNeed, ImportanceGroup, StageWaterNeed, WindowReason};

// ============================================================================
// Server
// ============================================================================

/// Default HTTP bind address.
pub const SERVER_ADDR: &str = "0.0.0.0:5000";

/// Maximum accepted request body (bytes).
pub const MAX_REQUEST_BODY_BYTES: usize = 1024 * 1024;

// ============================================================================
// Model
// ============================================================================

/// Default model artifact location.
pub const MODEL_ARTIFACT_PATH: &str = "agri_forecasting_model.json";

/// Default training dataset location.
pub const DATASET_PATH: &str = "large_agri_dataset.csv";

/// Artifact format version written into model metadata.
pub const MODEL_VERSION: &str = "2.0";

/// Seed for bootstrap sampling and the train/test split.
pub const TRAINING_SEED: u64 = 42;

/// Held-out fraction used for reported metrics.
pub const TEST_FRACTION: f64 = 0.2;

// ============================================================================
// Phenology
// ============================================================================

/// Season length used when no season-length sub-model was trained (days).
pub const DEFAULT_SEASON_LENGTH_DAYS: i64 = 120;

/// Season fraction at which each BBCH principal stage begins.
const STAGE_PROPORTIONS: [(u8, f64); 8] = [
    (0, 0.06),
    (1, 0.20),
    (2, 0.35),
    (3, 0.50),
    (5, 0.65),
    (6, 0.72),
    (7, 0.85),
    (8, 1.00),
];

fn stage_table(stages: &[(u8, &str)]) -> Vec<StageDefinition> {
    stages
        .iter()
        .filter_map(|&(code, name)| {
            STAGE_PROPORTIONS
                .iter()
                .find(|(c, _)| *c == code)
                .map(|&(_, p)| StageDefinition::new(code, name, p))
        })
        .collect()
}

/// Built-in per-crop stage tables.
pub fn stage_tables() -> BTreeMap<String, Vec<StageDefinition>> {
    let cereal = [
        (0, "Germination"),
        (1, "Leaf Development"),
        (2, "Tillering"),
        (3, "Stem Elongation"),
        (5, "Heading"),
        (6, "Flowering"),
        (7, "Grain Filling"),
        (8, "Maturity"),
    ];

    let mut tables = BTreeMap::new();
    tables.insert("Rice".to_string(), stage_table(&cereal));
    tables.insert("Wheat".to_string(), stage_table(&cereal));
    tables.insert(
        "Maize".to_string(),
        stage_table(&[
            (0, "Germination"),
            (1, "Leaf Development"),
            (3, "Stem Elongation"),
            (5, "Tasseling"),
            (6, "Silking"),
            (7, "Grain Filling"),
            (8, "Maturity"),
        ]),
    );
    tables.insert(
        "Cotton".to_string(),
        stage_table(&[
            (0, "Germination"),
            (1, "Leaf Development"),
            (3, "Stem Elongation"),
            (5, "Squaring"),
            (6, "Flowering"),
            (7, "Boll Development"),
            (8, "Boll Opening"),
        ]),
    );
    tables.insert(
        "Soybean".to_string(),
        stage_table(&[
            (0, "Germination"),
            (1, "Leaf Development"),
            (3, "Stem Elongation"),
            (6, "Flowering"),
            (7, "Pod Development"),
            (8, "Maturity"),
        ]),
    );
    tables.insert(
        "Sugarcane".to_string(),
        stage_table(&[
            (0, "Germination"),
            (1, "Tillering"),
            (3, "Grand Growth"),
            (8, "Maturity"),
        ]),
    );
    tables
}

// ============================================================================
// Feature Importance
// ============================================================================

/// Maximum share any single group may show before redistribution (%).
pub const IMPORTANCE_CEILING_PERCENT: f64 = 50.0;

/// Number of groups surfaced to users.
pub const IMPORTANCE_TOP_N: usize = 4;

/// Built-in importance groups, in declaration (tie-break) order.
pub fn importance_groups() -> Vec<ImportanceGroup> {
    let group = |name: &str, prefixes: &[&str], substrings: &[&str]| ImportanceGroup {
        name: name.to_string(),
        prefixes: prefixes.iter().map(|s| (*s).to_string()).collect(),
        substrings: substrings.iter().map(|s| (*s).to_string()).collect(),
    };
    vec![
        group("Rain", &[], &["rain"]),
        group("Temp", &[], &["temp", "tmax", "tmin"]),
        group("Soil", &[], &["soil"]),
        group("NDVI", &[], &["ndvi"]),
        group("Hist", &[], &["yield_last"]),
        group("Crop", &["crop_"], &[]),
    ]
}

// ============================================================================
// Irrigation
// ============================================================================

/// Number of consecutive scheduling windows.
pub const IRRIGATION_WINDOW_COUNT: usize = 4;

/// Length of one scheduling window (days).
pub const IRRIGATION_WINDOW_DAYS: i64 = 14;

/// Crop need for crops matching no table entry (mm per window).
pub const DEFAULT_CROP_NEED_MM: f64 = 90.0;

/// Uniform schedule the savings estimate is measured against (mm per window).
pub const BASELINE_MM_PER_WINDOW: f64 = 120.0;

/// Net requirement below which a window is skipped (mm).
pub const SKIP_THRESHOLD_MM: f64 = 25.0;

/// Fraction of expected rainfall credited against the crop need.
pub const RAIN_OFFSET_FRACTION: f64 = 0.6;

/// Multiplier from mean daily forecast rain to expected window rain.
pub const RAIN_WINDOW_FACTOR: f64 = 2.0;

pub const HOT_THRESHOLD_C: f64 = 34.0;
pub const HOT_MULTIPLIER: f64 = 1.2;
pub const COOL_THRESHOLD_C: f64 = 22.0;
pub const COOL_MULTIPLIER: f64 = 0.9;

pub const SKIP_REASON: &str = "Natural rainfall sufficient";
pub const DEFAULT_IRRIGATE_REASON: &str = "Supplemental irrigation";

/// Built-in crop water needs per 14-day window, first match wins.
pub fn crop_water_needs() -> Vec<CropWaterNeed> {
    let need = |patterns: &[&str], base_mm: f64| CropWaterNeed {
        patterns: patterns.iter().map(|s| (*s).to_string()).collect(),
        base_mm,
    };
    vec![
        need(&["rice"], 120.0),
        need(&["wheat"], 80.0),
        need(&["maize", "corn"], 100.0),
        need(&["sugarcane"], 180.0),
    ]
}

/// Reason text by window index.
///
/// Keyed by position, not by the actual stage overlap; tuned against
/// rice/wheat season lengths.
pub fn window_reasons() -> Vec<WindowReason> {
    vec![
        WindowReason {
            window: 1,
            reason: "Tillering/vegetative support".to_string(),
        },
        WindowReason {
            window: 2,
            reason: "Flowering critical period".to_string(),
        },
    ]
}

/// Built-in irrigation guidance per BBCH stage code.
pub fn stage_water_needs() -> Vec<StageWaterNeed> {
    let need = |code: u8, frequency: &str, amount: &str, priority: &str| StageWaterNeed {
        code,
        frequency: frequency.to_string(),
        amount: amount.to_string(),
        priority: priority.to_string(),
    };
    vec![
        need(0, "daily", "light", "high"),
        need(1, "2-3 days", "moderate", "high"),
        need(2, "3-4 days", "moderate", "medium"),
        need(3, "2-3 days", "heavy", "high"),
        need(5, "2 days", "heavy", "critical"),
        need(6, "daily", "heavy", "critical"),
        need(7, "2-3 days", "heavy", "high"),
        need(8, "reduce", "light", "low"),
    ]
}
