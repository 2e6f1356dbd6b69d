//! Config validation: unknown-key detection with Levenshtein suggestions.
//!
//! Two-pass parse approach: first deserialize raw TOML into `toml::Value`,
//! walk the key tree, compare against known field names, and emit warnings
//! with "did you mean?" suggestions. Then proceed with normal serde
//! deserialization. Warnings never break existing configs.

use std::collections::HashSet;

/// A non-fatal config warning (typo, unknown section).
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, " (did you mean '{s}'?)")?;
        }
        Ok(())
    }
}

// ============================================================================
// Known Config Keys
// ============================================================================

/// Sections whose child keys are user-chosen names (crop names).
const DYNAMIC_SECTIONS: &[&str] = &["phenology.crops."];

/// Returns the complete set of valid dotted key paths for ServiceConfig.
///
/// Maintained by hand to match the struct hierarchy in service_config.rs.
/// Array-of-table entries (`[[irrigation.crop_needs]]`) are not walked.
pub fn known_config_keys() -> HashSet<&'static str> {
    let keys: &[&str] = &[
        // [server]
        "server",
        "server.addr",
        "server.max_body_bytes",
        // [model]
        "model",
        "model.artifact_path",
        "model.dataset_path",
        "model.train_on_missing",
        "model.seed",
        "model.test_fraction",
        "model.yield_forest",
        "model.yield_forest.n_trees",
        "model.yield_forest.max_depth",
        "model.yield_forest.min_samples_split",
        "model.yield_forest.min_samples_leaf",
        "model.cycle_forest",
        "model.cycle_forest.n_trees",
        "model.cycle_forest.max_depth",
        "model.cycle_forest.min_samples_split",
        "model.cycle_forest.min_samples_leaf",
        // [phenology]
        "phenology",
        "phenology.default_season_length_days",
        "phenology.crops",
        // [importance]
        "importance",
        "importance.ceiling_percent",
        "importance.top_n",
        "importance.groups",
        // [irrigation]
        "irrigation",
        "irrigation.window_count",
        "irrigation.window_days",
        "irrigation.default_crop_need_mm",
        "irrigation.baseline_mm_per_window",
        "irrigation.skip_threshold_mm",
        "irrigation.rain_offset_fraction",
        "irrigation.rain_window_factor",
        "irrigation.hot_threshold_c",
        "irrigation.hot_multiplier",
        "irrigation.cool_threshold_c",
        "irrigation.cool_multiplier",
        "irrigation.skip_reason",
        "irrigation.default_reason",
        "irrigation.soil",
        "irrigation.soil.clay",
        "irrigation.soil.sandy",
        "irrigation.soil.poor_drainage",
        "irrigation.soil.good_drainage",
        "irrigation.crop_needs",
        "irrigation.window_reasons",
        "irrigation.stage_needs",
    ];
    keys.iter().copied().collect()
}

fn is_dynamic_key(key: &str) -> bool {
    DYNAMIC_SECTIONS.iter().any(|prefix| key.starts_with(prefix))
}

// ============================================================================
// TOML Key Walking
// ============================================================================

/// Recursively walks a `toml::Value` tree and collects all dotted key paths.
///
/// For example, a table `{ a = { b = 1, c = 2 } }` yields:
/// `["a", "a.b", "a.c"]`
pub fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    if let Some(table) = value.as_table() {
        for (k, v) in table {
            let path = if prefix.is_empty() {
                k.clone()
            } else {
                format!("{prefix}.{k}")
            };
            keys.push(path.clone());
            if v.is_table() {
                keys.extend(walk_toml_keys(v, &path));
            }
        }
    }
    keys
}

// ============================================================================
// Levenshtein Distance
// ============================================================================

fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Suggest the closest known key for an unknown key, if within edit distance 3.
pub fn suggest_correction(unknown: &str, known: &HashSet<&str>) -> Option<String> {
    known
        .iter()
        .map(|&k| (k, levenshtein(unknown, k)))
        .filter(|(_, dist)| *dist <= 3)
        .min_by(|(ka, da), (kb, db)| da.cmp(db).then_with(|| ka.cmp(kb)))
        .map(|(k, _)| k.to_string())
}

// ============================================================================
// Unknown Key Validation (entry point)
// ============================================================================

/// Parse a raw TOML string and return warnings for any unknown config keys.
///
/// This does NOT fail on unknown keys, it only warns.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let value: toml::Value = match raw_toml.parse() {
        Ok(v) => v,
        Err(_) => return Vec::new(), // parse errors are handled by serde later
    };

    let known = known_config_keys();
    walk_toml_keys(&value, "")
        .into_iter()
        .filter(|key| !known.contains(key.as_str()) && !is_dynamic_key(key))
        .map(|key| ValidationWarning {
            suggestion: suggest_correction(&key, &known),
            message: format!("Unknown config key '{key}'"),
            field: key,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levenshtein_one_edit() {
        assert_eq!(levenshtein("skip_treshold_mm", "skip_threshold_mm"), 1);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("abc", ""), 3);
    }

    #[test]
    fn test_walk_toml_keys_nested() {
        let toml: toml::Value = r#"
            [irrigation]
            [irrigation.soil]
            clay = -0.2
        "#
        .parse()
        .unwrap();
        let keys = walk_toml_keys(&toml, "");
        assert!(keys.contains(&"irrigation".to_string()));
        assert!(keys.contains(&"irrigation.soil".to_string()));
        assert!(keys.contains(&"irrigation.soil.clay".to_string()));
    }

    #[test]
    fn test_typo_key_produces_warning_with_suggestion() {
        let toml_str = r#"
[irrigation]
skip_treshold_mm = 30.0
"#;
        let warnings = validate_unknown_keys(toml_str);
        assert_eq!(warnings.len(), 1);
        assert_eq!(
            warnings[0].suggestion.as_deref(),
            Some("irrigation.skip_threshold_mm")
        );
    }

    #[test]
    fn test_crop_tables_are_not_flagged() {
        let toml_str = r#"
[[phenology.crops.Millet]]
code = 0
name = "Germination"
proportion = 0.1

[[phenology.crops.Millet]]
code = 8
name = "Maturity"
proportion = 1.0

[[irrigation.crop_needs]]
patterns = ["millet"]
base_mm = 60.0
"#;
        let warnings = validate_unknown_keys(toml_str);
        assert!(warnings.is_empty(), "Expected 0 warnings, got: {warnings:?}");
    }

    #[test]
    fn test_unknown_section_produces_warning() {
        let warnings = validate_unknown_keys("[weather]\nprovider = \"x\"\n");
        assert!(warnings.iter().any(|w| w.field == "weather"));
    }

    #[test]
    fn test_suggest_correction_no_match_for_garbage() {
        let known = known_config_keys();
        assert!(suggest_correction("completely_unrelated_garbage_key_xyz", &known).is_none());
    }
}
