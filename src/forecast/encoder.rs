//! Feature encoding for sowing-time inputs

use std::collections::HashMap;

use crate::types::{FeatureRow, FeatureSchema, CROP_COLUMN_PREFIX};

/// Encodes raw inputs against the schema recorded at training time.
#[derive(Debug, Clone)]
pub struct FeatureEncoder {
    schema: FeatureSchema,
}

impl FeatureEncoder {
    pub fn new(schema: FeatureSchema) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    /// Build one row: three continuous values plus a `Crop_<crop_type>`
    /// indicator.
    ///
    /// Values are keyed by column name and projected onto the schema, so a
    /// crop the model never saw simply leaves every indicator at 0.
    pub fn encode(&self, crop_type: &str, avg_temp: f64, tmax: f64, tmin: f64) -> FeatureRow {
        let indicator = format!("{CROP_COLUMN_PREFIX}{crop_type}");
        let named: HashMap<&str, f64> = [
            ("Avg_Temp", avg_temp),
            ("Tmax", tmax),
            ("Tmin", tmin),
            (indicator.as_str(), 1.0),
        ]
        .into_iter()
        .collect();

        let values = self
            .schema
            .columns()
            .iter()
            .map(|c| named.get(c.as_str()).copied().unwrap_or(0.0))
            .collect();
        FeatureRow::from_schema(&self.schema, values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoder() -> FeatureEncoder {
        FeatureEncoder::new(FeatureSchema::for_crops(["Rice", "Wheat", "Maize"]))
    }

    #[test]
    fn test_known_crop_sets_single_indicator() {
        let row = encoder().encode("Rice", 28.5, 35.2, 22.1);
        assert_eq!(row.values(), &[28.5, 35.2, 22.1, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_unseen_crop_zeroes_all_indicators() {
        let row = encoder().encode("Quinoa", 20.0, 25.0, 15.0);
        assert_eq!(row.len(), 6);
        assert_eq!(row.values()[3..], [0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_indicator_match_is_exact() {
        let row = encoder().encode("rice", 20.0, 25.0, 15.0);
        assert_eq!(row.get("Crop_Rice"), Some(0.0));
    }

    #[test]
    fn test_projects_onto_custom_schema_order() {
        let schema = FeatureSchema::new(vec![
            "Crop_Wheat".to_string(),
            "Tmin".to_string(),
            "Soil_Moisture".to_string(),
            "Avg_Temp".to_string(),
        ]);
        let row = FeatureEncoder::new(schema).encode("Wheat", 18.0, 24.0, 9.5);
        assert_eq!(row.values(), &[1.0, 9.5, 0.0, 18.0]);
    }
}
