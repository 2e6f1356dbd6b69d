//! Feature schema and encoded feature rows

use serde::{Deserialize, Serialize};

/// Prefix of the one-hot crop indicator columns.
pub const CROP_COLUMN_PREFIX: &str = "Crop_";

/// Continuous sowing-time columns, in schema order.
pub const CONTINUOUS_COLUMNS: [&str; 3] = ["Avg_Temp", "Tmax", "Tmin"];

/// Ordered column names recorded when the predictor was fitted.
///
/// Continuous columns come first, followed by one `Crop_<name>` indicator per
/// crop seen during training, sorted by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureSchema {
    columns: Vec<String>,
}

impl FeatureSchema {
    /// Build a schema from an explicit column list.
    pub fn new(columns: Vec<String>) -> Self {
        Self { columns }
    }

    /// Build the standard schema for the given crop vocabulary.
    ///
    /// Duplicates are collapsed and indicators are sorted, so the result does
    /// not depend on the order crops were encountered in the dataset.
    pub fn for_crops<I, S>(crops: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut vocabulary: Vec<String> = crops
            .into_iter()
            .map(|c| c.as_ref().to_string())
            .collect();
        vocabulary.sort();
        vocabulary.dedup();

        let columns = CONTINUOUS_COLUMNS
            .iter()
            .map(|c| (*c).to_string())
            .chain(vocabulary.iter().map(|c| format!("{CROP_COLUMN_PREFIX}{c}")))
            .collect();

        Self { columns }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Crop names that have an indicator column.
    pub fn crop_vocabulary(&self) -> impl Iterator<Item = &str> {
        self.columns
            .iter()
            .filter_map(|c| c.strip_prefix(CROP_COLUMN_PREFIX))
    }
}

/// One encoded input row, aligned column-for-column with a [`FeatureSchema`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureRow {
    names: Vec<String>,
    values: Vec<f64>,
}

impl FeatureRow {
    /// Pair schema columns with values. Lengths must match.
    pub(crate) fn from_schema(schema: &FeatureSchema, values: Vec<f64>) -> Self {
        debug_assert_eq!(schema.len(), values.len());
        Self {
            names: schema.columns().to_vec(),
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Look up a value by column name.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| self.values[i])
    }
}
