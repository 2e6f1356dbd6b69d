//! Training dataset loader
//!
//! Reads the crop history CSV: one row per observed season with the sowing-time
//! inputs, the realised yield and optional phenology targets. Rows with a
//! missing or non-numeric required value are skipped and counted.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use thiserror::Error;

pub const CROP_TYPE_COLUMN: &str = "Crop_Type";
pub const YIELD_COLUMN: &str = "Actual_Yield";

/// Columns every dataset must carry.
pub const REQUIRED_COLUMNS: [&str; 5] = [CROP_TYPE_COLUMN, "Avg_Temp", "Tmax", "Tmin", YIELD_COLUMN];

/// Season length target; drives the stage timeline.
pub const SEASON_LENGTH_TARGET: &str = "Total_Season_Length_Predicted";

/// Days from sowing to maturity.
pub const MATURITY_TARGET: &str = "Days_To_Maturity";

/// Phenology targets trained when present in the header.
pub const PHENOLOGY_TARGETS: [&str; 5] = [
    MATURITY_TARGET,
    SEASON_LENGTH_TARGET,
    "Germination_Days_From_Sowing",
    "Reproductive_Days_From_Sowing",
    "Grain_Filling_Days_From_Sowing",
];

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("failed to read dataset {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("dataset {0} is empty")]
    Empty(String),
    #[error("dataset {source_name} is missing required columns: {}", .columns.join(", "))]
    MissingColumns {
        source_name: String,
        columns: Vec<String>,
    },
    #[error("no valid rows in dataset {source_name} ({skipped} skipped)")]
    NoValidRows { source_name: String, skipped: usize },
}

/// One observed season.
#[derive(Debug, Clone, PartialEq)]
pub struct CropRecord {
    pub crop_type: String,
    pub avg_temp: f64,
    pub tmax: f64,
    pub tmin: f64,
    pub actual_yield: f64,
    /// Phenology targets present (and numeric) on this row.
    pub targets: BTreeMap<String, f64>,
}

impl CropRecord {
    pub fn new(crop_type: impl Into<String>, avg_temp: f64, tmax: f64, tmin: f64, actual_yield: f64) -> Self {
        Self {
            crop_type: crop_type.into(),
            avg_temp,
            tmax,
            tmin,
            actual_yield,
            targets: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_target(mut self, name: impl Into<String>, value: f64) -> Self {
        self.targets.insert(name.into(), value);
        self
    }
}

/// Parsed training dataset.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    records: Vec<CropRecord>,
    skipped_rows: usize,
}

impl Dataset {
    pub fn from_records(records: Vec<CropRecord>) -> Self {
        Self {
            records,
            skipped_rows: 0,
        }
    }

    /// Load a dataset CSV from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DatasetError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| DatasetError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(BufReader::new(file), &path.display().to_string())
    }

    /// Parse CSV text from any buffered reader. `source_name` labels errors and logs.
    pub fn from_reader<R: BufRead>(reader: R, source_name: &str) -> Result<Self, DatasetError> {
        let mut lines = reader.lines();

        let header = match lines.next() {
            Some(Ok(h)) => h,
            Some(Err(source)) => {
                return Err(DatasetError::Io {
                    path: PathBuf::from(source_name),
                    source,
                })
            }
            None => return Err(DatasetError::Empty(source_name.to_string())),
        };

        let columns = ColumnMap::from_header(&header);
        let missing: Vec<String> = REQUIRED_COLUMNS
            .iter()
            .filter(|c| !columns.index.contains_key(**c))
            .map(|c| (*c).to_string())
            .collect();
        if !missing.is_empty() {
            return Err(DatasetError::MissingColumns {
                source_name: source_name.to_string(),
                columns: missing,
            });
        }

        let mut records = Vec::new();
        let mut skipped = 0usize;
        let mut line_num = 1usize;

        for line in lines {
            line_num += 1;
            let line = match line {
                Ok(l) => l,
                Err(e) => {
                    tracing::warn!(line = line_num, error = %e, "Error reading line");
                    skipped += 1;
                    continue;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            let fields = csv_split(&line);
            match columns.parse_row(&fields) {
                Some(record) => records.push(record),
                None => skipped += 1,
            }
        }

        if records.is_empty() {
            return Err(DatasetError::NoValidRows {
                source_name: source_name.to_string(),
                skipped,
            });
        }

        tracing::info!(
            source = %source_name,
            rows = records.len(),
            skipped,
            targets = ?columns.targets.iter().map(|(n, _)| n.as_str()).collect::<Vec<_>>(),
            "Dataset loaded"
        );

        Ok(Self {
            records,
            skipped_rows: skipped,
        })
    }

    pub fn records(&self) -> &[CropRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn skipped_rows(&self) -> usize {
        self.skipped_rows
    }

    /// Distinct crop names, sorted.
    pub fn crops(&self) -> Vec<String> {
        self.records
            .iter()
            .map(|r| r.crop_type.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Phenology targets with at least one value, in [`PHENOLOGY_TARGETS`] order.
    pub fn available_targets(&self) -> Vec<&'static str> {
        PHENOLOGY_TARGETS
            .iter()
            .copied()
            .filter(|t| self.records.iter().any(|r| r.targets.contains_key(*t)))
            .collect()
    }
}

struct ColumnMap {
    index: HashMap<String, usize>,
    targets: Vec<(String, usize)>,
}

impl ColumnMap {
    fn from_header(header: &str) -> Self {
        let index: HashMap<String, usize> = csv_split(header.trim_start_matches('\u{feff}'))
            .into_iter()
            .enumerate()
            .map(|(i, name)| (name.trim().to_string(), i))
            .collect();
        let targets = PHENOLOGY_TARGETS
            .iter()
            .filter_map(|t| index.get(*t).map(|&i| ((*t).to_string(), i)))
            .collect();
        Self { index, targets }
    }

    fn col(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    fn parse_row(&self, fields: &[String]) -> Option<CropRecord> {
        let crop_type = self
            .col(CROP_TYPE_COLUMN)
            .and_then(|i| fields.get(i))
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())?;

        let mut record = CropRecord::new(
            crop_type,
            get_f64(fields, self.col("Avg_Temp"))?,
            get_f64(fields, self.col("Tmax"))?,
            get_f64(fields, self.col("Tmin"))?,
            get_f64(fields, self.col(YIELD_COLUMN))?,
        );
        for (name, i) in &self.targets {
            if let Some(v) = get_f64(fields, Some(*i)) {
                record.targets.insert(name.clone(), v);
            }
        }
        Some(record)
    }
}

/// Split one CSV line, honouring double quotes and `""` escapes.
fn csv_split(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    fields.push(current);
    fields
}

/// Numeric field by column index; blanks, `nan`, `null` and non-finite values read as `None`.
fn get_f64(fields: &[String], idx: Option<usize>) -> Option<f64> {
    let s = fields.get(idx?)?.trim();
    if s.is_empty() || s.eq_ignore_ascii_case("nan") || s.eq_ignore_ascii_case("null") {
        return None;
    }
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
Crop_Type,Avg_Temp,Tmax,Tmin,Actual_Yield,Days_To_Maturity,Total_Season_Length_Predicted
Rice,28.5,35.2,22.1,4.2,118,120
\"Wheat\",18.0,24.0,9.5,3.1,,140
Maize,nan,30.0,20.0,5.0,100,105

Cotton,27.0,33.0,21.0,not-a-number,150,160
";

    #[test]
    fn test_csv_split_quotes() {
        assert_eq!(csv_split(r#"a,"b,c","d""e""#), vec!["a", "b,c", "d\"e"]);
        assert_eq!(csv_split("x,,y"), vec!["x", "", "y"]);
    }

    #[test]
    fn test_parses_rows_and_counts_skips() {
        let ds = Dataset::from_reader(SAMPLE.as_bytes(), "sample").unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.skipped_rows(), 2);
        assert_eq!(ds.crops(), vec!["Rice", "Wheat"]);

        let wheat = &ds.records()[1];
        assert_eq!(wheat.crop_type, "Wheat");
        assert!(!wheat.targets.contains_key(MATURITY_TARGET));
        assert_eq!(wheat.targets[SEASON_LENGTH_TARGET], 140.0);
        assert_eq!(ds.available_targets(), vec![MATURITY_TARGET, SEASON_LENGTH_TARGET]);
    }

    #[test]
    fn test_missing_columns_reported() {
        let err = Dataset::from_reader("Crop_Type,Avg_Temp\nRice,20\n".as_bytes(), "bad").unwrap_err();
        match err {
            DatasetError::MissingColumns { columns, .. } => {
                assert_eq!(columns, vec!["Tmax", "Tmin", "Actual_Yield"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_no_valid_rows_is_error() {
        let csv = "Crop_Type,Avg_Temp,Tmax,Tmin,Actual_Yield\nRice,,,,\n";
        assert!(matches!(
            Dataset::from_reader(csv.as_bytes(), "blank"),
            Err(DatasetError::NoValidRows { skipped: 1, .. })
        ));
        assert!(matches!(
            Dataset::from_reader("".as_bytes(), "empty"),
            Err(DatasetError::Empty(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            Dataset::load("/nonexistent/agri.csv"),
            Err(DatasetError::Io { .. })
        ));
    }
}
