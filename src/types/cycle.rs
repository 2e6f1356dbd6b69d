//! Crop-cycle (phenology) types
//!
//! A [`CropCycle`] is the projected timeline for one sowing: dated growth
//! stages, maturity and the harvest window. It serializes to the
//! `crop_cycle` block of the prediction response and can be read back
//! leniently from the same JSON when a client echoes it to the irrigation
//! endpoint.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate, TimeDelta, Utc};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

/// Date format used on the wire.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Days between maturity and the start of the harvest window.
pub const HARVEST_START_OFFSET_DAYS: i64 = 5;

/// Days between maturity and the end of the harvest window.
pub const HARVEST_END_OFFSET_DAYS: i64 = 15;

/// Largest day offset accepted from an echoed crop cycle.
pub const MAX_CYCLE_DAYS: i64 = 3650;

/// Years accepted in wire dates.
const WIRE_YEARS: std::ops::RangeInclusive<i32> = 1..=9999;

/// Parse a `YYYY-MM-DD` wire date. Years outside 1..=9999 count as unparsable.
pub fn parse_wire_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
        .ok()
        .filter(|d| WIRE_YEARS.contains(&d.year()))
}

/// `date + days`, saturating at the ends of the calendar.
pub fn offset_date(date: NaiveDate, days: i64) -> NaiveDate {
    TimeDelta::try_days(days)
        .and_then(|delta| date.checked_add_signed(delta))
        .unwrap_or(if days < 0 { NaiveDate::MIN } else { NaiveDate::MAX })
}

fn wire_days(raw: f64) -> Option<i64> {
    (raw.is_finite() && raw.abs() <= MAX_CYCLE_DAYS as f64).then(|| raw as i64)
}

/// Parse a `YYYY-MM-DD` date, falling back to today's UTC date.
///
/// Sowing dates only drive display fields, so a bad value never fails a request.
pub fn parse_date_or_today(raw: Option<&str>) -> NaiveDate {
    raw.and_then(parse_wire_date).unwrap_or_else(|| Utc::now().date_naive())
}

/// One named developmental stage of a crop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageDefinition {
    /// BBCH principal stage code
    pub code: u8,
    pub name: String,
    /// Fraction of the season elapsed when the stage begins, in (0, 1]
    pub proportion: f64,
}

impl StageDefinition {
    pub fn new(code: u8, name: impl Into<String>, proportion: f64) -> Self {
        Self {
            code,
            name: name.into(),
            proportion,
        }
    }
}

/// A stage placed on the calendar.
#[derive(Debug, Clone, PartialEq)]
pub struct StageEntry {
    pub stage: StageDefinition,
    pub predicted_date: NaiveDate,
    pub days_from_sowing: i64,
}

impl Serialize for StageEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("StageEntry", 4)?;
        s.serialize_field("name", &self.stage.name)?;
        s.serialize_field("bbch_code", &self.stage.code)?;
        s.serialize_field("days_from_sowing", &self.days_from_sowing)?;
        s.serialize_field(
            "predicted_date",
            &self.predicted_date.format(DATE_FORMAT).to_string(),
        )?;
        s.end()
    }
}

/// Harvest window derived from the maturity date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HarvestWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl HarvestWindow {
    pub fn after_maturity(maturity: NaiveDate) -> Self {
        Self {
            start: offset_date(maturity, HARVEST_START_OFFSET_DAYS),
            end: offset_date(maturity, HARVEST_END_OFFSET_DAYS),
        }
    }
}

/// Projected crop cycle for one sowing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CropCycle {
    pub sowing_date: NaiveDate,
    pub season_length_days: i64,
    pub days_to_maturity: i64,
    #[serde(rename = "predicted_maturity_date")]
    pub maturity_date: NaiveDate,
    pub harvest_window: HarvestWindow,
    /// Stages in code order
    #[serde(rename = "growth_stages", serialize_with = "serialize_stage_map")]
    pub stages: Vec<StageEntry>,
}

fn serialize_stage_map<S: Serializer>(stages: &[StageEntry], serializer: S) -> Result<S::Ok, S::Error> {
    let map: BTreeMap<String, &StageEntry> = stages
        .iter()
        .map(|e| (format!("stage_{}", e.stage.code), e))
        .collect();
    map.serialize(serializer)
}

// ============================================================================
// Lenient read-back
// ============================================================================

#[derive(Debug, Default, Deserialize)]
struct CropCycleWire {
    #[serde(default)]
    sowing_date: Option<String>,
    #[serde(default)]
    season_length_days: Option<f64>,
    #[serde(default)]
    days_to_maturity: Option<f64>,
    #[serde(default)]
    growth_stages: Option<StagesWire>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StagesWire {
    Map(BTreeMap<String, StageWire>),
    List(Vec<StageWire>),
}

#[derive(Debug, Deserialize)]
struct StageWire {
    name: String,
    bbch_code: u8,
    #[serde(default)]
    days_from_sowing: Option<f64>,
    #[serde(default)]
    predicted_date: Option<String>,
}

impl CropCycle {
    /// Read a crop cycle back from client-supplied JSON.
    ///
    /// Accepts either the `crop_cycle` block itself or a whole prediction
    /// response containing one. Missing fields are reconstructed from what is
    /// present; returns `None` if the value is not recognisable at all or
    /// carries a day count outside +/-[`MAX_CYCLE_DAYS`].
    pub fn from_json_lenient(value: &serde_json::Value, fallback_sowing: NaiveDate) -> Option<Self> {
        let inner = value.get("crop_cycle").unwrap_or(value);
        if !inner.is_object() {
            return None;
        }
        let wire: CropCycleWire = serde_json::from_value(inner.clone()).ok()?;

        let sowing_date = wire
            .sowing_date
            .as_deref()
            .and_then(parse_wire_date)
            .unwrap_or(fallback_sowing);

        let mut raw_stages: Vec<StageWire> = match wire.growth_stages {
            Some(StagesWire::Map(map)) => map.into_values().collect(),
            Some(StagesWire::List(list)) => list,
            None => Vec::new(),
        };
        raw_stages.sort_by_key(|s| s.bbch_code);

        let placed: Vec<(StageWire, i64, NaiveDate)> = raw_stages
            .into_iter()
            .map(|s| {
                let parsed_date = s.predicted_date.as_deref().and_then(parse_wire_date);
                let days = match s.days_from_sowing {
                    Some(d) => wire_days(d)?,
                    None => parsed_date.map_or(0, |d| (d - sowing_date).num_days()),
                };
                let date = parsed_date.unwrap_or_else(|| offset_date(sowing_date, days));
                Some((s, days, date))
            })
            .collect::<Option<_>>()?;

        let season_length_days = match wire.season_length_days {
            Some(d) => wire_days(d)?,
            None => placed.iter().map(|(_, d, _)| *d).max().unwrap_or(0),
        };
        let days_to_maturity = match wire.days_to_maturity {
            Some(d) => wire_days(d)?,
            None => season_length_days,
        };
        let maturity_date = offset_date(sowing_date, days_to_maturity);

        let stages = placed
            .into_iter()
            .map(|(s, days, date)| {
                let proportion = if season_length_days > 0 {
                    (days as f64 / season_length_days as f64).clamp(0.0, 1.0)
                } else {
                    0.0
                };
                StageEntry {
                    stage: StageDefinition::new(s.bbch_code, s.name, proportion),
                    predicted_date: date,
                    days_from_sowing: days,
                }
            })
            .collect();

        Some(Self {
            sowing_date,
            season_length_days,
            days_to_maturity,
            maturity_date,
            harvest_window: HarvestWindow::after_maturity(maturity_date),
            stages,
        })
    }
}
