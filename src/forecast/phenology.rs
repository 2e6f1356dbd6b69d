//! Phenology timeline projection
//!
//! Places each stage of a crop's stage table on the calendar by scaling its
//! season proportion with the predicted season length. Maturity is dated from
//! the separately predicted days-to-maturity, so the maturity stage and the
//! maturity date can differ by a few days.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::types::{offset_date, CropCycle, HarvestWindow, StageDefinition, StageEntry};

/// Absorbs binary rounding in `season * proportion` (0.35 * 120 must be 42, not 41).
const DAY_EPSILON: f64 = 1e-9;

/// Projects stage tables onto calendar dates.
#[derive(Debug, Clone)]
pub struct TimelineBuilder {
    /// Keyed by lowercase crop name.
    tables: BTreeMap<String, Vec<StageDefinition>>,
}

impl TimelineBuilder {
    pub fn new(tables: &BTreeMap<String, Vec<StageDefinition>>) -> Self {
        let tables = tables
            .iter()
            .map(|(crop, stages)| {
                let mut stages = stages.clone();
                stages.sort_by_key(|s| s.code);
                (crop.trim().to_lowercase(), stages)
            })
            .collect();
        Self { tables }
    }

    /// Stage table for `crop_type`, matched ignoring case.
    pub fn stages_for(&self, crop_type: &str) -> Option<&[StageDefinition]> {
        self.tables
            .get(&crop_type.trim().to_lowercase())
            .map(Vec::as_slice)
    }

    /// Build the crop cycle. An unknown crop yields no stages; every other
    /// field is still populated.
    pub fn build(
        &self,
        crop_type: &str,
        sowing_date: NaiveDate,
        season_length_days: i64,
        days_to_maturity: i64,
    ) -> CropCycle {
        let stages = self
            .stages_for(crop_type)
            .unwrap_or_default()
            .iter()
            .map(|stage| {
                let days = (season_length_days as f64 * stage.proportion + DAY_EPSILON).floor() as i64;
                StageEntry {
                    stage: stage.clone(),
                    predicted_date: offset_date(sowing_date, days),
                    days_from_sowing: days,
                }
            })
            .collect();

        let maturity_date = offset_date(sowing_date, days_to_maturity);
        CropCycle {
            sowing_date,
            season_length_days,
            days_to_maturity,
            maturity_date,
            harvest_window: HarvestWindow::after_maturity(maturity_date),
            stages,
        }
    }
}
