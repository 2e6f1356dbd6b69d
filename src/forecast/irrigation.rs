//! Heuristic irrigation scheduling
//!
//! Four consecutive 14-day windows from sowing. Each window's requirement is
//! the crop's base need, scaled by a forecast temperature multiplier and a
//! soil factor, minus a share of the rain the short forecast implies. The
//! forecast is only a week long, so every window sees the same weather
//! estimate; windows differ only in their reason text.

use chrono::NaiveDate;
use tracing::debug;

use crate::config::IrrigationConfig;
use crate::types::{
    offset_date, CropCycle, IrrigationAction, IrrigationPlan, IrrigationWindow, SoilProfile, StageIrrigationAdvice,
    WeatherForecastPoint,
};

#[derive(Debug, Clone)]
pub struct IrrigationPlanner {
    config: IrrigationConfig,
}

/// Forecast summary shared by every window.
#[derive(Debug, Clone, Copy, PartialEq)]
struct WeatherOutlook {
    mean_temperature: Option<f64>,
    /// Expected rain over one window (mm)
    window_rain_mm: f64,
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

impl IrrigationPlanner {
    pub fn new(config: &IrrigationConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Base need per window for `crop_type` (case-insensitive substring, first match).
    pub fn crop_need_mm(&self, crop_type: &str) -> f64 {
        let crop = crop_type.to_lowercase();
        self.config
            .crop_needs
            .iter()
            .find(|need| need.patterns.iter().any(|p| crop.contains(&p.to_lowercase())))
            .map_or(self.config.default_crop_need_mm, |need| need.base_mm)
    }

    /// Additive soil adjustments around 1.0. Unknown values are neutral.
    pub fn soil_factor(&self, soil: &SoilProfile) -> f64 {
        let adj = &self.config.soil;
        let soil_type = soil.soil_type.as_deref().unwrap_or_default().to_lowercase();
        let drainage = soil.drainage.as_deref().unwrap_or_default().trim().to_lowercase();

        let mut factor = 1.0;
        if soil_type.contains("clay") {
            factor += adj.clay;
        }
        if soil_type.contains("sandy") {
            factor += adj.sandy;
        }
        match drainage.as_str() {
            "poor" => factor += adj.poor_drainage,
            "good" => factor += adj.good_drainage,
            _ => {}
        }
        factor
    }

    fn outlook(&self, forecast: &[WeatherForecastPoint]) -> WeatherOutlook {
        let mean_rain = mean(forecast.iter().filter_map(|p| p.rainfall)).unwrap_or(0.0);
        WeatherOutlook {
            mean_temperature: mean(forecast.iter().filter_map(|p| p.temperature)),
            window_rain_mm: self.config.rain_window_factor * mean_rain,
        }
    }

    fn temperature_multiplier(&self, mean_temperature: Option<f64>) -> f64 {
        match mean_temperature {
            Some(t) if t >= self.config.hot_threshold_c => self.config.hot_multiplier,
            Some(t) if t <= self.config.cool_threshold_c => self.config.cool_multiplier,
            _ => 1.0,
        }
    }

    fn reason_for(&self, window: usize) -> &str {
        self.config
            .window_reasons
            .iter()
            .find(|r| r.window == window)
            .map_or(self.config.default_reason.as_str(), |r| r.reason.as_str())
    }

    /// Build the plan. `crop_cycle`, when given, adds per-stage guidance but
    /// never changes the window decisions.
    pub fn schedule(
        &self,
        crop_type: &str,
        sowing_date: NaiveDate,
        forecast: &[WeatherForecastPoint],
        crop_cycle: Option<&CropCycle>,
        soil: &SoilProfile,
    ) -> IrrigationPlan {
        let cfg = &self.config;
        let outlook = self.outlook(forecast);
        let soil_factor = self.soil_factor(soil);
        let need = self.crop_need_mm(crop_type) * self.temperature_multiplier(outlook.mean_temperature) * soil_factor;
        let required_mm = (need - cfg.rain_offset_fraction * outlook.window_rain_mm).max(0.0);

        let windows: Vec<IrrigationWindow> = (0..cfg.window_count)
            .map(|i| {
                let start_date = offset_date(sowing_date, i as i64 * cfg.window_days);
                let end_date = offset_date(start_date, cfg.window_days - 1);
                let week_range = format!("Week {}-{}", 2 * i + 1, 2 * i + 2);

                let (action, amount_mm, reason) = if required_mm < cfg.skip_threshold_mm {
                    (IrrigationAction::Skip, None, cfg.skip_reason.clone())
                } else {
                    let amount = (required_mm / 2.0).round_ties_even() as u32;
                    (IrrigationAction::Irrigate, Some(amount), self.reason_for(i).to_string())
                };

                IrrigationWindow {
                    week_range,
                    start_date,
                    end_date,
                    action,
                    amount_mm,
                    reason,
                    soil_factor,
                    required_mm,
                }
            })
            .collect();

        let baseline = cfg.baseline_mm_per_window * cfg.window_count as f64;
        let applied: f64 = windows.iter().filter_map(|w| w.amount_mm).map(f64::from).sum();
        let water_savings_percent = if baseline > 0.0 {
            ((baseline - applied) / baseline * 100.0).round_ties_even().clamp(-100.0, 100.0) as i32
        } else {
            0
        };

        let stage_guidance = crop_cycle.map(|c| self.stage_guidance(c)).unwrap_or_default();

        debug!(
            crop = %crop_type,
            mean_temp = ?outlook.mean_temperature,
            window_rain_mm = outlook.window_rain_mm,
            soil_factor,
            required_mm,
            water_savings_percent,
            "Irrigation plan computed"
        );

        IrrigationPlan {
            windows,
            water_savings_percent,
            stage_guidance,
        }
    }

    /// Per-stage guidance for every stage code present in the need table.
    pub fn stage_guidance(&self, cycle: &CropCycle) -> Vec<StageIrrigationAdvice> {
        cycle
            .stages
            .iter()
            .filter_map(|entry| {
                let need = self.config.stage_needs.iter().find(|n| n.code == entry.stage.code)?;
                Some(StageIrrigationAdvice {
                    growth_stage: entry.stage.name.clone(),
                    stage_date: entry.predicted_date,
                    days_from_sowing: entry.days_from_sowing,
                    irrigation_frequency: need.frequency.clone(),
                    water_amount: need.amount.clone(),
                    priority: need.priority.clone(),
                    recommendation: format!(
                        "Apply {} irrigation every {} during {} stage",
                        need.amount, need.frequency, entry.stage.name
                    ),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::defaults;
    use crate::forecast::TimelineBuilder;

    fn planner() -> IrrigationPlanner {
        IrrigationPlanner::new(&IrrigationConfig::default())
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn week(temp: f64, rain: f64) -> Vec<WeatherForecastPoint> {
        vec![WeatherForecastPoint::new(temp, rain); 7]
    }

    #[test]
    fn test_wheat_sandy_loam_no_rain_irrigates_everywhere() {
        let soil = SoilProfile::new("sandy loam", "good");
        let plan = planner().schedule("Wheat", date("2025-11-01"), &week(30.0, 0.0), None, &soil);

        assert_eq!(plan.windows.len(), 4);
        for w in &plan.windows {
            assert!(w.soil_factor > 1.0);
            assert_eq!(w.action, IrrigationAction::Irrigate);
            // 80 * 1.2 soil factor = 96 mm, two applications of 48
            assert_eq!(w.amount_mm, Some(48));
        }
        assert_eq!(plan.windows[0].reason, "Supplemental irrigation");
        assert_eq!(plan.windows[1].reason, "Tillering/vegetative support");
        assert_eq!(plan.windows[2].reason, "Flowering critical period");
        assert_eq!(plan.windows[3].reason, "Supplemental irrigation");
        // 480 - 4 * 48 = 288 -> 60 %
        assert_eq!(plan.water_savings_percent, 60);
        assert!(plan.stage_guidance.is_empty());
    }

    #[test]
    fn test_window_labels_and_dates() {
        let plan = planner().schedule("Rice", date("2025-09-24"), &[], None, &SoilProfile::default());
        let labels: Vec<&str> = plan.windows.iter().map(|w| w.week_range.as_str()).collect();
        assert_eq!(labels, vec!["Week 1-2", "Week 3-4", "Week 5-6", "Week 7-8"]);
        assert_eq!(plan.windows[1].start_date, date("2025-10-08"));
        assert_eq!(plan.windows[1].end_date, date("2025-10-21"));
    }

    #[test]
    fn test_heavy_rain_skips() {
        let plan = planner().schedule("Wheat", date("2025-06-01"), &week(25.0, 60.0), None, &SoilProfile::default());
        assert!(plan.windows.iter().all(|w| w.action == IrrigationAction::Skip));
        assert!(plan.windows.iter().all(|w| w.amount_mm.is_none()));
        assert_eq!(plan.windows[0].reason, "Natural rainfall sufficient");
        assert_eq!(plan.water_savings_percent, 100);
    }

    #[test]
    fn test_hot_sugarcane_savings_clamped() {
        let mut config = IrrigationConfig::default();
        config.baseline_mm_per_window = 10.0;
        let plan = IrrigationPlanner::new(&config).schedule(
            "Sugarcane",
            date("2025-06-01"),
            &week(40.0, 0.0),
            None,
            &SoilProfile::default(),
        );
        // 180 * 1.2 = 216 -> 108 per application
        assert_eq!(plan.windows[0].amount_mm, Some(108));
        assert_eq!(plan.water_savings_percent, -100);
    }

    #[test]
    fn test_cool_clay_poor_drainage() {
        let p = planner();
        let soil = SoilProfile::new("Heavy CLAY", "Poor");
        assert!((p.soil_factor(&soil) - 0.8).abs() < 1e-12);
        let plan = p.schedule("maize", date("2025-06-01"), &week(20.0, 0.0), None, &soil);
        // 100 * 0.9 * 0.8 = 72 -> 36
        assert_eq!(plan.windows[0].amount_mm, Some(36));
    }

    #[test]
    fn test_half_millimetres_round_to_even() {
        let mut config = IrrigationConfig::default();
        config.default_crop_need_mm = 81.0;
        let plan = IrrigationPlanner::new(&config).schedule("Teff", date("2025-06-01"), &[], None, &SoilProfile::default());
        // 81 / 2 = 40.5 -> 40
        assert_eq!(plan.windows[0].amount_mm, Some(40));

        let cotton = planner().schedule("Cotton", date("2025-06-01"), &week(25.0, 7.5), None, &SoilProfile::default());
        assert_eq!(cotton.windows[0].amount_mm, Some(40));
        assert_eq!(cotton.water_savings_percent, 67);

        config.default_crop_need_mm = 12.0;
        config.skip_threshold_mm = 0.0;
        config.baseline_mm_per_window = 16.0;
        let plan = IrrigationPlanner::new(&config).schedule("Teff", date("2025-06-01"), &[], None, &SoilProfile::default());
        // (64 - 4 * 6) / 64 = 62.5 % -> 62
        assert_eq!(plan.windows[0].amount_mm, Some(6));
        assert_eq!(plan.water_savings_percent, 62);
    }

    #[test]
    fn test_windows_saturate_at_calendar_end() {
        let plan = planner().schedule("Rice", NaiveDate::MAX, &[], None, &SoilProfile::default());
        assert_eq!(plan.windows.len(), 4);
        assert!(plan.windows.iter().all(|w| w.end_date == NaiveDate::MAX));
    }

    #[test]
    fn test_crop_need_lookup() {
        let p = planner();
        assert_eq!(p.crop_need_mm("Basmati Rice"), 120.0);
        assert_eq!(p.crop_need_mm("CORN"), 100.0);
        assert_eq!(p.crop_need_mm("Cotton"), 90.0);
        assert_eq!(p.crop_need_mm(""), 90.0);
    }

    #[test]
    fn test_partial_forecast_values_skipped() {
        let forecast = vec![
            WeatherForecastPoint { temperature: Some(36.0), rainfall: None },
            WeatherForecastPoint { temperature: None, rainfall: Some(10.0) },
            WeatherForecastPoint::default(),
        ];
        let plan = planner().schedule("Rice", date("2025-06-01"), &forecast, None, &SoilProfile::default());
        // 120 * 1.2 - 0.6 * 20 = 132 -> 66
        assert_eq!(plan.windows[0].amount_mm, Some(66));
        assert!((plan.windows[0].required_mm - 132.0).abs() < 1e-9);
    }

    #[test]
    fn test_savings_always_in_range() {
        let p = planner();
        for temp in [-10.0, 15.0, 30.0, 50.0] {
            for rain in [0.0, 5.0, 500.0] {
                for crop in ["Rice", "Sugarcane", "Unknown"] {
                    let plan = p.schedule(crop, date("2025-01-01"), &week(temp, rain), None, &SoilProfile::new("sandy", "good"));
                    assert!((-100..=100).contains(&plan.water_savings_percent));
                }
            }
        }
    }

    #[test]
    fn test_stage_guidance_from_cycle() {
        let timeline = TimelineBuilder::new(&defaults::stage_tables());
        let cycle = timeline.build("Sugarcane", date("2025-02-01"), 300, 300);
        let plan = planner().schedule("Sugarcane", date("2025-02-01"), &[], Some(&cycle), &SoilProfile::default());

        let stages: Vec<&str> = plan.stage_guidance.iter().map(|a| a.growth_stage.as_str()).collect();
        assert_eq!(stages, vec!["Germination", "Tillering", "Grand Growth", "Maturity"]);
        let first = &plan.stage_guidance[0];
        assert_eq!(first.irrigation_frequency, "daily");
        assert_eq!(first.priority, "high");
        assert_eq!(first.recommendation, "Apply light irrigation every daily during Germination stage");
        assert_eq!(plan.stage_guidance[3].irrigation_frequency, "reduce");

        // Guidance never alters window decisions
        let without = planner().schedule("Sugarcane", date("2025-02-01"), &[], None, &SoilProfile::default());
        assert_eq!(plan.windows, without.windows);
    }
}
