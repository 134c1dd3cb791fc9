//! Distance-to-level conversion and the per-reservoir report derived from it.

use crate::config::Config;
use std::f64::consts::PI;

/// Radius of the well pipe, used for the liters estimate in reports.
const PIPE_RADIUS_M: f64 = 0.4;

/// Apply the installation calibration and mounting geometry. An undefined
/// distance maps to the `(0.0, 0.0)` sentinel; callers must check the
/// distance input before treating the level as a real measurement.
pub fn water_level(distance: Option<f64>, cfg: &Config) -> (f64, f64) {
    match distance {
        Some(d) => {
            let calibrated = d + cfg.sensor_calibration_cm;
            let level = -calibrated - cfg.sensor_from_ceiling_cm;
            (calibrated, level)
        }
        None => (0.0, 0.0),
    }
}

#[derive(Debug, Clone)]
pub struct ReservoirReport {
    pub name: String,
    pub remaining_cm: f64,
    pub liters: f64,
    pub percent_full: f64,
}

pub fn reservoir_reports(calibrated: f64, cfg: &Config) -> Vec<ReservoirReport> {
    cfg.reservoirs
        .iter()
        .map(|profile| {
            let remaining_cm =
                profile.empty_distance_from_ceiling_cm - cfg.sensor_from_ceiling_cm - calibrated;
            let liters = remaining_cm / 100.0 * PI * PIPE_RADIUS_M * PIPE_RADIUS_M * 1000.0;
            let percent_full = remaining_cm
                / (profile.empty_distance_from_ceiling_cm - cfg.full_distance_from_ceiling_cm)
                * 100.0;
            ReservoirReport {
                name: profile.name.clone(),
                remaining_cm,
                liters,
                percent_full,
            }
        })
        .collect()
}

/// Human-readable measurement summary for the notification body.
pub fn report_text(distance: Option<f64>, calibrated: f64, level: f64, cfg: &Config) -> String {
    let Some(distance) = distance else {
        return "No distance".to_string();
    };

    let mut msg = String::new();
    for report in reservoir_reports(calibrated, cfg) {
        msg.push_str(&format!(
            "\nReport name: {}. Water remaining = {:.1} cm = {:.1} liters = {}% from full.",
            report.name, report.remaining_cm, report.liters, report.percent_full as i64
        ));
    }

    format!(
        "Measured Distance = {distance:.1} cm. Calibrated = {calibrated:.1} cm. Water level = {level:.1} cm. {msg}\n"
    )
}
