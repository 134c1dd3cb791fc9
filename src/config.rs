use anyhow::{anyhow, Context, Result};
use chrono_tz::Tz;
use serde::Deserialize;
use std::env;
use std::path::PathBuf;

/// One physical reservoir fed from the well, described by how far its
/// empty mark sits below the well ceiling. Used only for reporting.
#[derive(Debug, Clone, Deserialize)]
pub struct ReservoirProfile {
    pub name: String,
    pub empty_distance_from_ceiling_cm: f64,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub table: String,

    pub trigger_pin: u64,
    pub echo_pin: u64,
    pub sample_count: u32,

    pub sensor_calibration_cm: f64,
    pub sensor_from_ceiling_cm: f64,
    pub full_distance_from_ceiling_cm: f64,
    pub reservoirs: Vec<ReservoirProfile>,

    pub max_rate_cm_per_hour: f64,
    pub sheet_threshold_cm: f64,
    pub sheet_window_days: i64,
    pub sheet_url: Option<String>,
    pub sheet_token: Option<String>,

    pub smtp_host: String,
    pub display_tz: Tz,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let db_path = PathBuf::from(env_string("WELL_DB_PATH", Some("db.sqlite".to_string()))?);
        let table = env_string("WELL_TABLE", Some("water_level".to_string()))?;

        let trigger_pin = env_u64("WELL_TRIGGER_PIN", Some(15))?;
        let echo_pin = env_u64("WELL_ECHO_PIN", Some(14))?;
        let sample_count = env_u64("WELL_SAMPLE_COUNT", Some(1000))? as u32;

        let sensor_calibration_cm = env_f64("WELL_SENSOR_CALIBRATION_CM", Some(-4.0))?;
        let sensor_from_ceiling_cm = env_f64("WELL_SENSOR_FROM_CEILING_CM", Some(120.0))?;
        let full_distance_from_ceiling_cm =
            env_f64("WELL_FULL_DISTANCE_FROM_CEILING_CM", Some(125.0))?;

        let reservoirs = match env_optional("WELL_RESERVOIRS_JSON") {
            Some(raw) => serde_json::from_str(&raw).context("invalid WELL_RESERVOIRS_JSON")?,
            None => default_reservoirs(),
        };

        let max_rate_cm_per_hour = env_f64("WELL_MAX_RATE_CM_PER_HOUR", Some(5.0))?;
        let sheet_threshold_cm = env_f64("WELL_SHEET_THRESHOLD_CM", Some(1.0))?;
        let sheet_window_days = env_u64("WELL_SHEET_WINDOW_DAYS", Some(30))? as i64;
        let sheet_url = env_optional("WELL_SHEET_URL");
        let sheet_token = env_optional("WELL_SHEET_TOKEN");

        let smtp_host = env_string("WELL_SMTP_HOST", Some("localhost".to_string()))?;

        let tz_name = env_string("WELL_DISPLAY_TZ", Some("Europe/Helsinki".to_string()))?;
        let display_tz: Tz = tz_name
            .parse()
            .map_err(|err| anyhow!("invalid WELL_DISPLAY_TZ {tz_name}: {err}"))?;

        Ok(Self {
            db_path,
            table,
            trigger_pin,
            echo_pin,
            sample_count,
            sensor_calibration_cm,
            sensor_from_ceiling_cm,
            full_distance_from_ceiling_cm,
            reservoirs,
            max_rate_cm_per_hour,
            sheet_threshold_cm,
            sheet_window_days,
            sheet_url,
            sheet_token,
            smtp_host,
            display_tz,
        })
    }

    #[cfg(test)]
    pub(crate) fn for_tests() -> Self {
        Self {
            db_path: PathBuf::from("db.sqlite"),
            table: "water_level".to_string(),
            trigger_pin: 15,
            echo_pin: 14,
            sample_count: 10,
            sensor_calibration_cm: -4.0,
            sensor_from_ceiling_cm: 120.0,
            full_distance_from_ceiling_cm: 125.0,
            reservoirs: default_reservoirs(),
            max_rate_cm_per_hour: 5.0,
            sheet_threshold_cm: 1.0,
            sheet_window_days: 30,
            sheet_url: None,
            sheet_token: None,
            smtp_host: "localhost".to_string(),
            display_tz: chrono_tz::Europe::Helsinki,
        }
    }
}

fn default_reservoirs() -> Vec<ReservoirProfile> {
    vec![
        ReservoirProfile {
            name: "electric pump".to_string(),
            empty_distance_from_ceiling_cm: 352.0,
        },
        ReservoirProfile {
            name: "hand pump".to_string(),
            empty_distance_from_ceiling_cm: 372.0,
        },
    ]
}

fn env_string(key: &str, default: Option<String>) -> Result<String> {
    match env::var(key) {
        Ok(value) => Ok(value.trim().to_string()),
        Err(_) => default.ok_or_else(|| anyhow!("missing env var {key}")),
    }
}

fn env_u64(key: &str, default: Option<u64>) -> Result<u64> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse::<u64>()
            .with_context(|| format!("invalid {key}")),
        Err(_) => default.ok_or_else(|| anyhow!("missing env var {key}")),
    }
}

fn env_f64(key: &str, default: Option<f64>) -> Result<f64> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse::<f64>()
            .with_context(|| format!("invalid {key}")),
        Err(_) => default.ok_or_else(|| anyhow!("missing env var {key}")),
    }
}

fn env_optional(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
