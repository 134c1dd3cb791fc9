//! Change-threshold sync decision and the external sheet seam: recent
//! history is pushed only when the level has moved enough since the last
//! push, newest row first, timestamps rendered in the display time zone.

use crate::store::Reading;
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::time::Duration;

/// Cache key remembering the last value handed to the sheet target.
pub const LAST_SHEET_VALUE: &str = "last_sheet_value";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SheetRow {
    pub ts: String,
    pub level: f64,
}

/// True when no value was ever pushed, or the level moved at least
/// `threshold_cm` since the last push (inclusive).
pub fn should_sync(new_level: f64, cached: Option<f64>, threshold_cm: f64) -> bool {
    match cached {
        None => true,
        Some(prev) => (new_level - prev).abs() >= threshold_cm,
    }
}

/// Shape history for the target: newest first, display-zone timestamps.
pub fn to_sheet_rows(readings: &[Reading], tz: Tz) -> Vec<SheetRow> {
    readings
        .iter()
        .rev()
        .map(|reading| SheetRow {
            ts: display_timestamp(reading.ts, tz),
            level: reading.level,
        })
        .collect()
}

pub fn display_timestamp(ts: DateTime<Utc>, tz: Tz) -> String {
    ts.with_timezone(&tz).format("%Y-%m-%d %H:%M").to_string()
}

pub trait SheetTarget {
    fn push(&self, rows: &[SheetRow]) -> Result<()>;
}

/// POSTs rows as JSON to a configured endpoint (e.g. an Apps Script web app
/// fronting the spreadsheet), optionally bearer-authenticated.
pub struct HttpSheetTarget {
    url: String,
    token: Option<String>,
    client: reqwest::blocking::Client,
}

impl HttpSheetTarget {
    pub fn new(url: String, token: Option<String>) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("build sheet http client")?;
        Ok(Self { url, token, client })
    }
}

impl SheetTarget for HttpSheetTarget {
    fn push(&self, rows: &[SheetRow]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }

        let mut request = self
            .client
            .post(&self.url)
            .json(&serde_json::json!({ "rows": rows }));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().context("push rows to sheet endpoint")?;
        let status = response.status();
        if !status.is_success() {
            bail!("sheet endpoint returned {status}");
        }
        Ok(())
    }
}
