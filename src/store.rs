//! History store adapter: an append-only time series of accepted readings
//! plus a small named cache, both in one SQLite file. Connections are opened
//! per logical operation; runs are infrequent and single-threaded.

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub ts: DateTime<Utc>,
    pub level: f64,
}

pub struct HistoryStore {
    path: PathBuf,
    table: String,
}

impl HistoryStore {
    pub fn new(path: impl AsRef<Path>, table: impl Into<String>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            table: table.into(),
        }
    }

    fn open(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path)
            .with_context(|| format!("open sqlite db {}", self.path.display()))?;
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {t} (
                 id INTEGER PRIMARY KEY AUTOINCREMENT,
                 ts TEXT NOT NULL,
                 water_level TEXT NOT NULL
             );
             CREATE TABLE IF NOT EXISTS {t}_cache (
                 name TEXT PRIMARY KEY,
                 value TEXT NOT NULL
             );",
            t = self.table
        ))
        .context("create store tables")?;
        Ok(conn)
    }

    pub fn append(&self, ts: DateTime<Utc>, level: f64) -> Result<()> {
        let conn = self.open()?;
        conn.execute(
            &format!(
                "INSERT INTO {} (ts, water_level) VALUES (?1, ?2)",
                self.table
            ),
            params![store_timestamp(ts), format_level(level)],
        )
        .context("append reading")?;
        Ok(())
    }

    pub fn last_reading(&self) -> Result<Option<Reading>> {
        let conn = self.open()?;
        let row = conn
            .query_row(
                &format!(
                    "SELECT ts, water_level FROM {} ORDER BY id DESC LIMIT 1",
                    self.table
                ),
                [],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()
            .context("read last reading")?;
        row.map(|(ts, level)| parse_reading(&ts, &level)).transpose()
    }

    /// Readings strictly after `start`, oldest first (insertion order).
    pub fn readings_since(&self, start: DateTime<Utc>) -> Result<Vec<Reading>> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT ts, water_level FROM {} WHERE ts > ?1 ORDER BY id",
            self.table
        ))?;
        let rows = stmt
            .query_map(params![store_timestamp(start)], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .context("read readings after timestamp")?;

        let mut readings = Vec::new();
        for row in rows {
            let (ts, level) = row?;
            readings.push(parse_reading(&ts, &level)?);
        }
        Ok(readings)
    }

    pub fn get_cache(&self, name: &str) -> Result<Option<f64>> {
        let conn = self.open()?;
        let value = conn
            .query_row(
                &format!("SELECT value FROM {}_cache WHERE name = ?1", self.table),
                params![name],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .with_context(|| format!("read cache value {name}"))?;
        value
            .map(|raw| {
                raw.parse::<f64>()
                    .with_context(|| format!("bad cache value for {name}: {raw}"))
            })
            .transpose()
    }

    pub fn set_cache(&self, name: &str, level: f64) -> Result<()> {
        let conn = self.open()?;
        conn.execute(
            &format!(
                "INSERT OR REPLACE INTO {}_cache (name, value) VALUES (?1, ?2)",
                self.table
            ),
            params![name, format_level(level)],
        )
        .with_context(|| format!("write cache value {name}"))?;
        Ok(())
    }
}

/// Half-up rounding at one decimal, rendered as text for storage.
pub fn format_level(level: f64) -> String {
    let scaled = ((level.abs() * 10.0) + 0.5).floor() / 10.0;
    let signed = if level < 0.0 && scaled != 0.0 {
        -scaled
    } else {
        scaled
    };
    format!("{signed:.1}")
}

fn store_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, false)
}

fn parse_reading(ts: &str, level: &str) -> Result<Reading> {
    let ts = DateTime::parse_from_rfc3339(ts)
        .with_context(|| format!("bad timestamp in store: {ts}"))?
        .with_timezone(&Utc);
    let level = level
        .parse::<f64>()
        .with_context(|| format!("bad level in store: {level}"))?;
    Ok(Reading { ts, level })
}
