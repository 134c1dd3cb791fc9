mod config;
mod gpio;
mod guard;
mod level;
mod mailer;
mod pipeline;
mod ranging;
mod sampling;
mod sheet;
mod store;

use crate::config::Config;
use crate::gpio::WallClock;
use crate::mailer::SmtpNotifier;
use crate::sheet::{HttpSheetTarget, SheetTarget};
use crate::store::HistoryStore;
use anyhow::Result;
use clap::Parser;

/// Measure the well water level once and record it.
#[derive(Debug, Parser)]
#[command(name = "well-gauge")]
struct Args {
    /// Email address for the measurement report. May be given multiple times.
    #[arg(long = "address")]
    addresses: Vec<String>,

    /// Override the number of raw samples taken this run.
    #[arg(long)]
    samples: Option<u32>,
}

fn init_tracing() -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,well_gauge=info".into());
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .try_init()
        .map_err(|err| anyhow::anyhow!(err.to_string()))?;
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing()?;

    let mut cfg = Config::from_env()?;
    if let Some(samples) = args.samples {
        cfg.sample_count = samples;
    }

    let store = HistoryStore::new(&cfg.db_path, &cfg.table);
    let notifier = SmtpNotifier::new(&cfg.smtp_host);
    let sheet_target = match &cfg.sheet_url {
        Some(url) => Some(HttpSheetTarget::new(url.clone(), cfg.sheet_token.clone())?),
        None => None,
    };

    let clock = WallClock;
    let mut lines = hardware_lines(&cfg);
    pipeline::run(
        &cfg,
        &store,
        &mut lines,
        &clock,
        &notifier,
        sheet_target.as_ref().map(|target| target as &dyn SheetTarget),
        &args.addresses,
    )
}

#[cfg(feature = "gpio-hardware")]
fn hardware_lines(cfg: &Config) -> gpio::SysfsTriggerEcho {
    gpio::SysfsTriggerEcho::new(cfg.trigger_pin, cfg.echo_pin)
}

#[cfg(not(feature = "gpio-hardware"))]
fn hardware_lines(_cfg: &Config) -> gpio::UnavailableTriggerEcho {
    gpio::UnavailableTriggerEcho
}
