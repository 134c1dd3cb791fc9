//! One measurement cycle, start to finish: sample, convert, report, guard,
//! persist, and decide whether the sheet target needs the recent history.
//! Single-threaded; runs to completion once per invocation.

use crate::config::Config;
use crate::gpio::{Clock, TriggerEcho};
use crate::guard;
use crate::level;
use crate::mailer::Notifier;
use crate::sampling;
use crate::sheet::{self, SheetTarget, LAST_SHEET_VALUE};
use crate::store::HistoryStore;
use anyhow::Result;
use chrono::{Duration as ChronoDuration, Timelike, Utc};

pub fn run<G: TriggerEcho, C: Clock>(
    cfg: &Config,
    store: &HistoryStore,
    gpio: &mut G,
    clock: &C,
    notifier: &dyn Notifier,
    sheet_target: Option<&dyn SheetTarget>,
    addresses: &[String],
) -> Result<()> {
    let distance = sampling::run_round(gpio, clock, cfg.sample_count)?;
    if let Err(err) = gpio.release() {
        tracing::warn!(error = %err, "failed to release gpio lines");
    }

    let (calibrated, water_level) = level::water_level(distance, cfg);
    let now = Utc::now();
    let now = now.with_nanosecond(0).unwrap_or(now);

    if !addresses.is_empty() {
        let body = level::report_text(distance, calibrated, water_level, cfg);
        for address in addresses {
            if let Err(err) = notifier.send(address, "Distance", &body) {
                tracing::error!(error = %err, address = %address, "notification failed");
            }
        }
    }

    let Some(distance_cm) = distance else {
        tracing::warn!("no usable distance this round; nothing persisted");
        return Ok(());
    };

    let last = store.last_reading()?;
    if !guard::accept(now, water_level, last.as_ref(), cfg.max_rate_cm_per_hour) {
        tracing::info!(
            level = water_level,
            last = ?last,
            "reading rejected by rate-of-change guard"
        );
        return Ok(());
    }

    store.append(now, water_level)?;
    tracing::info!(
        distance_cm,
        calibrated,
        level = water_level,
        "reading persisted"
    );

    let Some(sheet_target) = sheet_target else {
        return Ok(());
    };

    let cached = store.get_cache(LAST_SHEET_VALUE)?;
    if !sheet::should_sync(water_level, cached, cfg.sheet_threshold_cm) {
        tracing::debug!(level = water_level, cached = ?cached, "level change below sheet threshold");
        return Ok(());
    }

    let since = now - ChronoDuration::days(cfg.sheet_window_days);
    let readings = store.readings_since(since)?;
    let rows = sheet::to_sheet_rows(&readings, cfg.display_tz);
    if let Err(err) = sheet_target.push(&rows) {
        // Not retried; the cache still advances below.
        tracing::error!(error = %err, rows = rows.len(), "sheet push failed");
    }
    store.set_cache(LAST_SHEET_VALUE, water_level)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpio::testkit::{MockClock, Pulse, ScriptedGpio};
    use crate::sheet::SheetRow;
    use anyhow::bail;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;
    use std::time::Duration;
    use tempfile::TempDir;

    struct RecordingNotifier {
        sent: RefCell<Vec<(String, String, String)>>,
    }

    impl RecordingNotifier {
        fn new() -> Self {
            Self {
                sent: RefCell::new(Vec::new()),
            }
        }
    }

    impl Notifier for RecordingNotifier {
        fn send(&self, address: &str, subject: &str, body: &str) -> Result<()> {
            self.sent.borrow_mut().push((
                address.to_string(),
                subject.to_string(),
                body.to_string(),
            ));
            Ok(())
        }
    }

    struct RecordingSheet {
        pushes: RefCell<Vec<Vec<SheetRow>>>,
        fail: bool,
    }

    impl RecordingSheet {
        fn new(fail: bool) -> Self {
            Self {
                pushes: RefCell::new(Vec::new()),
                fail,
            }
        }
    }

    impl SheetTarget for RecordingSheet {
        fn push(&self, rows: &[SheetRow]) -> Result<()> {
            self.pushes.borrow_mut().push(rows.to_vec());
            if self.fail {
                bail!("sheet endpoint unreachable");
            }
            Ok(())
        }
    }

    fn rig(pulses: Vec<Pulse>) -> (ScriptedGpio, MockClock) {
        let offset = Rc::new(Cell::new(Duration::ZERO));
        (
            ScriptedGpio::new(pulses, offset.clone()),
            MockClock::new(offset, Duration::ZERO),
        )
    }

    fn ten_good_pulses() -> Vec<Pulse> {
        [30.0, 31.0, 29.0, 32.0, 28.0, 33.0, 27.0, 34.0, 26.0, 35.0]
            .iter()
            .map(|cm| Pulse::Width(ScriptedGpio::width_for_cm(*cm)))
            .collect()
    }

    fn store(dir: &TempDir) -> HistoryStore {
        HistoryStore::new(dir.path().join("db.sqlite"), "water_level")
    }

    #[test]
    fn full_run_persists_and_pushes_on_first_sync() {
        let dir = TempDir::new().expect("tempdir");
        let store = store(&dir);
        let cfg = Config::for_tests();
        let (mut gpio, clock) = rig(ten_good_pulses());
        let notifier = RecordingNotifier::new();
        let sheet = RecordingSheet::new(false);

        run(
            &cfg,
            &store,
            &mut gpio,
            &clock,
            &notifier,
            Some(&sheet as &dyn SheetTarget),
            &[],
        )
        .expect("run");

        // trimmed max 33 cm, calibration -4, sensor 120 cm below the ceiling
        let last = store.last_reading().expect("last").expect("reading");
        assert_eq!(last.level, -149.0);

        let pushes = sheet.pushes.borrow();
        assert_eq!(pushes.len(), 1);
        assert_eq!(pushes[0].len(), 1);
        assert_eq!(pushes[0][0].level, -149.0);

        assert_eq!(
            store.get_cache(LAST_SHEET_VALUE).expect("cache"),
            Some(-149.0)
        );
        assert!(gpio.released, "gpio lines handed back after the round");
        assert!(notifier.sent.borrow().is_empty());
    }

    #[test]
    fn failed_push_still_moves_the_cache_forward() {
        let dir = TempDir::new().expect("tempdir");
        let store = store(&dir);
        let cfg = Config::for_tests();
        let (mut gpio, clock) = rig(ten_good_pulses());
        let notifier = RecordingNotifier::new();
        let sheet = RecordingSheet::new(true);

        run(
            &cfg,
            &store,
            &mut gpio,
            &clock,
            &notifier,
            Some(&sheet as &dyn SheetTarget),
            &[],
        )
        .expect("run survives a push failure");

        assert_eq!(sheet.pushes.borrow().len(), 1);
        assert_eq!(
            store.get_cache(LAST_SHEET_VALUE).expect("cache"),
            Some(-149.0)
        );
    }

    #[test]
    fn round_without_echoes_persists_nothing_but_still_notifies() {
        let dir = TempDir::new().expect("tempdir");
        let store = store(&dir);
        let cfg = Config::for_tests();
        let (mut gpio, clock) = rig(vec![Pulse::NoFall; 10]);
        let notifier = RecordingNotifier::new();
        let addresses = vec!["well@example.net".to_string()];

        run(
            &cfg,
            &store,
            &mut gpio,
            &clock,
            &notifier,
            None,
            &addresses,
        )
        .expect("run");

        assert_eq!(store.last_reading().expect("last"), None);
        let sent = notifier.sent.borrow();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "well@example.net");
        assert_eq!(sent[0].1, "Distance");
        assert_eq!(sent[0].2, "No distance");
    }

    #[test]
    fn implausible_jump_is_dropped_silently() {
        let dir = TempDir::new().expect("tempdir");
        let store = store(&dir);
        let cfg = Config::for_tests();

        // A reading from this same instant makes any change implausible.
        store.append(Utc::now(), 0.0).expect("seed");

        let (mut gpio, clock) = rig(ten_good_pulses());
        let notifier = RecordingNotifier::new();
        let sheet = RecordingSheet::new(false);

        run(
            &cfg,
            &store,
            &mut gpio,
            &clock,
            &notifier,
            Some(&sheet as &dyn SheetTarget),
            &[],
        )
        .expect("run");

        let last = store.last_reading().expect("last").expect("reading");
        assert_eq!(last.level, 0.0, "rejected reading must not be persisted");
        assert!(sheet.pushes.borrow().is_empty());
    }

    #[test]
    fn small_change_skips_the_sheet_but_still_persists() {
        let dir = TempDir::new().expect("tempdir");
        let store = store(&dir);
        let cfg = Config::for_tests();

        let yesterday = Utc::now() - ChronoDuration::days(1);
        store.append(yesterday, -149.3).expect("seed");
        store.set_cache(LAST_SHEET_VALUE, -149.0).expect("seed cache");

        let (mut gpio, clock) = rig(ten_good_pulses());
        let notifier = RecordingNotifier::new();
        let sheet = RecordingSheet::new(false);

        run(
            &cfg,
            &store,
            &mut gpio,
            &clock,
            &notifier,
            Some(&sheet as &dyn SheetTarget),
            &[],
        )
        .expect("run");

        let readings = store
            .readings_since(yesterday - ChronoDuration::hours(1))
            .expect("since");
        assert_eq!(readings.len(), 2);
        assert!(sheet.pushes.borrow().is_empty());
        assert_eq!(
            store.get_cache(LAST_SHEET_VALUE).expect("cache"),
            Some(-149.0)
        );
    }
}
