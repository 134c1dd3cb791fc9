//! Repeated-sampling aggregation: drive the ranging driver n times, drop the
//! failed cycles, trim the extremes, and reduce what is left to a single
//! distance.

use crate::gpio::{Clock, GpioError, TriggerEcho};
use crate::ranging;
use std::time::Duration;

/// Settle time after (re)configuring the lines, before the first cycle.
const SETTLE_DELAY: Duration = Duration::from_millis(500);

/// Gap between cycles so a late echo from the previous one dies out.
const INTER_SAMPLE_DELAY: Duration = Duration::from_millis(60);

/// Fraction of the sorted samples trimmed from each end.
const TRIM_FRACTION: f64 = 0.2;

/// One full sampling round. `Ok(None)` means the round produced no usable
/// distance; the round itself never fails on timeouts alone.
pub fn run_round<G: TriggerEcho, C: Clock>(
    gpio: &mut G,
    clock: &C,
    n: u32,
) -> Result<Option<f64>, GpioError> {
    gpio.reset()?;
    clock.sleep(SETTLE_DELAY);

    let mut samples = Vec::with_capacity(n as usize);
    for i in 0..n {
        if i > 0 {
            // Sleep only between cycles, not before the first.
            clock.sleep(INTER_SAMPLE_DELAY);
        }
        if let Some(cm) = ranging::measure(gpio, clock)? {
            samples.push(cm);
        }
    }

    let failed = n as usize - samples.len();
    if failed > 0 {
        tracing::warn!(failed, requested = n, "echo timeouts during sampling round");
    }

    Ok(trim_to_max(samples))
}

/// Sort ascending, drop the lowest and highest 20 % (integer-truncated), and
/// take the maximum of the remainder. The far bias tolerates the sensor's
/// occasional short false echoes.
pub fn trim_to_max(mut samples: Vec<f64>) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    samples.sort_by(|a, b| a.total_cmp(b));

    let cut = (samples.len() as f64 * TRIM_FRACTION) as usize;
    let kept = &samples[cut..samples.len() - cut];
    kept.iter().copied().reduce(f64::max)
}
