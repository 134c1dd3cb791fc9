//! One trigger/echo cycle against the sensor: pulse the trigger, time the
//! echo, convert time of flight to centimeters. Timeouts are reported as
//! `None` and never retried here.

use crate::gpio::{Clock, GpioError, TriggerEcho};
use std::time::Duration;

/// Width of the trigger pulse the sensor expects.
const TRIGGER_PULSE: Duration = Duration::from_micros(10);

/// Bound on each echo wait; anything beyond this is a missed echo.
pub(crate) const ECHO_TIMEOUT: Duration = Duration::from_millis(40);

const SPEED_OF_SOUND_CM_PER_S: f64 = 34300.0;

/// Run one measurement cycle. `Ok(None)` means the echo never rose, or rose
/// and never fell, within the timeout window.
pub fn measure<G: TriggerEcho, C: Clock>(
    gpio: &mut G,
    clock: &C,
) -> Result<Option<f64>, GpioError> {
    gpio.set_trigger(true)?;
    clock.sleep(TRIGGER_PULSE);
    gpio.set_trigger(false)?;

    let triggered_at = clock.now();
    let rise_at = loop {
        if gpio.echo_is_high()? {
            break clock.now();
        }
        if clock.now().duration_since(triggered_at) > ECHO_TIMEOUT {
            return Ok(None);
        }
    };

    if !gpio.wait_echo_low(ECHO_TIMEOUT)? {
        return Ok(None);
    }
    let elapsed = clock.now().duration_since(rise_at);

    Ok(Some(elapsed.as_secs_f64() * SPEED_OF_SOUND_CM_PER_S / 2.0))
}
