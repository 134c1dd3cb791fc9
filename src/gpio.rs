use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GpioError {
    #[cfg(feature = "gpio-hardware")]
    #[error("sysfs gpio: {0}")]
    Sysfs(#[from] sysfs_gpio::Error),
    #[error("gpio backend unavailable: {0}")]
    Unavailable(&'static str),
}

/// The trigger/echo line pair of the ranging sensor. The ranging driver is
/// the only caller; it must leave the trigger deasserted between cycles.
pub trait TriggerEcho {
    /// Reset and (re)configure both lines, trigger deasserted.
    fn reset(&mut self) -> Result<(), GpioError>;
    fn set_trigger(&mut self, high: bool) -> Result<(), GpioError>;
    fn echo_is_high(&mut self) -> Result<bool, GpioError>;
    /// Block until the echo line falls or `timeout` elapses. Returns whether
    /// a falling edge was observed.
    fn wait_echo_low(&mut self, timeout: Duration) -> Result<bool, GpioError>;
    /// Quiesce the lines and hand them back to the system.
    fn release(&mut self) -> Result<(), GpioError>;
}

pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

pub struct WallClock;

impl Clock for WallClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Backend for builds without `gpio-hardware`; every line operation fails.
#[cfg(not(feature = "gpio-hardware"))]
pub struct UnavailableTriggerEcho;

#[cfg(not(feature = "gpio-hardware"))]
impl TriggerEcho for UnavailableTriggerEcho {
    fn reset(&mut self) -> Result<(), GpioError> {
        Err(GpioError::Unavailable(
            "built without the gpio-hardware feature",
        ))
    }

    fn set_trigger(&mut self, _high: bool) -> Result<(), GpioError> {
        Err(GpioError::Unavailable(
            "built without the gpio-hardware feature",
        ))
    }

    fn echo_is_high(&mut self) -> Result<bool, GpioError> {
        Err(GpioError::Unavailable(
            "built without the gpio-hardware feature",
        ))
    }

    fn wait_echo_low(&mut self, _timeout: Duration) -> Result<bool, GpioError> {
        Err(GpioError::Unavailable(
            "built without the gpio-hardware feature",
        ))
    }

    fn release(&mut self) -> Result<(), GpioError> {
        Ok(())
    }
}

#[cfg(feature = "gpio-hardware")]
pub use self::sysfs::SysfsTriggerEcho;

#[cfg(feature = "gpio-hardware")]
mod sysfs {
    use super::{GpioError, TriggerEcho};
    use std::time::Duration;
    use sysfs_gpio::{Direction, Edge, Pin};

    pub struct SysfsTriggerEcho {
        trigger: Pin,
        echo: Pin,
        exported: bool,
    }

    impl SysfsTriggerEcho {
        pub fn new(trigger_pin: u64, echo_pin: u64) -> Self {
            Self {
                trigger: Pin::new(trigger_pin),
                echo: Pin::new(echo_pin),
                exported: false,
            }
        }
    }

    impl TriggerEcho for SysfsTriggerEcho {
        fn reset(&mut self) -> Result<(), GpioError> {
            self.trigger.export()?;
            self.echo.export()?;
            self.exported = true;
            self.trigger.set_direction(Direction::Out)?;
            self.trigger.set_value(0)?;
            self.echo.set_direction(Direction::In)?;
            self.echo.set_edge(Edge::FallingEdge)?;
            Ok(())
        }

        fn set_trigger(&mut self, high: bool) -> Result<(), GpioError> {
            self.trigger.set_value(if high { 1 } else { 0 })?;
            Ok(())
        }

        fn echo_is_high(&mut self) -> Result<bool, GpioError> {
            Ok(self.echo.get_value()? == 1)
        }

        fn wait_echo_low(&mut self, timeout: Duration) -> Result<bool, GpioError> {
            let mut poller = self.echo.get_poller()?;
            Ok(poller.poll(timeout.as_millis() as isize)?.is_some())
        }

        fn release(&mut self) -> Result<(), GpioError> {
            if self.exported {
                self.trigger.set_value(0)?;
                self.trigger.unexport()?;
                self.echo.unexport()?;
                self.exported = false;
            }
            Ok(())
        }
    }
}
