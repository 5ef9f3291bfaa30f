//! Single digital output pin with a tracked logical level.
//!
//! Wraps any `embedded_hal::digital::OutputPin`: an ESP-IDF `PinDriver`
//! on the device, a mock pin on the host. The wrapper is the only writer
//! of its pin, so [`state`](GpioOutput::state) always reflects the last
//! level successfully driven.

use embedded_hal::digital::OutputPin;
pub use embedded_hal::digital::PinState;
use log::{debug, warn};

use crate::app::ports::IndicatorPort;
use crate::error::ActuatorError;

pub struct GpioOutput<P: OutputPin> {
    pin: P,
    state: PinState,
    label: &'static str,
}

impl<P: OutputPin> GpioOutput<P> {
    /// Take ownership of `pin` and drive it low.
    pub fn new(pin: P, label: &'static str) -> Result<Self, ActuatorError> {
        let mut out = Self {
            pin,
            state: PinState::Low,
            label,
        };
        out.write(PinState::Low)?;
        Ok(out)
    }

    /// Drive the pin to `level`.
    ///
    /// The write is issued unconditionally so a pin disturbed outside this
    /// wrapper is corrected; repeating the current level has no further
    /// effect.
    pub fn set(&mut self, level: PinState) -> Result<(), ActuatorError> {
        let previous = self.state;
        self.write(level)?;
        if previous != level {
            debug!("GPIO[{}]: {:?} -> {:?}", self.label, previous, level);
        }
        Ok(())
    }

    /// Last level successfully driven.
    pub fn state(&self) -> PinState {
        self.state
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Release the underlying pin driver.
    pub fn into_inner(self) -> P {
        self.pin
    }

    fn write(&mut self, level: PinState) -> Result<(), ActuatorError> {
        self.pin.set_state(level).map_err(|e| {
            warn!("GPIO[{}]: write {:?} failed: {:?}", self.label, level, e);
            ActuatorError::GpioWriteFailed
        })?;
        self.state = level;
        Ok(())
    }
}

impl<P: OutputPin> IndicatorPort for GpioOutput<P> {
    fn set_indicator(&mut self, on: bool) {
        // Indicator faults are cosmetic; the failure is already logged by `write`.
        let _ = self.set(PinState::from(on));
    }
}
