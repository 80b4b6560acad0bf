use crate::{GpioDriver, GpioError, GpioOutput, GpioResult, PinOptions};
use log::debug;
use std::fmt::{Debug, Formatter};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LedColor {
    Red,
    Green,
    Blue,
    Yellow,
    White,
    Orange,
}

/// Description of a single LED on a panel.
#[derive(Copy, Clone, Debug)]
pub struct Led {
    pub pin: usize,
    pub color: LedColor,
    pub enabled: bool,
}

impl Led {
    pub fn new(pin: usize, color: LedColor, enabled: bool) -> Self {
        Led {
            pin,
            color,
            enabled,
        }
    }
}

struct PanelSlot<'a> {
    led: Led,
    output: Box<dyn GpioOutput + 'a>,
}

/// A panel of independently addressable LEDs.
///
/// Every LED pin is opened as an output on construction and driven to its
/// initial state; the pins are released when the panel is dropped.
pub struct LedPanel<'a> {
    slots: Vec<PanelSlot<'a>>,
}

impl Debug for LedPanel<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "LedPanel({} leds)", self.slots.len())
    }
}

impl<'a> LedPanel<'a> {
    pub fn new(driver: &'a dyn GpioDriver, leds: Vec<Led>) -> GpioResult<Self> {
        let mut slots = Vec::with_capacity(leds.len());

        for led in leds {
            let output = driver.open_output(led.pin, PinOptions::default())?;
            output.write(led.enabled)?;
            slots.push(PanelSlot { led, output });
        }

        debug!("LED panel initialized with {} leds", slots.len());

        Ok(LedPanel { slots })
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Gets whether the LED on `pin` is currently lit, if it exists.
    pub fn is_lit(&self, pin: usize) -> Option<bool> {
        self.slots
            .iter()
            .find(|slot| slot.led.pin == pin)
            .map(|slot| slot.led.enabled)
    }

    /// Lights the LED on `pin`.
    ///
    /// # Errors
    /// - `GpioError::InvalidArgument` if no LED is defined on that pin.
    pub fn set(&mut self, pin: usize) -> GpioResult<()> {
        self.apply_pin(pin, |_| true)
    }

    /// Turns off the LED on `pin`.
    pub fn reset(&mut self, pin: usize) -> GpioResult<()> {
        self.apply_pin(pin, |_| false)
    }

    /// Toggles the LED on `pin`.
    pub fn toggle(&mut self, pin: usize) -> GpioResult<()> {
        self.apply_pin(pin, |enabled| !enabled)
    }

    /// Lights every LED of the given color.
    ///
    /// # Errors
    /// - `GpioError::InvalidArgument` if no LED of that color is defined.
    pub fn set_color(&mut self, color: LedColor) -> GpioResult<()> {
        self.apply_color(color, |_| true)
    }

    pub fn reset_color(&mut self, color: LedColor) -> GpioResult<()> {
        self.apply_color(color, |_| false)
    }

    pub fn toggle_color(&mut self, color: LedColor) -> GpioResult<()> {
        self.apply_color(color, |enabled| !enabled)
    }

    pub fn set_all(&mut self) -> GpioResult<()> {
        self.apply_all(|_| true)
    }

    pub fn reset_all(&mut self) -> GpioResult<()> {
        self.apply_all(|_| false)
    }

    pub fn toggle_all(&mut self) -> GpioResult<()> {
        self.apply_all(|enabled| !enabled)
    }

    fn apply_pin(&mut self, pin: usize, next: impl Fn(bool) -> bool) -> GpioResult<()> {
        let slot = self
            .slots
            .iter_mut()
            .find(|slot| slot.led.pin == pin)
            .ok_or(GpioError::InvalidArgument)?;
        Self::drive(slot, &next)
    }

    fn apply_color(&mut self, color: LedColor, next: impl Fn(bool) -> bool) -> GpioResult<()> {
        let mut found = false;

        for slot in self.slots.iter_mut().filter(|slot| slot.led.color == color) {
            Self::drive(slot, &next)?;
            found = true;
        }

        if found {
            Ok(())
        } else {
            Err(GpioError::InvalidArgument)
        }
    }

    fn apply_all(&mut self, next: impl Fn(bool) -> bool) -> GpioResult<()> {
        for slot in &mut self.slots {
            Self::drive(slot, &next)?;
        }
        Ok(())
    }

    fn drive(slot: &mut PanelSlot<'_>, next: &impl Fn(bool) -> bool) -> GpioResult<()> {
        let value = next(slot.led.enabled);
        slot.output.write(value)?;
        slot.led.enabled = value;
        Ok(())
    }
}
