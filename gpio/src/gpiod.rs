//! GpiodDriver implementation for managing GPIO pins through the character-device
//! interface via the gpiod library.

use crate::{
    GpioActiveLevel, GpioBias, GpioDriveMode, GpioDriver, GpioError, GpioInput, GpioOutput,
    GpioResult, PinOptions,
};
use bitvec::vec::BitVec;
use std::fmt::{Debug, Formatter};
use std::path::Path;
use std::sync::atomic::AtomicU8;

/// GPIO driver that uses the gpiod library to manage GPIO pins.
pub struct GpiodDriver {
    chip: gpiod::Chip,
    used_pins: BitVec<AtomicU8>,
}

impl GpiodDriver {
    pub fn new(chip: gpiod::Chip) -> Self {
        let n = chip.num_lines() as usize;
        let bits = BitVec::repeat(false, n);
        Self {
            chip,
            used_pins: bits,
        }
    }

    /// Opens a GPIO chip by path, e.g. `/dev/gpiochip0` or just `gpiochip0`.
    pub fn open(path: impl AsRef<Path>) -> GpioResult<Self> {
        let chip = gpiod::Chip::new(path.as_ref())?;
        Ok(Self::new(chip))
    }

    fn claim(&self, index: usize) -> GpioResult<()> {
        if index >= self.count()? {
            return Err(GpioError::InvalidArgument);
        }

        if self.used_pins[index] {
            return Err(GpioError::AlreadyInUse);
        }

        self.used_pins.set_aliased(index, true);
        Ok(())
    }

    fn release(&self, index: usize) {
        self.used_pins.set_aliased(index, false);
    }
}

impl Debug for GpiodDriver {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "GpiodDriver({})", self.chip.name())
    }
}

impl From<GpioActiveLevel> for gpiod::Active {
    fn from(level: GpioActiveLevel) -> Self {
        match level {
            GpioActiveLevel::High => gpiod::Active::High,
            GpioActiveLevel::Low => gpiod::Active::Low,
        }
    }
}

impl From<GpioBias> for gpiod::Bias {
    fn from(bias: GpioBias) -> Self {
        match bias {
            GpioBias::None => gpiod::Bias::Disable,
            GpioBias::PullUp => gpiod::Bias::PullUp,
            GpioBias::PullDown => gpiod::Bias::PullDown,
        }
    }
}

impl GpioDriver for GpiodDriver {
    fn count(&self) -> GpioResult<usize> {
        Ok(self.chip.num_lines() as usize)
    }

    fn open_input(&self, index: usize, options: PinOptions) -> GpioResult<Box<dyn GpioInput + '_>> {
        self.claim(index)?;

        // The claim must not outlive a refused request (EBUSY, permissions).
        let line = self
            .chip
            .request_lines(
                gpiod::Options::input([index as u32])
                    .consumer(env!("CARGO_PKG_NAME"))
                    .active(options.active_level.into())
                    .bias(options.bias.into()),
            )
            .inspect_err(|_| self.release(index))?;

        Ok(Box::new(GpiodInput {
            driver: self,
            pin_index: index,
            line,
        }))
    }

    fn open_output(
        &self,
        index: usize,
        options: PinOptions,
    ) -> GpioResult<Box<dyn GpioOutput + '_>> {
        // Drive modes other than push-pull would need emulation here; the raw
        // driver supports them if needed.
        if options.drive_mode != GpioDriveMode::PushPull {
            return Err(GpioError::NotSupported);
        }

        self.claim(index)?;

        let line = self
            .chip
            .request_lines(
                gpiod::Options::output([index as u32])
                    .consumer(env!("CARGO_PKG_NAME"))
                    .active(options.active_level.into())
                    .bias(options.bias.into()),
            )
            .inspect_err(|_| self.release(index))?;

        Ok(Box::new(GpiodOutput {
            driver: self,
            pin_index: index,
            line,
        }))
    }
}

struct GpiodInput<'a> {
    driver: &'a GpiodDriver,
    pin_index: usize,
    line: gpiod::Lines<gpiod::Input>,
}

impl Debug for GpiodInput<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}[{}][input]", self.driver, self.pin_index)
    }
}

impl GpioInput for GpiodInput<'_> {
    fn read(&self) -> GpioResult<bool> {
        let values = self.line.get_values([false])?;
        Ok(values[0])
    }
}

impl Drop for GpiodInput<'_> {
    fn drop(&mut self) {
        self.driver.release(self.pin_index);
    }
}

struct GpiodOutput<'a> {
    driver: &'a GpiodDriver,
    pin_index: usize,
    line: gpiod::Lines<gpiod::Output>,
}

impl Debug for GpiodOutput<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}[{}][output]", self.driver, self.pin_index)
    }
}

impl GpioOutput for GpiodOutput<'_> {
    fn write(&self, value: bool) -> GpioResult<()> {
        self.line.set_values([value])?;
        Ok(())
    }
}

impl Drop for GpiodOutput<'_> {
    fn drop(&mut self) {
        self.driver.release(self.pin_index);
    }
}
