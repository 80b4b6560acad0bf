//! I2C bus access behind a small trait so device drivers stay testable.
//!
//! The wire protocol itself is delegated to the kernel through the i2cdev
//! crate; nothing here bit-bangs I2C.

use crate::{GpioError, GpioResult};
use i2cdev::core::{I2CMessage, I2CTransfer};
use i2cdev::linux::{LinuxI2CBus, LinuxI2CError, LinuxI2CMessage};
use std::fmt::{Debug, Formatter};
use std::path::PathBuf;

/// A master end of an I2C bus, addressing a device per transfer.
pub trait I2cMaster: Debug {
    fn write(&mut self, address: u16, bytes: &[u8]) -> GpioResult<()>;
}

impl From<LinuxI2CError> for GpioError {
    fn from(err: LinuxI2CError) -> Self {
        GpioError::Other(err.to_string())
    }
}

/// I2C master over a Linux `/dev/i2c-*` character device.
pub struct LinuxI2c {
    bus: LinuxI2CBus,
    path: PathBuf,
}

impl LinuxI2c {
    /// Opens the I2C bus with the given index, e.g. 1 for `/dev/i2c-1`.
    pub fn open(bus_index: u8) -> GpioResult<Self> {
        let path = PathBuf::from(format!("/dev/i2c-{}", bus_index));
        let bus = LinuxI2CBus::new(&path)?;
        Ok(LinuxI2c { bus, path })
    }
}

impl Debug for LinuxI2c {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "LinuxI2c({:?})", self.path)
    }
}

impl I2cMaster for LinuxI2c {
    fn write(&mut self, address: u16, bytes: &[u8]) -> GpioResult<()> {
        let mut messages = [LinuxI2CMessage::write(bytes).with_address(address)];
        self.bus.transfer(&mut messages)?;
        Ok(())
    }
}
