use crate::i2c::I2cMaster;
use crate::lcd::LcdBus;
use crate::{GpioError, GpioResult};
use log::{debug, trace};
use std::fmt::Debug;
use std::thread::sleep;
use std::time::Duration;

/// PCF857x-family I/O expander variants used on LCD backpack boards.
///
/// The PCA variants speak the same protocol at higher bus speeds. The x575
/// parts are 16-bit and expect a second (unused) byte per transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pcf857xKind {
    Pcf8574,
    Pcf8575,
    Pca8574,
    Pca8575,
}

impl Pcf857xKind {
    fn is_16_bit(self) -> bool {
        matches!(self, Pcf857xKind::Pcf8575 | Pcf857xKind::Pca8575)
    }
}

/// Addresses the expanders are commonly strapped to, most common first.
const CANDIDATE_ADDRESSES: [u16; 9] = [
    0x3F, 0x3E, 0x3D, 0x3C, 0x3B, 0x3A, 0x39, 0x38, 0x27,
];

// Expander bit assignment on the usual backpack wiring.
const RS: u8 = 0x01;
const ENABLE: u8 = 0x04;
const BACKLIGHT: u8 = 0x08;

const ENABLE_PULSE: Duration = Duration::from_micros(1);
const SETTLE: Duration = Duration::from_micros(50);

/// An HD44780 bus over a PCF857x I2C backpack, in 4-bit mode.
pub struct LcdBackpack<'a> {
    i2c: Box<dyn I2cMaster + 'a>,
    kind: Pcf857xKind,
    address: u16,
    backlight: bool,
}

impl Debug for LcdBackpack<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "LcdBackpack({:?} @ {:#04x} on {:?})",
            self.kind, self.address, self.i2c
        )
    }
}

impl<'a> LcdBackpack<'a> {
    /// Creates a backpack at a known address.
    ///
    /// # Errors
    /// - `GpioError::Config` if nothing acknowledges at `address`.
    pub fn new(
        mut i2c: Box<dyn I2cMaster + 'a>,
        kind: Pcf857xKind,
        address: u16,
    ) -> GpioResult<Self> {
        if Self::try_address(i2c.as_mut(), kind, address).is_err() {
            return Err(GpioError::Config(format!(
                "no {:?} responds at address {:#04x}",
                kind, address
            )));
        }

        Ok(LcdBackpack {
            i2c,
            kind,
            address,
            backlight: false,
        })
    }

    /// Finds a backpack by trying the usual strap addresses in order.
    ///
    /// # Errors
    /// - `GpioError::Config` if no candidate address acknowledges.
    pub fn probe(mut i2c: Box<dyn I2cMaster + 'a>, kind: Pcf857xKind) -> GpioResult<Self> {
        for &address in &CANDIDATE_ADDRESSES {
            trace!("Probing for {:?} at {:#04x}", kind, address);
            if Self::try_address(i2c.as_mut(), kind, address).is_ok() {
                debug!("Found {:?} at {:#04x}", kind, address);
                return Ok(LcdBackpack {
                    i2c,
                    kind,
                    address,
                    backlight: false,
                });
            }
        }

        Err(GpioError::Config(format!(
            "no {:?} found on any known address",
            kind
        )))
    }

    pub fn address(&self) -> u16 {
        self.address
    }

    fn try_address(i2c: &mut dyn I2cMaster, kind: Pcf857xKind, address: u16) -> GpioResult<()> {
        if kind.is_16_bit() {
            i2c.write(address, &[0, 0])
        } else {
            i2c.write(address, &[0])
        }
    }

    /// Writes one expander frame, padding to two bytes for 16-bit parts.
    fn push(&mut self, frame: u8) -> GpioResult<()> {
        if self.kind.is_16_bit() {
            self.i2c.write(self.address, &[frame, 0])
        } else {
            self.i2c.write(self.address, &[frame])
        }
    }

    /// Clocks the high four bits of `frame` into the controller.
    fn write_nibble(&mut self, mut frame: u8) -> GpioResult<()> {
        if self.backlight {
            frame |= BACKLIGHT;
        }
        self.push(frame | ENABLE)?;
        sleep(ENABLE_PULSE);
        self.push(frame)?;
        sleep(SETTLE);
        Ok(())
    }
}

impl LcdBus for LcdBackpack<'_> {
    fn write_raw(&mut self, byte: u8, rs: bool) -> GpioResult<()> {
        let flags = if rs { RS } else { 0 };
        self.write_nibble((byte & 0xF0) | flags)?;
        self.write_nibble((byte << 4) | flags)?;
        Ok(())
    }

    fn set_backlight(&mut self, on: bool) -> GpioResult<()> {
        self.backlight = on;
        let frame = if on { BACKLIGHT } else { 0 };
        self.push(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    type WriteLog = Rc<RefCell<Vec<(u16, Vec<u8>)>>>;

    #[derive(Debug, Default)]
    struct RecordingI2c {
        log: WriteLog,
        /// Addresses that acknowledge writes; `None` acknowledges everything.
        present: Option<Vec<u16>>,
    }

    impl I2cMaster for RecordingI2c {
        fn write(&mut self, address: u16, bytes: &[u8]) -> GpioResult<()> {
            if let Some(present) = &self.present {
                if !present.contains(&address) {
                    return Err(GpioError::Io(std::io::ErrorKind::Other));
                }
            }
            self.log.borrow_mut().push((address, bytes.to_vec()));
            Ok(())
        }
    }

    #[test]
    fn write_raw_sends_nibbles_with_enable_pulses() {
        let i2c = RecordingI2c::default();
        let log = i2c.log.clone();
        let mut backpack =
            LcdBackpack::new(Box::new(i2c), Pcf857xKind::Pcf8574, 0x27).unwrap();
        log.borrow_mut().clear();

        backpack.write_raw(0xA5, true).unwrap();

        let frames: Vec<u8> = log.borrow().iter().map(|(_, b)| b[0]).collect();
        // High nibble 0xA with RS set, pulsed; then low nibble 0x5 likewise.
        assert_eq!(
            frames,
            vec![
                0xA0 | RS | ENABLE,
                0xA0 | RS,
                0x50 | RS | ENABLE,
                0x50 | RS,
            ]
        );
    }

    #[test]
    fn backlight_bit_rides_along_once_enabled() {
        let i2c = RecordingI2c::default();
        let log = i2c.log.clone();
        let mut backpack =
            LcdBackpack::new(Box::new(i2c), Pcf857xKind::Pcf8574, 0x27).unwrap();

        backpack.set_backlight(true).unwrap();
        log.borrow_mut().clear();
        backpack.write_raw(0x00, false).unwrap();

        assert!(log.borrow().iter().all(|(_, b)| b[0] & BACKLIGHT != 0));
    }

    #[test]
    fn sixteen_bit_parts_get_a_padding_byte() {
        let i2c = RecordingI2c::default();
        let log = i2c.log.clone();
        let mut backpack =
            LcdBackpack::new(Box::new(i2c), Pcf857xKind::Pcf8575, 0x3F).unwrap();
        log.borrow_mut().clear();

        backpack.write_raw(0xF0, false).unwrap();

        assert!(log.borrow().iter().all(|(_, b)| b.len() == 2 && b[1] == 0));
    }

    #[test]
    fn probe_picks_the_first_responding_address() {
        let i2c = RecordingI2c {
            present: Some(vec![0x3C, 0x27]),
            ..Default::default()
        };

        let backpack = LcdBackpack::probe(Box::new(i2c), Pcf857xKind::Pcf8574).unwrap();

        assert_eq!(backpack.address(), 0x3C);
    }

    #[test]
    fn probe_fails_when_nothing_responds() {
        let i2c = RecordingI2c {
            present: Some(vec![]),
            ..Default::default()
        };

        let result = LcdBackpack::probe(Box::new(i2c), Pcf857xKind::Pcf8574);

        assert!(matches!(result, Err(GpioError::Config(_))));
    }

    #[test]
    fn new_rejects_a_dead_address() {
        let i2c = RecordingI2c {
            present: Some(vec![0x3F]),
            ..Default::default()
        };

        let result = LcdBackpack::new(Box::new(i2c), Pcf857xKind::Pcf8574, 0x27);

        assert!(matches!(result, Err(GpioError::Config(_))));
    }
}
