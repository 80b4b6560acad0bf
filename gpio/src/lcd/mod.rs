mod backpack;

use crate::{GpioError, GpioResult};
pub use backpack::*;
use log::warn;
use std::fmt::Debug;
use std::thread::sleep;
use std::time::Duration;

/// A byte-wide write path to an HD44780-class controller.
///
/// Implementations deal with the physical wiring; in 4-bit mode that means
/// splitting the byte into two nibble writes with their enable pulses.
pub trait LcdBus: Debug {
    /// Writes one byte to the controller; `rs` selects the data register.
    fn write_raw(&mut self, byte: u8, rs: bool) -> GpioResult<()>;

    /// Switches the backlight, where the wiring has one. No-op otherwise.
    fn set_backlight(&mut self, _on: bool) -> GpioResult<()> {
        Ok(())
    }
}

/// DDRAM start address of each display row.
const ROW_OFFSETS: [u8; 4] = [0x00, 0x40, 0x14, 0x54];

/// Clear and return-home need far longer than ordinary commands.
const SLOW_COMMAND_DELAY: Duration = Duration::from_millis(2);

/// Wait after the first sync write; the datasheet asks for 4.1 ms after
/// power-on, and the busy flag cannot be read over a write-only bus.
const POWER_ON_DELAY: Duration = Duration::from_millis(5);

/// A character LCD of up to 4 rows by 40 columns.
pub struct CharLcd<'a> {
    bus: Box<dyn LcdBus + 'a>,
    rows: usize,
    cols: usize,
}

impl Debug for CharLcd<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CharLcd({}x{}, {:?})", self.rows, self.cols, self.bus)
    }
}

impl<'a> CharLcd<'a> {
    /// Creates a display of the given dimensions over `bus`.
    ///
    /// # Errors
    /// - `GpioError::Config` if the dimensions fall outside what the
    ///   controller can address.
    pub fn new(bus: Box<dyn LcdBus + 'a>, rows: usize, cols: usize) -> GpioResult<Self> {
        if rows == 0 || rows > ROW_OFFSETS.len() || cols == 0 || cols > 40 {
            return Err(GpioError::Config(format!(
                "unsupported display dimensions {}x{}",
                rows, cols
            )));
        }

        Ok(CharLcd { bus, rows, cols })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    fn command(&mut self, byte: u8) -> GpioResult<()> {
        self.bus.write_raw(byte, false)
    }

    fn data(&mut self, byte: u8) -> GpioResult<()> {
        self.bus.write_raw(byte, true)
    }

    /// Brings the controller into a known 4-bit state and switches it on.
    pub fn init(&mut self) -> GpioResult<()> {
        // Synchronization magic: the controller may be in 8-bit mode or in the
        // middle of a nibble; these two bytes land it in 4-bit mode either way.
        self.command(0b0011_0011)?;
        sleep(POWER_ON_DELAY);
        self.command(0b0011_0010)?;
        sleep(Duration::from_micros(100));

        let mut function = 0b0010_0000;
        if self.rows > 1 {
            function |= 0b0000_1000; // Two-line addressing
        }
        self.command(function)?;

        self.display_control(true, false, false)?;
        self.clear()?;
        self.command(0b0000_0110)?; // Entry mode: cursor right, no shift
        self.bus.set_backlight(true)?;

        Ok(())
    }

    /// Sets the display on/off, cursor on/off, and blinking on/off.
    pub fn display_control(
        &mut self,
        display_on: bool,
        cursor_on: bool,
        blink_on: bool,
    ) -> GpioResult<()> {
        let mut command = 0b0000_1000;
        if display_on {
            command |= 0b0000_0100;
        }
        if cursor_on {
            command |= 0b0000_0010;
        }
        if blink_on {
            command |= 0b0000_0001;
        }
        self.command(command)
    }

    /// Clears the display and sets the cursor to the home position.
    pub fn clear(&mut self) -> GpioResult<()> {
        self.command(0b0000_0001)?;
        sleep(SLOW_COMMAND_DELAY);
        Ok(())
    }

    /// Sets the cursor to the home position.
    pub fn return_home(&mut self) -> GpioResult<()> {
        self.command(0b0000_0010)?;
        sleep(SLOW_COMMAND_DELAY);
        Ok(())
    }

    pub fn set_backlight(&mut self, on: bool) -> GpioResult<()> {
        self.bus.set_backlight(on)
    }

    pub fn set_cursor(&mut self, row: usize, col: usize) -> GpioResult<()> {
        if row >= self.rows || col >= self.cols {
            return Err(GpioError::InvalidArgument);
        }
        self.command(0b1000_0000 | (ROW_OFFSETS[row] + col as u8))
    }

    /// Prints a string at the current cursor position.
    ///
    /// Non-ASCII characters cannot be mapped to the controller's font and are
    /// printed as `?`.
    pub fn print(&mut self, s: &str) -> GpioResult<()> {
        for c in s.chars() {
            if c.is_ascii() {
                self.data(c as u8)?;
            } else {
                warn!("Non-ASCII character: {}", c);
                self.data(b'?')?;
            }
        }
        Ok(())
    }

    /// Clears the display and lays `text` out over its rows.
    ///
    /// Text containing newlines is split on them, one piece per row. A single
    /// over-long line is chunked into row-sized slices instead. Anything past
    /// the last row, or past the last column of a row, is silently dropped.
    pub fn write_text(&mut self, text: &str) -> GpioResult<()> {
        self.clear()?;

        let lines: Vec<String> = if text.contains('\n') {
            text.lines().map(str::to_owned).collect()
        } else if text.chars().count() <= self.cols {
            vec![text.to_owned()]
        } else {
            let chars: Vec<char> = text.chars().collect();
            chars
                .chunks(self.cols)
                .take(self.rows)
                .map(|chunk| chunk.iter().collect())
                .collect()
        };

        for (row, line) in lines.iter().enumerate().take(self.rows) {
            self.set_cursor(row, 0)?;
            let visible: String = line.chars().take(self.cols).collect();
            self.print(&visible)?;
        }

        Ok(())
    }
}
