use crate::config::Config;
use log::info;
use pidev_gpio::i2c::LinuxI2c;
use pidev_gpio::lcd::{CharLcd, LcdBackpack, Pcf857xKind};
use std::thread::sleep;
use std::time::Duration;

const TEXTS: &[&str] = &[
    "Hello, world!",
    "First line\nSecond line",
    "A line too long to fit wraps over",
];

pub fn run(config: &Config) -> eyre::Result<()> {
    let i2c = LinuxI2c::open(config.i2c_bus)?;
    let backpack = LcdBackpack::probe(Box::new(i2c), Pcf857xKind::Pcf8574)?;
    info!("Backpack found at {:#04x}.", backpack.address());

    let mut lcd = CharLcd::new(Box::new(backpack), config.lcd_rows, config.lcd_cols)?;
    lcd.init()?;

    info!("Display ready; stop with Ctrl+C.");
    loop {
        for text in TEXTS {
            lcd.write_text(text)?;
            sleep(Duration::from_secs(2));
        }
    }
}
