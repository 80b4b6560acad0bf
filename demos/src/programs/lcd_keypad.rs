use crate::config::Config;
use log::info;
use pidev_gpio::i2c::LinuxI2c;
use pidev_gpio::keypad::{GpioEdgeSource, KeyMap, MatrixKeyboard};
use pidev_gpio::lcd::{CharLcd, LcdBackpack, Pcf857xKind};
use pidev_gpio::{CancelToken, GpioDriver};

/// Echoes keyboard input onto the display; `*` clears it.
pub fn run(config: &Config, gpio: &dyn GpioDriver) -> eyre::Result<()> {
    let i2c = LinuxI2c::open(config.i2c_bus)?;
    let backpack = LcdBackpack::probe(Box::new(i2c), Pcf857xKind::Pcf8574)?;
    let mut lcd = CharLcd::new(Box::new(backpack), config.lcd_rows, config.lcd_cols)?;
    lcd.init()?;

    let source = GpioEdgeSource::new(
        gpio,
        &config.keypad_input_pins,
        &config.keypad_output_pins,
    )?;
    let key_map = KeyMap::new(config.keypad_keys.clone())?;
    let mut keyboard = MatrixKeyboard::new(source, key_map)?;

    let capacity = lcd.rows() * lcd.cols();
    let mut buffer = String::new();
    lcd.write_text("Type something:")?;

    info!("Ready; type on the keyboard, stop with Ctrl+C.");
    let cancel = CancelToken::new();
    loop {
        let key = keyboard.read_key(&cancel)?;
        info!("Key pressed: {}", key);

        if key == '*' {
            buffer.clear();
        } else {
            buffer.push(key);
            // Keep only what the display can show.
            if buffer.chars().count() > capacity {
                buffer = buffer.chars().skip(buffer.chars().count() - capacity).collect();
            }
        }

        lcd.write_text(&buffer)?;
    }
}
