use crate::config::Config;
use log::info;
use pidev_gpio::keypad::{GpioEdgeSource, KeyMap, MatrixKeyboard};
use pidev_gpio::{CancelToken, GpioDriver};

pub fn run(config: &Config, gpio: &dyn GpioDriver) -> eyre::Result<()> {
    let source = GpioEdgeSource::new(
        gpio,
        &config.keypad_input_pins,
        &config.keypad_output_pins,
    )?;
    let key_map = KeyMap::new(config.keypad_keys.clone())?;
    let mut keyboard = MatrixKeyboard::new(source, key_map)?;

    info!("Keyboard ready; press keys, stop with Ctrl+C.");
    let cancel = CancelToken::new();
    loop {
        let key = keyboard.read_key(&cancel)?;
        info!("Key pressed: {}", key);
    }
}
