mod config;
mod programs;

use crate::config::Config;
use dotenv::dotenv;
use log::{debug, info};
use pidev_gpio::GpioDriver;
use pidev_gpio::gpiod::GpiodDriver;
use pidev_gpio::raw::RawGpioDriver;
use std::env::{args, var};

const PROGRAMS: &[&str] = &[
    "ledblinking",
    "keypad",
    "lcdisplay",
    "lcdkeypad",
    "thermo",
];

fn parse_pins(pin_str: &str) -> eyre::Result<Vec<usize>> {
    pin_str
        .split([',', ' ', ';'])
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.parse())
        .collect::<Result<Vec<_>, _>>()
        .map_err(Into::into)
}

fn open_driver() -> eyre::Result<Box<dyn GpioDriver>> {
    let backend = var("PIDEV_GPIO_BACKEND").unwrap_or_else(|_| "gpiod".to_string());
    match backend.as_str() {
        "gpiod" => {
            let chip = var("PIDEV_GPIO_CHIP").unwrap_or_else(|_| "/dev/gpiochip0".to_string());
            debug!("Opening {} via the character device", chip);
            Ok(Box::new(GpiodDriver::open(chip)?))
        }
        "raw" => {
            debug!("Opening the BCM2835 register block via /dev/gpiomem");
            Ok(Box::new(RawGpioDriver::new_gpiomem()?))
        }
        other => Err(eyre::eyre!("unknown GPIO backend {:?}", other)),
    }
}

fn main() -> eyre::Result<()> {
    dotenv().ok();
    pretty_env_logger::init();

    let Some(program) = args().nth(1) else {
        eprintln!("Usage: pidev-demos <program>");
        eprintln!("Programs: {}", PROGRAMS.join(", "));
        std::process::exit(2);
    };

    debug!("Trying to load config...");
    let mut config = if let Some(config) = Config::try_load() {
        info!("Config loaded.");
        config
    } else {
        info!("Config not found. Using default");
        let config = Config::default();
        config.save()?;
        info!("Default config saved.");
        config
    };

    // Env vars win over the config file for the keyboard wiring.
    if let Ok(pins) = var("PIDEV_KEYPAD_PINS_ROWS") {
        config.keypad_input_pins = parse_pins(&pins)?;
    }
    if let Ok(pins) = var("PIDEV_KEYPAD_PINS_COLS") {
        config.keypad_output_pins = parse_pins(&pins)?;
    }

    match program.as_str() {
        "ledblinking" => {
            let gpio = open_driver()?;
            programs::led_blinking::run(&config, gpio.as_ref())
        }
        "keypad" => {
            let gpio = open_driver()?;
            programs::keypad::run(&config, gpio.as_ref())
        }
        "lcdisplay" => programs::lcd_display::run(&config),
        "lcdkeypad" => {
            let gpio = open_driver()?;
            programs::lcd_keypad::run(&config, gpio.as_ref())
        }
        "thermo" => programs::thermometer::run(),
        other => Err(eyre::eyre!(
            "unknown program {:?}; expected one of: {}",
            other,
            PROGRAMS.join(", ")
        )),
    }
}
