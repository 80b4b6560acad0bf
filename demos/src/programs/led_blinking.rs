use crate::config::Config;
use log::info;
use pidev_gpio::GpioDriver;
use pidev_gpio::led::{Led, LedColor, LedPanel};
use std::thread::sleep;
use std::time::Duration;

fn parse_color(name: &str) -> eyre::Result<LedColor> {
    match name.to_ascii_lowercase().as_str() {
        "red" => Ok(LedColor::Red),
        "green" => Ok(LedColor::Green),
        "blue" => Ok(LedColor::Blue),
        "yellow" => Ok(LedColor::Yellow),
        "white" => Ok(LedColor::White),
        "orange" => Ok(LedColor::Orange),
        other => Err(eyre::eyre!("unknown LED color {:?}", other)),
    }
}

pub fn run(config: &Config, gpio: &dyn GpioDriver) -> eyre::Result<()> {
    let mut colors = Vec::new();
    let mut leds = Vec::new();
    for led in &config.leds {
        let color = parse_color(&led.color)?;
        if !colors.contains(&color) {
            colors.push(color);
        }
        leds.push(Led::new(led.pin, color, false));
    }

    let mut panel = LedPanel::new(gpio, leds)?;
    info!("Panel of {} LEDs ready.", panel.len());

    panel.set_all()?;
    sleep(Duration::from_millis(300));
    panel.reset_all()?;
    sleep(Duration::from_millis(300));

    for &color in &colors {
        info!("Flashing {:?}", color);
        panel.set_color(color)?;
        sleep(Duration::from_millis(300));
        panel.reset_color(color)?;
    }

    info!("Toggling everything; stop with Ctrl+C.");
    loop {
        panel.toggle_all()?;
        sleep(Duration::from_millis(100));
    }
}
