use log::info;
use pidev_gpio::CancelToken;
use pidev_gpio::dht::{Dht, IioDht, TemperatureUnit};
use std::thread::sleep;
use std::time::Duration;

pub fn run() -> eyre::Result<()> {
    let driver = IioDht::autodetect()?;
    let mut dht = Dht::new(Box::new(driver));

    info!("Sensor ready; stop with Ctrl+C.");
    let cancel = CancelToken::new();
    loop {
        let reading = dht.read(&cancel)?;
        let fahrenheit = TemperatureUnit::Fahrenheit.from_celsius(reading.temperature_celsius);
        info!(
            "{:.1} {} / {:.1} {}, humidity {:.1} %",
            reading.temperature_celsius,
            TemperatureUnit::Celsius.symbol(),
            fahrenheit,
            TemperatureUnit::Fahrenheit.symbol(),
            reading.humidity_percent,
        );
        sleep(Duration::from_secs(1));
    }
}
