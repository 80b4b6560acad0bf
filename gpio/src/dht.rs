use crate::{CancelToken, GpioError, GpioResult};
use log::{debug, trace};
use std::fmt::Debug;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::thread::sleep;
use std::time::{Duration, Instant};

/// One successful measurement from a humidity/temperature sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DhtReading {
    pub temperature_celsius: f64,
    pub humidity_percent: f64,
}

/// Temperature scales a Celsius reading can be converted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemperatureUnit {
    Celsius,
    Delisle,
    Fahrenheit,
    Newton,
    Rankine,
    Reaumur,
    Roemer,
    Kelvin,
}

impl TemperatureUnit {
    pub fn from_celsius(self, celsius: f64) -> f64 {
        match self {
            TemperatureUnit::Celsius => celsius,
            TemperatureUnit::Delisle => (100.0 - celsius) * 3.0 / 2.0,
            TemperatureUnit::Fahrenheit => celsius * 9.0 / 5.0 + 32.0,
            TemperatureUnit::Newton => celsius * 33.0 / 100.0,
            TemperatureUnit::Rankine => (celsius + 273.15) * 9.0 / 5.0,
            TemperatureUnit::Reaumur => celsius * 4.0 / 5.0,
            TemperatureUnit::Roemer => celsius * 21.0 / 40.0 + 7.5,
            TemperatureUnit::Kelvin => celsius + 273.15,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            TemperatureUnit::Celsius => "°C",
            TemperatureUnit::Delisle => "°De",
            TemperatureUnit::Fahrenheit => "°F",
            TemperatureUnit::Newton => "°N",
            TemperatureUnit::Rankine => "°R",
            TemperatureUnit::Reaumur => "°Ré",
            TemperatureUnit::Roemer => "°Rø",
            TemperatureUnit::Kelvin => "K",
        }
    }
}

/// A single-attempt reader for a DHT-class sensor.
///
/// These sensors routinely fail a checksum or refuse to answer when polled
/// too soon; an attempt that fails that way returns `Ok(None)` and the caller
/// retries. `Err` is reserved for conditions retrying cannot fix.
pub trait DhtDriver: Debug {
    fn try_read(&mut self) -> GpioResult<Option<DhtReading>>;
}

/// A DHT sensor exposed through the kernel IIO subsystem.
///
/// The `dht11` device-tree overlay handles the single-wire protocol and its
/// timing in the kernel; we only read the resulting sysfs attributes.
#[derive(Debug)]
pub struct IioDht {
    base_path: PathBuf,
}

impl IioDht {
    const IIO_DEVICES: &'static str = "/sys/bus/iio/devices";

    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        IioDht {
            base_path: base_path.into(),
        }
    }

    /// Scans the IIO bus for a device whose name mentions `dht`.
    ///
    /// # Errors
    /// - `GpioError::Config` if no such device is registered.
    pub fn autodetect() -> GpioResult<Self> {
        let entries = fs::read_dir(Self::IIO_DEVICES).map_err(|e| {
            GpioError::Config(format!("cannot scan {}: {}", Self::IIO_DEVICES, e))
        })?;

        for entry in entries {
            let entry = entry?;
            let name_path = entry.path().join("name");
            let Ok(name) = fs::read_to_string(&name_path) else {
                continue;
            };
            if name.trim().contains("dht") {
                debug!("Found DHT sensor at {:?}", entry.path());
                return Ok(IioDht::new(entry.path()));
            }
        }

        Err(GpioError::Config(
            "no DHT device registered on the IIO bus; is the dht11 overlay loaded?".to_owned(),
        ))
    }

    /// Reads a sysfs attribute holding a value in thousandths.
    fn read_milli(&self, attribute: &str) -> GpioResult<Option<f64>> {
        let path = self.base_path.join(attribute);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(e.into()),
            // The kernel driver reports a failed sensor exchange as EIO.
            Err(e) => {
                trace!("Reading {:?} failed: {}", path, e);
                return Ok(None);
            }
        };

        match raw.trim().parse::<f64>() {
            Ok(milli) => Ok(Some(milli / 1000.0)),
            Err(e) => {
                trace!("Unparsable value in {:?}: {}", path, e);
                Ok(None)
            }
        }
    }
}

impl DhtDriver for IioDht {
    fn try_read(&mut self) -> GpioResult<Option<DhtReading>> {
        let Some(temperature_celsius) = self.read_milli("in_temp_input")? else {
            return Ok(None);
        };
        let Some(humidity_percent) = self.read_milli("in_humidityrelative_input")? else {
            return Ok(None);
        };

        Ok(Some(DhtReading {
            temperature_celsius,
            humidity_percent,
        }))
    }
}

/// Interval between attempts; the sensor cannot answer faster anyway.
const RETRY_INTERVAL: Duration = Duration::from_millis(250);

/// Granularity of cancellation checks while waiting between attempts.
const CANCEL_SLICE: Duration = Duration::from_millis(50);

/// A humidity/temperature sensor that retries until it gets a reading.
pub struct Dht<'a> {
    driver: Box<dyn DhtDriver + 'a>,
}

impl Debug for Dht<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Dht({:?})", self.driver)
    }
}

impl<'a> Dht<'a> {
    pub fn new(driver: Box<dyn DhtDriver + 'a>) -> Self {
        Dht { driver }
    }

    /// Reads the sensor, retrying failed attempts until cancelled.
    ///
    /// # Errors
    /// - `GpioError::Cancelled` if `cancel` fires before a reading lands.
    pub fn read(&mut self, cancel: &CancelToken) -> GpioResult<DhtReading> {
        loop {
            cancel.checkpoint()?;
            if let Some(reading) = self.driver.try_read()? {
                return Ok(reading);
            }

            let deadline = Instant::now() + RETRY_INTERVAL;
            while Instant::now() < deadline {
                cancel.checkpoint()?;
                sleep(CANCEL_SLICE.min(deadline.saturating_duration_since(Instant::now())));
            }
        }
    }

    pub fn read_temperature(
        &mut self,
        unit: TemperatureUnit,
        cancel: &CancelToken,
    ) -> GpioResult<f64> {
        Ok(unit.from_celsius(self.read(cancel)?.temperature_celsius))
    }

    pub fn read_humidity(&mut self, cancel: &CancelToken) -> GpioResult<f64> {
        Ok(self.read(cancel)?.humidity_percent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct ScriptedDriver {
        attempts: Vec<Option<DhtReading>>,
    }

    impl DhtDriver for ScriptedDriver {
        fn try_read(&mut self) -> GpioResult<Option<DhtReading>> {
            if self.attempts.is_empty() {
                panic!("driver polled more often than scripted");
            }
            Ok(self.attempts.remove(0))
        }
    }

    const READING: DhtReading = DhtReading {
        temperature_celsius: 23.0,
        humidity_percent: 45.0,
    };

    #[test]
    fn freezing_point_in_every_unit() {
        assert_eq!(TemperatureUnit::Celsius.from_celsius(0.0), 0.0);
        assert_eq!(TemperatureUnit::Delisle.from_celsius(0.0), 150.0);
        assert_eq!(TemperatureUnit::Fahrenheit.from_celsius(0.0), 32.0);
        assert_eq!(TemperatureUnit::Newton.from_celsius(0.0), 0.0);
        assert_eq!(TemperatureUnit::Rankine.from_celsius(0.0), 491.67);
        assert_eq!(TemperatureUnit::Reaumur.from_celsius(0.0), 0.0);
        assert_eq!(TemperatureUnit::Roemer.from_celsius(0.0), 7.5);
        assert_eq!(TemperatureUnit::Kelvin.from_celsius(0.0), 273.15);
    }

    #[test]
    fn boiling_point_in_every_unit() {
        assert_eq!(TemperatureUnit::Delisle.from_celsius(100.0), 0.0);
        assert_eq!(TemperatureUnit::Fahrenheit.from_celsius(100.0), 212.0);
        assert_eq!(TemperatureUnit::Newton.from_celsius(100.0), 33.0);
        assert_eq!(TemperatureUnit::Reaumur.from_celsius(100.0), 80.0);
        assert_eq!(TemperatureUnit::Roemer.from_celsius(100.0), 60.0);
        assert_eq!(TemperatureUnit::Kelvin.from_celsius(100.0), 373.15);
    }

    #[test]
    fn read_retries_until_a_reading_lands() {
        let mut dht = Dht::new(Box::new(ScriptedDriver {
            attempts: vec![None, None, Some(READING)],
        }));

        let reading = dht.read(&CancelToken::new()).unwrap();

        assert_eq!(reading, READING);
    }

    #[test]
    fn read_temperature_converts() {
        let mut dht = Dht::new(Box::new(ScriptedDriver {
            attempts: vec![Some(READING)],
        }));

        let fahrenheit = dht
            .read_temperature(TemperatureUnit::Fahrenheit, &CancelToken::new())
            .unwrap();

        assert_eq!(fahrenheit, 23.0 * 9.0 / 5.0 + 32.0);
    }

    #[test]
    fn cancelled_token_stops_the_read() {
        let mut dht = Dht::new(Box::new(ScriptedDriver { attempts: vec![] }));
        let cancel = CancelToken::new();
        cancel.cancel();

        assert_eq!(dht.read(&cancel), Err(GpioError::Cancelled));
    }
}
