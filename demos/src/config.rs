use dotenv::var;
use serde::{Deserialize, Serialize};
use std::env::var_os;
use std::ffi::OsStr;
use std::path::Path;

#[derive(Serialize, Deserialize, Debug)]
pub struct LedConfig {
    pub pin: usize,
    pub color: String,
}

/// Wiring for the demo programs, loaded from a JSON file.
#[derive(Serialize, Deserialize, Debug)]
pub struct Config {
    pub leds: Vec<LedConfig>,
    /// BCM numbers of the keyboard row pins, wired as inputs.
    pub keypad_input_pins: Vec<usize>,
    /// BCM numbers of the keyboard column pins, wired as outputs.
    pub keypad_output_pins: Vec<usize>,
    pub keypad_keys: Vec<Vec<char>>,
    pub i2c_bus: u8,
    pub lcd_rows: usize,
    pub lcd_cols: usize,
}

impl Config {
    pub fn try_load() -> Option<Self> {
        let config_str = var_os("CONFIG_FILE");
        let config_str: &OsStr = config_str.as_deref().unwrap_or(OsStr::new("config.json"));
        let config_path = Path::new(config_str);
        if config_path.exists() {
            let file = std::fs::File::open(config_path).ok()?;
            let reader = std::io::BufReader::new(file);
            serde_json::from_reader(reader).ok()
        } else {
            None
        }
    }

    pub fn save(&self) -> std::io::Result<()> {
        let config_str = var("CONFIG_FILE").unwrap_or_else(|_| "config.json".to_string());
        let config_path = Path::new(&config_str);
        let file = std::fs::File::create(config_path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            leds: vec![
                LedConfig {
                    pin: 16,
                    color: "red".to_string(),
                },
                LedConfig {
                    pin: 21,
                    color: "green".to_string(),
                },
                LedConfig {
                    pin: 20,
                    color: "yellow".to_string(),
                },
            ],
            keypad_input_pins: vec![18, 23, 24, 25],
            keypad_output_pins: vec![6, 13, 19, 26],
            keypad_keys: vec![
                vec!['1', '2', '3', 'A'],
                vec!['4', '5', '6', 'B'],
                vec!['7', '8', '9', 'C'],
                vec!['*', '0', '#', 'D'],
            ],
            i2c_bus: 1,
            lcd_rows: 2,
            lcd_cols: 16,
        }
    }
}
