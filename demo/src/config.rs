use charlcd_gpio::lcd::hd44780::charset::Charset;
use charlcd_gpio::lcd::hd44780::driver::{BusMode, Hd44780Config};
use dotenv::var;
use log::warn;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const DEFAULT_CONFIG_FILE: &str = "charlcd.json";

#[derive(Serialize, Deserialize, Copy, Clone, Debug, Default, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum CharsetName {
    #[default]
    Native,
    Cyrillic,
}

impl From<CharsetName> for Charset {
    fn from(name: CharsetName) -> Self {
        match name {
            CharsetName::Native => Charset::Native,
            CharsetName::Cyrillic => Charset::Cyrillic,
        }
    }
}

/// Display settings, stored as JSON.
#[derive(Serialize, Deserialize, Debug, Eq, PartialEq)]
#[serde(default)]
pub struct Config {
    pub width: u8,
    pub lines: u8,
    pub big_font: bool,
    pub charset: CharsetName,
}

impl Config {
    fn path() -> PathBuf {
        PathBuf::from(var("CONFIG_FILE").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string()))
    }

    pub fn try_load() -> Option<Self> {
        let config_path = Self::path();
        if !config_path.exists() {
            return None;
        }

        let file = std::fs::File::open(&config_path).ok()?;
        let reader = std::io::BufReader::new(file);
        match serde_json::from_reader(reader) {
            Ok(config) => Some(config),
            Err(err) => {
                warn!("Can't parse {}: {}", config_path.display(), err);
                None
            }
        }
    }

    pub fn save(&self) -> std::io::Result<()> {
        let file = std::fs::File::create(Self::path())?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    pub fn hd44780(&self, bus_mode: BusMode) -> Hd44780Config {
        Hd44780Config::default()
            .with_width(self.width)
            .with_lines(self.lines)
            .with_big_font(self.big_font)
            .with_charset(self.charset.into())
            .with_bus_mode(bus_mode)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            width: 16,
            lines: 2,
            big_font: false,
            charset: CharsetName::Native,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let config: Config = serde_json::from_str(r#"{"width": 20, "charset": "cyrillic"}"#).unwrap();
        assert_eq!(config.width, 20);
        assert_eq!(config.lines, 2);
        assert_eq!(config.charset, CharsetName::Cyrillic);
    }

    #[test]
    fn converts_to_driver_config() {
        let config = Config {
            width: 20,
            ..Config::default()
        };
        let hd44780 = config.hd44780(BusMode::Bus8Bit);
        assert_eq!(hd44780.width, 20);
        assert_eq!(hd44780.lines, 2);
        assert_eq!(hd44780.bus_mode, BusMode::Bus8Bit);
        assert_eq!(hd44780.charset, Charset::Native);
    }
}
