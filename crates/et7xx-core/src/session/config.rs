//! Sensor configuration
//!
//! Board-level settings are read from a TOML file:
//!
//! ```toml
//! [sensor]
//! chip_id = "ET713"
//! model_info = "ET713-OPT"
//! bufsiz = 0x1000
//! spi_clock_hz = 20000000
//! secure_mode = false
//!
//! [gpio]
//! chip = "/dev/gpiochip0"
//! sleep_pin = 17
//! ldo_pin = 27
//! ```
//!
//! Every field is optional; missing ones take the defaults of
//! [`SensorConfig::default`].

use std::fs;
use std::path::Path;
use std::string::{String, ToString};

use crate::spi::{DEFAULT_BUFSIZ, SLOW_BAUD_RATE};

/// Highest clock accepted unless the config says otherwise
pub const DEFAULT_MAX_SPI_CLOCK_HZ: u32 = 50_000_000;

/// Errors from loading or validating a configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read
    #[error("failed to read config {path}: {source}")]
    Io {
        /// File that failed
        path: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
    /// The TOML is malformed or has the wrong types
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    /// A value is out of range
    #[error("invalid config value for {field}: {reason}")]
    Invalid {
        /// Offending field
        field: &'static str,
        /// What is wrong with it
        reason: String,
    },
}

/// Per-device sensor settings
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SensorConfig {
    /// Vendor string reported to userspace
    pub vendor: String,
    /// Chip identification string
    pub chip_id: String,
    /// Model string returned by the model info request
    pub model_info: String,
    /// Mounting position descriptor
    pub sensor_position: String,
    /// Sensor variant selector
    #[serde(deserialize_with = "deserialize_hex_u32")]
    pub sensor_type: u32,
    /// Scratch buffer size in bytes (largest single data phase)
    #[serde(deserialize_with = "deserialize_hex_usize")]
    pub bufsiz: usize,
    /// Bus clock used after open
    #[serde(deserialize_with = "deserialize_hex_u32")]
    pub spi_clock_hz: u32,
    /// Highest clock `set_spi_clock` accepts
    #[serde(deserialize_with = "deserialize_hex_u32")]
    pub max_spi_clock_hz: u32,
    /// Sensor data path is owned by a trusted execution environment
    pub secure_mode: bool,
    /// Refuse frame reads that are not preceded by a pre-capture
    pub require_pre_capture: bool,
    /// Value returned by the SPI value request
    #[serde(deserialize_with = "deserialize_hex_u32")]
    pub spi_value: u32,
    /// Name of the LDO regulator feeding the sensor
    pub regulator: Option<String>,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            vendor: "EGISTEC".to_string(),
            chip_id: "ET7XX".to_string(),
            model_info: String::new(),
            sensor_position: String::new(),
            sensor_type: 0,
            bufsiz: DEFAULT_BUFSIZ,
            spi_clock_hz: SLOW_BAUD_RATE,
            max_spi_clock_hz: DEFAULT_MAX_SPI_CLOCK_HZ,
            secure_mode: false,
            require_pre_capture: false,
            spi_value: 0,
            regulator: None,
        }
    }
}

impl SensorConfig {
    /// Set the scratch buffer size
    pub fn with_bufsiz(mut self, bufsiz: usize) -> Self {
        self.bufsiz = bufsiz;
        self
    }

    /// Set the operating clock
    pub fn with_spi_clock(mut self, hz: u32) -> Self {
        self.spi_clock_hz = hz;
        self
    }

    /// Set the highest accepted clock
    pub fn with_max_spi_clock(mut self, hz: u32) -> Self {
        self.max_spi_clock_hz = hz;
        self
    }

    /// Run in secure mode
    pub fn with_secure_mode(mut self, secure: bool) -> Self {
        self.secure_mode = secure;
        self
    }

    /// Require a pre-capture before frame reads
    pub fn with_require_pre_capture(mut self, require: bool) -> Self {
        self.require_pre_capture = require;
        self
    }

    /// Set the model info string
    pub fn with_model_info(mut self, model: impl Into<String>) -> Self {
        self.model_info = model.into();
        self
    }

    /// Set the SPI value reported to userspace
    pub fn with_spi_value(mut self, value: u32) -> Self {
        self.spi_value = value;
        self
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bufsiz == 0 {
            return Err(ConfigError::Invalid {
                field: "bufsiz",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.max_spi_clock_hz == 0 {
            return Err(ConfigError::Invalid {
                field: "max_spi_clock_hz",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.spi_clock_hz == 0 || self.spi_clock_hz > self.max_spi_clock_hz {
            return Err(ConfigError::Invalid {
                field: "spi_clock_hz",
                reason: std::format!("must be in 1..={}", self.max_spi_clock_hz),
            });
        }
        Ok(())
    }
}

/// GPIO lines wired to the sensor
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GpioConfig {
    /// GPIO chip device node
    pub chip: String,
    /// Line offset of the active-low sleep pin
    pub sleep_pin: Option<u32>,
    /// Line offset of the LDO enable
    pub ldo_pin: Option<u32>,
}

impl Default for GpioConfig {
    fn default() -> Self {
        Self {
            chip: "/dev/gpiochip0".to_string(),
            sleep_pin: None,
            ldo_pin: None,
        }
    }
}

/// Complete configuration file
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// `[sensor]` section
    pub sensor: SensorConfig,
    /// `[gpio]` section
    pub gpio: Option<GpioConfig>,
}

impl Config {
    /// Load and validate a config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.sensor.validate()?;
        Ok(config)
    }
}

/// Deserialize a u32 that can be hex (0x...) or decimal
fn deserialize_hex_u32<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::Deserialize;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum HexOrInt {
        Int(u32),
        Str(String),
    }

    match HexOrInt::deserialize(deserializer)? {
        HexOrInt::Int(n) => Ok(n),
        HexOrInt::Str(s) => parse_number(&s).map_err(serde::de::Error::custom),
    }
}

fn deserialize_hex_usize<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: serde::Deserializer<'de>,
{
    deserialize_hex_u32(deserializer).map(|n| n as usize)
}

/// Parse a number that can be hex (0x...) or decimal
pub fn parse_number(s: &str) -> Result<u32, String> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| std::format!("invalid hex: {}", e))
    } else {
        s.parse()
            .map_err(|e| std::format!("invalid number: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("4096"), Ok(4096));
        assert_eq!(parse_number("0x1000"), Ok(4096));
        assert_eq!(parse_number(" 0X1F "), Ok(31));
        assert!(parse_number("0xZZ").is_err());
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config.sensor, SensorConfig::default());
        assert_eq!(config.sensor.bufsiz, 1024);
        assert_eq!(config.sensor.spi_clock_hz, 20_000_000);
        assert!(config.gpio.is_none());
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
[sensor]
chip_id = "ET713"
model_info = "ET713-OPT"
bufsiz = "0x1000"
spi_clock_hz = 10000000
secure_mode = true
spi_value = "0xA5A5"
regulator = "vdd_btp"

[gpio]
sleep_pin = 17
ldo_pin = 27
"#;
        let config = Config::from_toml_str(toml).unwrap();
        assert_eq!(config.sensor.chip_id, "ET713");
        assert_eq!(config.sensor.bufsiz, 4096);
        assert_eq!(config.sensor.spi_value, 0xA5A5);
        assert!(config.sensor.secure_mode);
        assert_eq!(config.sensor.regulator.as_deref(), Some("vdd_btp"));
        let gpio = config.gpio.unwrap();
        assert_eq!(gpio.chip, "/dev/gpiochip0");
        assert_eq!(gpio.sleep_pin, Some(17));
        assert_eq!(gpio.ldo_pin, Some(27));
    }

    #[test]
    fn test_zero_bufsiz_rejected() {
        let err = Config::from_toml_str("[sensor]\nbufsiz = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "bufsiz", .. }));
    }

    #[test]
    fn test_clock_above_max_rejected() {
        let config = SensorConfig::default()
            .with_max_spi_clock(10_000_000)
            .with_spi_clock(20_000_000);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid {
                field: "spi_clock_hz",
                ..
            })
        ));
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(matches!(
            Config::from_toml_str("[sensor]\nbogus = 1\n"),
            Err(ConfigError::Parse(_))
        ));
    }
}
