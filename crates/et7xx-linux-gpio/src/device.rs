//! GPIO-driven sleep pin and LDO enable
//!
//! Each line is requested as an output through the GPIO character device
//! and held for the lifetime of the handle.

use crate::error::{LinuxGpioError, Result};

use gpiocdev::line::{Offset, Value};
use gpiocdev::request::{Config, Request};

use et7xx_core::bus::{PowerRail, SleepPin};
use et7xx_core::error::{Error as CoreError, Result as CoreResult};
use et7xx_core::session::GpioConfig;

/// Consumer label shown by `gpioinfo`
const CONSUMER: &str = "et7xx";

fn level_value(high: bool) -> Value {
    if high {
        Value::Active
    } else {
        Value::Inactive
    }
}

/// One requested output line
struct OutputLine {
    name: &'static str,
    request: Request,
    offset: Offset,
}

impl OutputLine {
    fn open(name: &'static str, chip: &str, offset: Offset, high: bool) -> Result<Self> {
        if chip.is_empty() {
            return Err(LinuxGpioError::NoDevice);
        }

        let mut config = Config::default();
        config.with_line(offset).as_output(level_value(high));

        let request = Request::from_config(config)
            .on_chip(chip)
            .with_consumer(CONSUMER)
            .request()
            .map_err(|source| LinuxGpioError::LineRequestFailed {
                name,
                chip: chip.to_string(),
                offset,
                source,
            })?;

        log::info!(
            "linux_gpio: {} on {} line {} ({})",
            name,
            chip,
            offset,
            if high { "high" } else { "low" }
        );
        Ok(Self {
            name,
            request,
            offset,
        })
    }

    fn set(&self, high: bool) -> Result<()> {
        self.request
            .set_value(self.offset, level_value(high))
            .map(|_| ())
            .map_err(|source| LinuxGpioError::SetValueFailed {
                name: self.name,
                source,
            })
    }

    /// Drive the line, reporting failure as a power control error
    fn drive(&self, high: bool) -> CoreResult<()> {
        self.set(high).map_err(|e| {
            log::error!("linux_gpio: {}", e);
            CoreError::PowerControl
        })
    }
}

/// Sensor sleep/reset line
pub struct LinuxSleepPin {
    line: OutputLine,
}

impl LinuxSleepPin {
    /// Request `offset` on `chip`, initially at `high`
    pub fn open(chip: &str, offset: Offset, high: bool) -> Result<Self> {
        Ok(Self {
            line: OutputLine::open("sleep", chip, offset, high)?,
        })
    }
}

impl SleepPin for LinuxSleepPin {
    fn set_level(&mut self, high: bool) -> CoreResult<()> {
        self.line.drive(high)
    }
}

/// LDO enable line
pub struct LinuxLdo {
    line: OutputLine,
}

impl LinuxLdo {
    /// Request `offset` on `chip`, initially enabled when `on`
    pub fn open(chip: &str, offset: Offset, on: bool) -> Result<Self> {
        Ok(Self {
            line: OutputLine::open("ldo", chip, offset, on)?,
        })
    }
}

impl PowerRail for LinuxLdo {
    fn enable(&mut self) -> CoreResult<()> {
        self.line.drive(true)
    }

    fn disable(&mut self) -> CoreResult<()> {
        self.line.drive(false)
    }
}

/// Lines named in a `[gpio]` configuration section
#[derive(Default)]
pub struct GpioLines {
    /// Sleep/reset line, if configured
    pub sleep: Option<LinuxSleepPin>,
    /// LDO enable line, if configured
    pub ldo: Option<LinuxLdo>,
}

impl GpioLines {
    /// Request every configured line
    ///
    /// With `powered` the LDO starts enabled and the sleep line high;
    /// otherwise both start low.
    pub fn open(config: &GpioConfig, powered: bool) -> Result<Self> {
        let ldo = config
            .ldo_pin
            .map(|offset| LinuxLdo::open(&config.chip, offset, powered))
            .transpose()?;
        let sleep = config
            .sleep_pin
            .map(|offset| LinuxSleepPin::open(&config.chip, offset, powered))
            .transpose()?;
        Ok(Self { sleep, ldo })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_mapping() {
        assert_eq!(level_value(true), Value::Active);
        assert_eq!(level_value(false), Value::Inactive);
    }

    #[test]
    fn test_empty_chip_rejected() {
        assert!(matches!(
            LinuxSleepPin::open("", 4, true),
            Err(LinuxGpioError::NoDevice)
        ));
    }

    #[test]
    fn test_no_lines_configured() {
        let config = GpioConfig {
            chip: "/dev/gpiochip0".to_string(),
            sleep_pin: None,
            ldo_pin: None,
        };
        let lines = GpioLines::open(&config, true).unwrap();
        assert!(lines.sleep.is_none());
        assert!(lines.ldo.is_none());
    }
}
