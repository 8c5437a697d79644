//! et7xx-linux-gpio - Linux GPIO sleep pin and LDO control
//!
//! Boards that wire the sensor's sleep/reset line or its LDO enable to
//! ordinary GPIOs use this crate to hand those lines to the session as
//! [`SleepPin`](et7xx_core::bus::SleepPin) and
//! [`PowerRail`](et7xx_core::bus::PowerRail) implementations. Lines are
//! requested through the GPIO character device with the gpiocdev crate.
//!
//! # Example
//!
//! ```no_run
//! use et7xx_core::session::{Et7xx, SensorConfig};
//! use et7xx_linux_gpio::{LinuxLdo, LinuxSleepPin};
//! use et7xx_linux_spi::LinuxSpi;
//!
//! let spi = LinuxSpi::open_device("/dev/spidev0.0")?;
//! let sensor = Et7xx::new(spi, SensorConfig::default())
//!     .with_power_rail(LinuxLdo::open("/dev/gpiochip0", 17, false)?)
//!     .with_sleep_pin(LinuxSleepPin::open("/dev/gpiochip0", 27, false)?);
//! sensor.set_power(true)?;
//! sensor.reset()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Configuration
//!
//! ```toml
//! [gpio]
//! chip = "/dev/gpiochip0"
//! sleep_pin = 27
//! ldo_pin = 17
//! ```
//!
//! # System Requirements
//!
//! - Linux kernel 4.8+ with GPIO character device support
//! - Access to `/dev/gpiochipN` devices (may require root or udev rules)

pub mod device;
pub mod error;

// Re-exports
pub use device::{GpioLines, LinuxLdo, LinuxSleepPin};
pub use error::{LinuxGpioError, Result};
