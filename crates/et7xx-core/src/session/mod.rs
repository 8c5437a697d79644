//! Device session, registry and configuration (requires `std`)
//!
//! This module ties the protocol layer to one physical sensor: it owns the
//! transport and scratch buffers behind a mutex, counts open sessions,
//! tracks the EEPROM write-enable latch and decodes userspace transfer
//! records.

mod config;
mod device;
mod eeprom;
mod registry;
mod request;

pub use config::{parse_number, Config, ConfigError, GpioConfig, SensorConfig, DEFAULT_MAX_SPI_CLOCK_HZ};
pub use device::{EepromErase, Et7xx, SessionHandle, RESET_LOW_US, RESET_SETTLE_US};
pub use eeprom::{write_ctrl_value, EepromState, WRITE_CTRL_ENABLE};
pub use registry::{DeviceNumber, DeviceRegistry, ET7XX_MAJOR, N_SPI_MINORS};
pub use request::{ioctl, IoTransfer, Request, MAX_TRANSFERS};
