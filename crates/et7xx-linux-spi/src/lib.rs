//! et7xx-linux-spi - Linux spidev bus backend
//!
//! This crate drives an ET7xx sensor through the `/dev/spidevX.Y`
//! character devices. The sensor and its EEPROM are separate chip selects
//! on one controller, so two nodes are opened: `dev` for the sensor and
//! the optional `eeprom` node for the EEPROM.
//!
//! # Example
//!
//! ```no_run
//! use et7xx_core::session::{Et7xx, SensorConfig};
//! use et7xx_linux_spi::{LinuxSpi, LinuxSpiConfig};
//!
//! let config = LinuxSpiConfig::new("/dev/spidev0.0")
//!     .with_eeprom("/dev/spidev0.1")
//!     .with_speed(20_000_000);
//! let spi = LinuxSpi::open(&config)?;
//!
//! let sensor = Et7xx::new(spi, SensorConfig::default());
//! let session = sensor.open()?;
//! println!("register 0x00 = 0x{:02X}", sensor.read_register(0x00)?);
//! sensor.close(session)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Usage with the et7xx CLI
//!
//! ```bash
//! et7xx -t linux_spi:dev=/dev/spidev0.0 reg dump
//! et7xx -t linux_spi:dev=/dev/spidev0.0,eeprom=/dev/spidev0.1,spispeed=10000 eeprom status
//! ```
//!
//! # System Requirements
//!
//! - Linux kernel with spidev support enabled (`CONFIG_SPI_SPIDEV`)
//! - Read/write access to the `/dev/spidevX.Y` nodes
//! - `spidev.bufsiz` at least as large as the sensor's buffer plus the
//!   five byte command header

pub mod device;
pub mod error;

// Re-exports
pub use device::{mode, parse_options, LinuxSpi, LinuxSpiConfig};
pub use error::{LinuxSpiError, Result};

use et7xx_core::bus::BusTransport;

/// Open the spidev nodes and return a boxed bus
///
/// This is a convenience function for use in the CLI transport dispatch.
///
/// # Example Options
///
/// - `dev=/dev/spidev0.0` - Required: sensor chip select
/// - `eeprom=/dev/spidev0.1` - Optional: EEPROM chip select
/// - `spispeed=20000` - Optional: default speed in kHz (default: 20000)
/// - `maxspeed=50000` - Optional: clock ceiling in kHz
/// - `mode=0` - Optional: SPI mode 0-3 (default: 0)
pub fn open_linux_spi(
    options: &[(&str, &str)],
) -> std::result::Result<Box<dyn BusTransport + Send>, Box<dyn std::error::Error>> {
    let config = parse_options(options)?;
    let spi = LinuxSpi::open(&config)?;
    Ok(Box::new(spi))
}
