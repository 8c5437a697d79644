//! et7xx-core - Core library for the ET7xx fingerprint sensor protocol
//!
//! This crate implements the SPI command layer of the EgisTec ET7xx optical
//! fingerprint sensor: register, efuse, frame, CIS and EEPROM access over a
//! single shared bus. The encoder and protocol sequences are `no_std`
//! compatible; the device session, registry and configuration need `std`.
//!
//! # Features
//!
//! - `std` - Enable standard library support (includes `alloc`), the
//!   [`session`] module and TOML configuration
//! - `alloc` - Enable heap allocation for multi-chunk frame reassembly
//!
//! # Example
//!
//! ```ignore
//! use et7xx_core::session::{Et7xx, SensorConfig};
//!
//! let device = Et7xx::new(transport, SensorConfig::default());
//! let handle = device.open()?;
//! device.write_register(0x10, 0x5A)?;
//! assert_eq!(device.read_register(0x10)?, 0x5A);
//! device.close(handle)?;
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod bus;
pub mod error;
pub mod protocol;
#[cfg(feature = "std")]
pub mod session;
pub mod spi;

pub use error::{Error, Result};
