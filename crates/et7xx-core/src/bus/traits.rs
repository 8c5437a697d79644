//! Capability traits
//!
//! The protocol layer never touches platform primitives directly. A bus
//! backend, a power rail and a sleep pin are injected into the session as
//! implementations of these traits.

use crate::error::Result;
use crate::spi::Target;

/// Full-duplex SPI bus shared by the sensor and its EEPROM
///
/// Implementations perform exactly one chip-select-framed exchange per
/// call: every byte of `tx` is clocked out while the same number of bytes
/// is clocked into `rx` (`tx.len() == rx.len()`). Failures are reported as
/// [`Error::TransportError`](crate::Error::TransportError) carrying the
/// backend's status code.
///
/// ## Example
///
/// ```ignore
/// impl BusTransport for MySpi {
///     fn exchange(&mut self, target: Target, tx: &[u8], rx: &mut [u8], speed_hz: u32) -> Result<()> {
///         self.select(target);
///         self.transfer_full_duplex(tx, rx, speed_hz)
///             .map_err(|e| Error::TransportError(TransportStatus(e.raw())))
///     }
///
///     fn delay_us(&mut self, us: u32) {
///         std::thread::sleep(std::time::Duration::from_micros(us as u64));
///     }
/// }
/// ```
pub trait BusTransport {
    /// Highest clock the hardware accepts
    fn max_speed_hz(&self) -> u32 {
        u32::MAX
    }

    /// Perform one full-duplex exchange with the given chip select
    fn exchange(&mut self, target: Target, tx: &[u8], rx: &mut [u8], speed_hz: u32) -> Result<()>;

    /// Delay for the specified number of microseconds
    fn delay_us(&mut self, us: u32);
}

/// Switchable supply for the sensor (LDO regulator or enable GPIO)
pub trait PowerRail {
    /// Turn the supply on
    fn enable(&mut self) -> Result<()>;

    /// Turn the supply off
    fn disable(&mut self) -> Result<()>;
}

/// The sensor's active-low sleep/reset line
pub trait SleepPin {
    /// Drive the line high (`true`, sensor running) or low (held in reset)
    fn set_level(&mut self, high: bool) -> Result<()>;
}

/// Stand-in for boards whose supply and sleep line are not software
/// controlled
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysOn;

impl PowerRail for AlwaysOn {
    fn enable(&mut self) -> Result<()> {
        Ok(())
    }

    fn disable(&mut self) -> Result<()> {
        Ok(())
    }
}

impl SleepPin for AlwaysOn {
    fn set_level(&mut self, _high: bool) -> Result<()> {
        Ok(())
    }
}

// Blanket impls for boxed capabilities so backends can be chosen at runtime
#[cfg(feature = "alloc")]
impl BusTransport for alloc::boxed::Box<dyn BusTransport + Send> {
    fn max_speed_hz(&self) -> u32 {
        (**self).max_speed_hz()
    }

    fn exchange(&mut self, target: Target, tx: &[u8], rx: &mut [u8], speed_hz: u32) -> Result<()> {
        (**self).exchange(target, tx, rx, speed_hz)
    }

    fn delay_us(&mut self, us: u32) {
        (**self).delay_us(us)
    }
}

#[cfg(feature = "alloc")]
impl PowerRail for alloc::boxed::Box<dyn PowerRail + Send> {
    fn enable(&mut self) -> Result<()> {
        (**self).enable()
    }

    fn disable(&mut self) -> Result<()> {
        (**self).disable()
    }
}

#[cfg(feature = "alloc")]
impl SleepPin for alloc::boxed::Box<dyn SleepPin + Send> {
    fn set_level(&mut self, high: bool) -> Result<()> {
        (**self).set_level(high)
    }
}
