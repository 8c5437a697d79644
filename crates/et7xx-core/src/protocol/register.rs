//! Sensor register and efuse access

use crate::bus::{Bus, BusTransport};
use crate::error::{Error, Result};
use crate::spi::{AddressWidth, Command, Direction};

/// Check that a burst of `len` bytes starting at `addr` stays inside the
/// 8-bit address space in the given direction
fn check_range(addr: u8, len: usize, direction: Direction) -> Result<()> {
    let in_range = match direction {
        Direction::Forward => addr as usize + len <= AddressWidth::OneByte.max_address() as usize + 1,
        Direction::Backward => len <= addr as usize + 1,
    };
    if in_range {
        Ok(())
    } else {
        Err(Error::InvalidArgument)
    }
}

/// Read a single sensor register
pub fn read_register<T: BusTransport + ?Sized>(bus: &mut Bus<'_, T>, addr: u8) -> Result<u8> {
    let mut value = [0u8; 1];
    bus.run(&Command::ReadRegister { addr }, &[], &mut value)?;
    Ok(value[0])
}

/// Write a single sensor register
pub fn write_register<T: BusTransport + ?Sized>(
    bus: &mut Bus<'_, T>,
    addr: u8,
    value: u8,
) -> Result<()> {
    bus.run(&Command::WriteRegister { addr, value }, &[], &mut [])
}

/// Burst read `buf.len()` registers starting at `addr`
///
/// With [`Direction::Backward`] the device decrements the address after
/// each byte, so `buf[i]` holds register `addr - i`. A zero-length read is
/// a no-op.
pub fn burst_read<T: BusTransport + ?Sized>(
    bus: &mut Bus<'_, T>,
    addr: u8,
    direction: Direction,
    buf: &mut [u8],
) -> Result<()> {
    if buf.is_empty() {
        return Ok(());
    }
    bus.check_len(buf.len())?;
    check_range(addr, buf.len(), direction)?;
    bus.run(&Command::burst_read(addr, buf.len(), direction), &[], buf)
}

/// Burst write `data` to consecutive registers starting at `addr`
pub fn burst_write<T: BusTransport + ?Sized>(
    bus: &mut Bus<'_, T>,
    addr: u8,
    direction: Direction,
    data: &[u8],
) -> Result<()> {
    if data.is_empty() {
        return Ok(());
    }
    bus.check_len(data.len())?;
    check_range(addr, data.len(), direction)?;
    bus.run(&Command::burst_write(addr, data.len(), direction), data, &mut [])
}

/// Read `buf.len()` bytes of efuse starting at `addr`
pub fn read_efuse<T: BusTransport + ?Sized>(
    bus: &mut Bus<'_, T>,
    addr: u8,
    buf: &mut [u8],
) -> Result<()> {
    if buf.is_empty() {
        return Ok(());
    }
    bus.check_len(buf.len())?;
    check_range(addr, buf.len(), Direction::Forward)?;
    bus.run(&Command::ReadEfuse { addr, len: buf.len() }, &[], buf)
}

/// Program efuse bytes starting at `addr`
///
/// Efuse bits are one-time programmable; the device ORs `data` into the
/// existing contents.
pub fn write_efuse<T: BusTransport + ?Sized>(
    bus: &mut Bus<'_, T>,
    addr: u8,
    data: &[u8],
) -> Result<()> {
    if data.is_empty() {
        return Ok(());
    }
    bus.check_len(data.len())?;
    check_range(addr, data.len(), Direction::Forward)?;
    log::debug!("et7xx: programming {} efuse bytes at 0x{:02X}", data.len(), addr);
    bus.run(&Command::WriteEfuse { addr, len: data.len() }, data, &mut [])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_range() {
        assert!(check_range(0x00, 256, Direction::Forward).is_ok());
        assert!(check_range(0xF0, 16, Direction::Forward).is_ok());
        assert_eq!(
            check_range(0xF0, 17, Direction::Forward),
            Err(Error::InvalidArgument)
        );
    }

    #[test]
    fn test_backward_range() {
        assert!(check_range(0x0F, 16, Direction::Backward).is_ok());
        assert_eq!(
            check_range(0x0F, 17, Direction::Backward),
            Err(Error::InvalidArgument)
        );
    }
}
