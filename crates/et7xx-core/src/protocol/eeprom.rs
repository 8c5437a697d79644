//! Serial EEPROM behind the sensor's second chip select
//!
//! The EEPROM speaks the usual SPI NOR command set with 24-bit addresses.
//! These functions only sequence bus traffic; write-enable tracking lives
//! in the session.

use crate::bus::{Bus, BusTransport};
use crate::error::{Error, Result};
use crate::spi::eeprom::{BLOCK_SIZE, PAGE_SIZE, SECTOR_SIZE};
use crate::spi::{AddressWidth, Command, EepromStatus};

/// Delay between status polls
pub const POLL_DELAY_US: u32 = 100;
/// Page program timeout
pub const PROGRAM_TIMEOUT_US: u32 = 10_000;
/// Sector erase timeout
pub const SECTOR_ERASE_TIMEOUT_US: u32 = 500_000;
/// Block erase timeout
pub const BLOCK_ERASE_TIMEOUT_US: u32 = 2_000_000;
/// Chip erase timeout
pub const CHIP_ERASE_TIMEOUT_US: u32 = 60_000_000;

pub(crate) fn check_range(addr: u32, len: usize) -> Result<()> {
    let end = addr as u64 + len as u64;
    if end > AddressWidth::ThreeByte.max_address() as u64 + 1 {
        log::debug!(
            "et7xx: eeprom range 0x{:06X}+{} beyond 24-bit space",
            addr,
            len
        );
        return Err(Error::InvalidArgument);
    }
    Ok(())
}

pub(crate) fn check_aligned(addr: u32, size: u32) -> Result<()> {
    check_range(addr, size as usize)?;
    if addr % size != 0 {
        return Err(Error::InvalidArgument);
    }
    Ok(())
}

/// Read the EEPROM status register
pub fn read_status<T: BusTransport + ?Sized>(bus: &mut Bus<'_, T>) -> Result<EepromStatus> {
    let mut sr = [0u8; 1];
    bus.run(&Command::EepromReadStatus, &[], &mut sr)?;
    Ok(EepromStatus::from_bits_retain(sr[0]))
}

/// Set the write enable latch
pub fn write_enable<T: BusTransport + ?Sized>(bus: &mut Bus<'_, T>) -> Result<()> {
    bus.run(&Command::EepromWriteEnable, &[], &mut [])
}

/// Clear the write enable latch
pub fn write_disable<T: BusTransport + ?Sized>(bus: &mut Bus<'_, T>) -> Result<()> {
    bus.run(&Command::EepromWriteDisable, &[], &mut [])
}

/// Poll until WIP clears
///
/// Returns `Timeout` once `timeout_us` worth of polls have seen the device
/// busy.
pub fn wait_ready<T: BusTransport + ?Sized>(
    bus: &mut Bus<'_, T>,
    poll_delay_us: u32,
    timeout_us: u32,
) -> Result<()> {
    let max_polls = if poll_delay_us > 0 {
        (timeout_us / poll_delay_us).max(1)
    } else {
        timeout_us.max(1)
    };

    for _ in 0..max_polls {
        if !read_status(bus)?.contains(EepromStatus::WIP) {
            return Ok(());
        }
        if poll_delay_us > 0 {
            bus.delay_us(poll_delay_us);
        }
    }

    log::warn!("et7xx: eeprom still busy after {} polls", max_polls);
    Err(Error::Timeout)
}

/// Read `buf.len()` bytes starting at `addr`
///
/// Reads larger than the bus capacity are issued as consecutive commands.
pub fn read<T: BusTransport + ?Sized>(bus: &mut Bus<'_, T>, addr: u32, buf: &mut [u8]) -> Result<()> {
    read_with(bus, addr, buf, |addr, len| Command::EepromRead { addr, len })
}

/// Like [`read`] but with the FAST_READ opcode
pub fn fast_read<T: BusTransport + ?Sized>(
    bus: &mut Bus<'_, T>,
    addr: u32,
    buf: &mut [u8],
) -> Result<()> {
    read_with(bus, addr, buf, |addr, len| Command::EepromFastRead { addr, len })
}

fn read_with<T, F>(bus: &mut Bus<'_, T>, addr: u32, buf: &mut [u8], command: F) -> Result<()>
where
    T: BusTransport + ?Sized,
    F: Fn(u32, usize) -> Command,
{
    check_range(addr, buf.len())?;
    let step = bus.capacity();
    if step == 0 && !buf.is_empty() {
        return Err(Error::InvalidArgument);
    }

    let mut offset = 0usize;
    while offset < buf.len() {
        let len = core::cmp::min(step, buf.len() - offset);
        let chunk = &mut buf[offset..offset + len];
        bus.run(&command(addr + offset as u32, len), &[], chunk)?;
        offset += len;
    }
    Ok(())
}

/// Program `data` starting at `addr`
///
/// Each program cycle stays within one page and within the bus capacity,
/// so a page is split further when the scratch buffer is smaller than it.
/// The caller must have set the write enable latch. Every cycle after the
/// first re-asserts it, since the device clears WEL when a program cycle
/// completes.
pub fn program<T: BusTransport + ?Sized>(bus: &mut Bus<'_, T>, addr: u32, data: &[u8]) -> Result<()> {
    check_range(addr, data.len())?;
    let step = bus.capacity();
    if step == 0 && !data.is_empty() {
        return Err(Error::InvalidArgument);
    }

    let mut offset = 0usize;
    while offset < data.len() {
        let current = addr + offset as u32;
        let page_room = PAGE_SIZE - (current as usize % PAGE_SIZE);
        let len = core::cmp::min(core::cmp::min(page_room, step), data.len() - offset);

        if offset > 0 {
            write_enable(bus)?;
        }
        bus.run(
            &Command::EepromPageProgram { addr: current, len },
            &data[offset..offset + len],
            &mut [],
        )?;
        wait_ready(bus, POLL_DELAY_US, PROGRAM_TIMEOUT_US)?;
        offset += len;
    }
    Ok(())
}

/// Erase the whole device
pub fn chip_erase<T: BusTransport + ?Sized>(bus: &mut Bus<'_, T>) -> Result<()> {
    bus.run(&Command::EepromChipErase, &[], &mut [])?;
    wait_ready(bus, POLL_DELAY_US, CHIP_ERASE_TIMEOUT_US)
}

/// Erase the 4 KiB sector at `addr`
pub fn sector_erase<T: BusTransport + ?Sized>(bus: &mut Bus<'_, T>, addr: u32) -> Result<()> {
    check_aligned(addr, SECTOR_SIZE)?;
    bus.run(&Command::EepromSectorErase { addr }, &[], &mut [])?;
    wait_ready(bus, POLL_DELAY_US, SECTOR_ERASE_TIMEOUT_US)
}

/// Erase the 64 KiB block at `addr`
pub fn block_erase<T: BusTransport + ?Sized>(bus: &mut Bus<'_, T>, addr: u32) -> Result<()> {
    check_aligned(addr, BLOCK_SIZE)?;
    bus.run(&Command::EepromBlockErase { addr }, &[], &mut [])?;
    wait_ready(bus, POLL_DELAY_US, BLOCK_ERASE_TIMEOUT_US)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_limits() {
        assert!(check_range(0xFF_FF00, 256).is_ok());
        assert_eq!(check_range(0xFF_FF00, 257), Err(Error::InvalidArgument));
    }

    #[test]
    fn test_erase_alignment() {
        assert!(check_aligned(0x1000, SECTOR_SIZE).is_ok());
        assert_eq!(
            check_aligned(0x1001, SECTOR_SIZE),
            Err(Error::InvalidArgument)
        );
        assert_eq!(
            check_aligned(0x1000, BLOCK_SIZE),
            Err(Error::InvalidArgument)
        );
    }
}
