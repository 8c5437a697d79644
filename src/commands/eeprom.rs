//! EEPROM commands

use indicatif::{ProgressBar, ProgressStyle};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use et7xx_core::session::EepromErase;
use et7xx_core::spi::eeprom::PAGE_SIZE;
use et7xx_core::spi::EepromStatus;

use super::{print_hex_dump, with_session, CmdResult};
use crate::transports::Sensor;

/// Chunk size for reading (4 KiB)
const READ_CHUNK_SIZE: usize = 4096;

fn byte_progress(total: usize) -> Result<ProgressBar, Box<dyn std::error::Error>> {
    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})")?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

fn format_status(status: EepromStatus) -> String {
    let mut bits = Vec::new();
    if status.contains(EepromStatus::WIP) {
        bits.push("WIP");
    }
    if status.contains(EepromStatus::WEL) {
        bits.push("WEL");
    }
    if status.intersects(EepromStatus::BP0 | EepromStatus::BP1 | EepromStatus::BP2) {
        bits.push("BP");
    }
    if status.contains(EepromStatus::SRWD) {
        bits.push("SRWD");
    }
    if bits.is_empty() {
        "idle".to_string()
    } else {
        bits.join(" ")
    }
}

/// Print the EEPROM status register
pub fn cmd_eeprom_status(sensor: &Sensor) -> CmdResult {
    with_session(sensor, |sensor| {
        let status = sensor.eeprom_read_status()?;
        println!("Status:          0x{:02X} ({})", status.bits(), format_status(status));
        println!("Session latch:   {:?}", sensor.eeprom_state());
        Ok(())
    })
}

/// Read `len` bytes at `addr` to a file or as a hex dump
pub fn cmd_eeprom_read(
    sensor: &Sensor,
    addr: u32,
    len: usize,
    output: Option<&Path>,
    fast: bool,
) -> CmdResult {
    with_session(sensor, |sensor| {
        let mut data = Vec::with_capacity(len);
        let pb = byte_progress(len)?;

        while data.len() < len {
            let chunk_len = std::cmp::min(READ_CHUNK_SIZE, len - data.len());
            let chunk_addr = addr + data.len() as u32;
            let chunk = if fast {
                sensor.eeprom_fast_read(chunk_addr, chunk_len)?
            } else {
                sensor.eeprom_read(chunk_addr, chunk_len)?
            };
            data.extend_from_slice(&chunk);
            pb.set_position(data.len() as u64);
        }
        pb.finish_with_message("Read complete");

        match output {
            Some(path) => {
                let mut file = File::create(path)?;
                file.write_all(&data)?;
                println!("Wrote {} bytes to {:?}", data.len(), path);
            }
            None => print_hex_dump(addr, &data),
        }
        Ok(())
    })
}

/// Program a file into the EEPROM page by page
///
/// Each page gets its own write enable, since a completed program cycle
/// clears the latch.
pub fn cmd_eeprom_write(sensor: &Sensor, addr: u32, input: &Path, non_secure: bool) -> CmdResult {
    let data = fs::read(input)?;
    log::info!("Writing {} bytes from {:?} at 0x{:06X}", data.len(), input, addr);

    with_session(sensor, |sensor| {
        let pb = byte_progress(data.len())?;

        let mut offset = 0usize;
        while offset < data.len() {
            let page_addr = addr + offset as u32;
            let room = PAGE_SIZE - (page_addr as usize % PAGE_SIZE);
            let chunk = &data[offset..std::cmp::min(offset + room, data.len())];

            sensor.eeprom_write_enable()?;
            if non_secure {
                sensor.eeprom_write_non_secure(page_addr, chunk)?;
            } else {
                sensor.eeprom_write(page_addr, chunk)?;
            }

            offset += chunk.len();
            pb.set_position(offset as u64);
        }
        pb.finish_with_message("Write complete");
        Ok(())
    })
}

/// Map the mutually exclusive erase flags to an erase kind
pub fn erase_kind(chip: bool, sector: Option<u32>, block: Option<u32>) -> Option<EepromErase> {
    match (chip, sector, block) {
        (true, None, None) => Some(EepromErase::Chip),
        (false, Some(addr), None) => Some(EepromErase::Sector(addr)),
        (false, None, Some(addr)) => Some(EepromErase::Block(addr)),
        _ => None,
    }
}

/// Erase the chip, a sector or a block
pub fn cmd_eeprom_erase(sensor: &Sensor, kind: EepromErase) -> CmdResult {
    with_session(sensor, |sensor| {
        sensor.eeprom_write_enable()?;
        match kind {
            EepromErase::Chip => sensor.eeprom_chip_erase()?,
            EepromErase::Sector(addr) => sensor.eeprom_sector_erase(addr)?,
            EepromErase::Block(addr) => sensor.eeprom_block_erase(addr)?,
        }
        println!("Erase complete ({:?})", kind);
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_erase_kind() {
        assert_eq!(erase_kind(true, None, None), Some(EepromErase::Chip));
        assert_eq!(
            erase_kind(false, Some(0x1000), None),
            Some(EepromErase::Sector(0x1000))
        );
        assert_eq!(
            erase_kind(false, None, Some(0x10000)),
            Some(EepromErase::Block(0x10000))
        );
        assert_eq!(erase_kind(false, None, None), None);
    }

    #[test]
    fn test_format_status() {
        assert_eq!(format_status(EepromStatus::empty()), "idle");
        assert_eq!(
            format_status(EepromStatus::WIP | EepromStatus::WEL),
            "WIP WEL"
        );
    }
}
