//! Register and efuse commands

use et7xx_core::spi::Direction;

use super::{print_hex_dump, with_session, CmdResult};
use crate::transports::Sensor;

/// Read one sensor register
pub fn cmd_reg_read(sensor: &Sensor, addr: u8) -> CmdResult {
    with_session(sensor, |sensor| {
        let value = sensor.read_register(addr)?;
        println!("0x{:02X} = 0x{:02X}", addr, value);
        Ok(())
    })
}

/// Write one sensor register
pub fn cmd_reg_write(sensor: &Sensor, addr: u8, value: u8) -> CmdResult {
    with_session(sensor, |sensor| {
        sensor.write_register(addr, value)?;
        log::info!("Wrote 0x{:02X} to register 0x{:02X}", value, addr);
        Ok(())
    })
}

/// Burst read a register range
///
/// Backward dumps are printed in bus order, highest address first.
pub fn cmd_reg_dump(sensor: &Sensor, start: u8, len: usize, backward: bool) -> CmdResult {
    let direction = if backward {
        Direction::Backward
    } else {
        Direction::Forward
    };

    with_session(sensor, |sensor| {
        let data = sensor.burst_read(start, len, direction)?;
        if backward {
            for (i, value) in data.iter().enumerate() {
                let addr = start.wrapping_sub(i as u8);
                println!("0x{:02X} = 0x{:02X}", addr, value);
            }
        } else {
            print_hex_dump(u32::from(start), &data);
        }
        Ok(())
    })
}

/// Read efuse bytes
pub fn cmd_efuse_read(sensor: &Sensor, addr: u8, len: usize) -> CmdResult {
    with_session(sensor, |sensor| {
        let data = sensor.read_efuse(addr, len)?;
        print_hex_dump(u32::from(addr), &data);
        Ok(())
    })
}
