//! Power, reset and clock commands

use super::{with_session, CmdResult};
use crate::transports::Sensor;

/// Switch the supply on or off
pub fn cmd_power(sensor: &Sensor, on: bool) -> CmdResult {
    sensor.set_power(on)?;
    println!("Sensor power {}", if on { "on" } else { "off" });
    Ok(())
}

/// Pulse the sleep pin
pub fn cmd_reset(sensor: &Sensor) -> CmdResult {
    sensor.reset()?;
    println!("Sensor reset");
    Ok(())
}

/// Set the bus clock and confirm with a register read
pub fn cmd_clock(sensor: &Sensor, hz: u32) -> CmdResult {
    with_session(sensor, |sensor| {
        sensor.set_spi_clock(hz)?;
        let id = sensor.read_register(0x00)?;
        println!(
            "SPI clock set to {} Hz (register 0x00 = 0x{:02X})",
            sensor.spi_clock_hz(),
            id
        );
        Ok(())
    })
}
