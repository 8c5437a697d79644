//! CIS sensor commands

use std::path::Path;

use super::frame::{capture_spinner, save_frame};
use super::{with_session, CmdResult};
use crate::transports::Sensor;

/// Read one CIS register
pub fn cmd_cis_read(sensor: &Sensor, addr: u8) -> CmdResult {
    with_session(sensor, |sensor| {
        let value = sensor.read_cis_register(addr)?;
        println!("CIS 0x{:02X} = 0x{:02X}", addr, value);
        Ok(())
    })
}

/// Write one CIS register
pub fn cmd_cis_write(sensor: &Sensor, addr: u8, value: u8) -> CmdResult {
    with_session(sensor, |sensor| {
        sensor.write_cis_register(addr, value)?;
        log::info!("Wrote 0x{:02X} to CIS register 0x{:02X}", value, addr);
        Ok(())
    })
}

/// Pre-capture and read a CIS frame into `output`
pub fn cmd_cis_frame(sensor: &Sensor, size: usize, output: &Path) -> CmdResult {
    with_session(sensor, |sensor| {
        let pb = capture_spinner("Capturing CIS frame")?;

        let data = sensor
            .pre_capture_cis()
            .and_then(|()| sensor.get_cis_frame(size));
        match &data {
            Ok(_) => pb.finish_with_message("Capture complete"),
            Err(_) => pb.abandon_with_message("Capture failed"),
        }

        save_frame(output, &data?)
    })
}
