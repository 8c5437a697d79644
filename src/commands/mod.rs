//! CLI command implementations
//!
//! Every command that touches the sensor runs inside a session opened by
//! [`with_session`], so the scratch buffer and clock are set up the same
//! way a userspace client would see them.

mod cis;
mod eeprom;
mod frame;
mod info;
mod power;
mod register;

pub use cis::{cmd_cis_frame, cmd_cis_read, cmd_cis_write};
pub use eeprom::{cmd_eeprom_erase, cmd_eeprom_read, cmd_eeprom_status, cmd_eeprom_write, erase_kind};
pub use frame::cmd_frame;
pub use info::{cmd_info, list_transports};
pub use power::{cmd_clock, cmd_power, cmd_reset};
pub use register::{cmd_efuse_read, cmd_reg_dump, cmd_reg_read, cmd_reg_write};

use crate::transports::Sensor;

/// Command result type
pub type CmdResult = Result<(), Box<dyn std::error::Error>>;

/// Run `f` with an open session, closing it afterwards
pub fn with_session<F>(sensor: &Sensor, f: F) -> CmdResult
where
    F: FnOnce(&Sensor) -> CmdResult,
{
    let handle = sensor.open()?;
    log::debug!("Opened session {}", handle.id());
    let result = f(sensor);
    sensor.close(handle)?;
    result
}

/// Print `data` as a hex dump whose offsets start at `base`
pub fn print_hex_dump(base: u32, data: &[u8]) {
    for (i, line) in data.chunks(16).enumerate() {
        let hex: Vec<String> = line.iter().map(|b| format!("{:02X}", b)).collect();
        let ascii: String = line
            .iter()
            .map(|&b| if b.is_ascii_graphic() { b as char } else { '.' })
            .collect();
        println!(
            "{:06X}: {:<47}  {}",
            base as usize + i * 16,
            hex.join(" "),
            ascii
        );
    }
}
