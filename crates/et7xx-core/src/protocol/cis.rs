//! CIS (contact image sensor) access
//!
//! The CIS sits behind the sensor on the same bus and has its own register
//! file and frame path. Its opcodes never overlap the main sensor's, but
//! both share the session lock.

use core::sync::atomic::AtomicBool;

use super::frame;
use crate::bus::{Bus, BusTransport};
use crate::error::Result;
use crate::spi::Command;

/// Read a CIS register
pub fn read_cis_register<T: BusTransport + ?Sized>(bus: &mut Bus<'_, T>, addr: u8) -> Result<u8> {
    let mut value = [0u8; 1];
    bus.run(&Command::ReadCisRegister { addr }, &[], &mut value)?;
    Ok(value[0])
}

/// Write a CIS register
pub fn write_cis_register<T: BusTransport + ?Sized>(
    bus: &mut Bus<'_, T>,
    addr: u8,
    value: u8,
) -> Result<()> {
    bus.run(&Command::WriteCisRegister { addr, value }, &[], &mut [])
}

/// Trigger a CIS capture
pub fn pre_capture_cis<T: BusTransport + ?Sized>(bus: &mut Bus<'_, T>) -> Result<()> {
    frame::pre_capture(bus)
}

/// Read a frame from the CIS path, chunked like [`frame::get_frame`]
pub fn get_cis_frame<T: BusTransport + ?Sized>(
    bus: &mut Bus<'_, T>,
    out: &mut [u8],
    cancel: Option<&AtomicBool>,
) -> Result<()> {
    frame::read_chunked(bus, out, cancel, |len| Command::GetCisFrame { len })
}
