//! Protocol sequences
//!
//! Each function runs one logical operation against a [`Bus`](crate::bus::Bus).
//! None of them lock or check session state; the session layer does that
//! before handing out a bus.

pub mod cis;
pub mod eeprom;
pub mod frame;
pub mod register;

pub use cis::{get_cis_frame, pre_capture_cis, read_cis_register, write_cis_register};
pub use frame::{
    chunk_plan, get_frame, get_histogram, get_zone_average, pre_capture, transfer_command,
    write_frame, ChunkPlan,
};
pub use register::{
    burst_read, burst_write, read_efuse, read_register, write_efuse, write_register,
};
