//! Userspace transfer records and request decoding
//!
//! Userspace drives the sensor with arrays of [`IoTransfer`] records. The
//! `opcode` of each record is an `FP_*` request number, decoded once into
//! a [`Request`] and then executed by the session.

use crate::spi::Direction;

/// `FP_*` request numbers
pub mod ioctl {
    /// Single register read
    pub const FP_REGISTER_READ: u8 = 0x01;
    /// Single register write
    pub const FP_REGISTER_WRITE: u8 = 0x02;
    /// CIS frame read
    pub const FP_GET_CIS_FRAME: u8 = 0x03;
    /// Pulse the sleep pin
    pub const FP_SENSOR_RESET: u8 = 0x04;
    /// Switch the supply (`len` != 0 means on)
    pub const FP_POWER_CONTROL: u8 = 0x05;
    /// Change the bus clock (`speed_hz`)
    pub const FP_SET_SPI_CLOCK: u8 = 0x06;
    /// Drive the sleep pin (`len` is the level)
    pub const FP_RESET_CONTROL: u8 = 0x07;
    /// CIS register read
    pub const FP_CIS_REGISTER_READ: u8 = 0x08;
    /// CIS register write
    pub const FP_CIS_REGISTER_WRITE: u8 = 0x09;
    /// CIS pre-capture
    pub const FP_CIS_PRE_CAPTURE: u8 = 0x0A;
    /// Raw command pass-through
    pub const FP_TRANSFER_COMMAND: u8 = 0x0D;
    /// Efuse read (non-secure builds)
    pub const FP_EFUSE_READ: u8 = 0x10;
    /// Gate the bus clock (secure builds)
    pub const FP_DISABLE_SPI_CLOCK: u8 = 0x10;
    /// Efuse write (non-secure builds)
    pub const FP_EFUSE_WRITE: u8 = 0x11;
    /// CPU boost request (secure builds)
    pub const FP_CPU_SPEEDUP: u8 = 0x11;
    /// Frame read
    pub const FP_GET_IMG: u8 = 0x12;
    /// Frame write
    pub const FP_WRITE_IMG: u8 = 0x13;
    /// Zone average read (non-secure builds)
    pub const FP_GET_ZAVG: u8 = 0x14;
    /// Select the sensor variant (secure builds)
    pub const FP_SET_SENSOR_TYPE: u8 = 0x14;
    /// Histogram read
    pub const FP_GET_HSTG: u8 = 0x15;
    /// Report the configured SPI value
    pub const FP_SPI_VALUE: u8 = 0x1A;
    /// Report the model string
    pub const FP_MODEL_INFO: u8 = 0x1F;
    /// Forward burst register read
    pub const FP_REGISTER_BREAD: u8 = 0x20;
    /// Forward burst register write
    pub const FP_REGISTER_BWRITE: u8 = 0x21;
    /// Backward burst register read
    pub const FP_REGISTER_BREAD_BACKWARD: u8 = 0x24;
    /// Backward burst register write
    pub const FP_REGISTER_BWRITE_BACKWARD: u8 = 0x25;
    /// EEPROM read
    pub const FP_EEPROM_READ: u8 = 0x80;
    /// EEPROM fast read
    pub const FP_EEPROM_HIGH_SPEED_READ: u8 = 0x81;
    /// EEPROM page program
    pub const FP_EEPROM_WRITE: u8 = 0x82;
    /// EEPROM chip erase
    pub const FP_EEPROM_CHIP_ERASE: u8 = 0x83;
    /// EEPROM sector erase
    pub const FP_EEPROM_SECTOR_ERASE: u8 = 0x84;
    /// EEPROM block erase
    pub const FP_EEPROM_BLOCK_ERASE: u8 = 0x85;
    /// EEPROM write enable
    pub const FP_EEPROM_WREN: u8 = 0x86;
    /// EEPROM write disable
    pub const FP_EEPROM_WRDI: u8 = 0x87;
    /// EEPROM status read
    pub const FP_EEPROM_RSDR: u8 = 0x88;
    /// EEPROM write outside the trusted environment
    pub const FP_EEPROM_WRITE_IN_NON_TZ: u8 = 0x8A;
    /// Interrupt trigger read
    pub const INT_TRIGGER_READ: u8 = 0xA6;
    /// Interrupt trigger polling
    pub const INT_TRIGGER_POLLING: u8 = 0xA7;
    /// Numbers userspace must not use
    pub const FP_IOCTL_RESERVED: [u8; 8] = [0x1B, 0x1C, 0xA4, 0xA5, 0xA8, 0x16, 0x17, 0x19];
}

/// Largest record count per message
///
/// 511 records of 32 bytes is the most that fits the 14-bit ioctl size
/// field.
pub const MAX_TRANSFERS: usize = 511;

/// One transfer record
///
/// Buffer layout depends on the request; see [`Request`].
#[derive(Debug, Default)]
pub struct IoTransfer<'a> {
    /// Bytes from userspace
    pub tx: Option<&'a [u8]>,
    /// Bytes returned to userspace
    pub rx: Option<&'a mut [u8]>,
    /// Request-specific length
    pub len: u32,
    /// Clock override for this record, 0 keeps the session clock
    pub speed_hz: u32,
    /// Delay after the record completes
    pub delay_usecs: u16,
    /// Word size, only 0 and 8 are supported
    pub bits_per_word: u8,
    /// Release the bus after this record
    ///
    /// In an atomic message the device lock is dropped once this record
    /// completes, so other callers may run before the next record. Each
    /// record is already its own chip select cycle.
    pub cs_change: bool,
    /// `FP_*` request number
    pub opcode: u8,
}

impl<'a> IoTransfer<'a> {
    /// Empty record for `opcode`
    pub fn new(opcode: u8) -> Self {
        Self {
            opcode,
            ..Default::default()
        }
    }

    /// Attach the userspace source buffer
    pub fn tx(mut self, tx: &'a [u8]) -> Self {
        self.tx = Some(tx);
        self
    }

    /// Attach the userspace destination buffer
    pub fn rx(mut self, rx: &'a mut [u8]) -> Self {
        self.rx = Some(rx);
        self
    }

    /// Set the length field
    pub fn len(mut self, len: u32) -> Self {
        self.len = len;
        self
    }

    /// Set the clock override
    pub fn speed_hz(mut self, hz: u32) -> Self {
        self.speed_hz = hz;
        self
    }

    /// Set the trailing delay
    pub fn delay_usecs(mut self, us: u16) -> Self {
        self.delay_usecs = us;
        self
    }

    /// Set the word size
    pub fn bits_per_word(mut self, bits: u8) -> Self {
        self.bits_per_word = bits;
        self
    }

    /// Mark the end of a locked run
    pub fn cs_change(mut self, change: bool) -> Self {
        self.cs_change = change;
        self
    }
}

/// Split a message into the runs executed under one lock
///
/// A run ends after every record with `cs_change` set; the last run ends
/// with the message.
pub(crate) fn locked_runs<'m, 'a>(
    transfers: &'m mut [IoTransfer<'a>],
) -> impl Iterator<Item = &'m mut [IoTransfer<'a>]> {
    transfers.split_inclusive_mut(|xfer| xfer.cs_change)
}

/// Decoded request
///
/// Buffer conventions (`len` is the record's length field):
///
/// | Request | tx | rx |
/// |---|---|---|
/// | register / CIS read | `[addr]` | `[value]` |
/// | register / CIS write | `[addr, value]` | |
/// | burst / efuse read | `[addr]` | `len` bytes |
/// | burst / efuse write | `[addr, data; len]` | |
/// | frame, zavg, histogram, CIS frame | | `len` bytes |
/// | write frame | `len` bytes | |
/// | transfer command | `len` bytes | `len` bytes |
/// | EEPROM read | 3-byte address | `len` bytes |
/// | EEPROM write | 3-byte address, `len` bytes | |
/// | EEPROM sector / block erase | 3-byte address | |
/// | EEPROM status | | `[status]` |
/// | SPI value | | 4 bytes, little endian |
/// | model info | | model string |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    /// Single register read
    RegisterRead,
    /// Single register write
    RegisterWrite,
    /// Burst register read
    BurstRead(Direction),
    /// Burst register write
    BurstWrite(Direction),
    /// Efuse read
    EfuseRead,
    /// Efuse write
    EfuseWrite,
    /// Frame read
    GetFrame,
    /// Frame write
    WriteFrame,
    /// Zone average read
    GetZoneAverage,
    /// Histogram read
    GetHistogram,
    /// CIS register read
    CisRegisterRead,
    /// CIS register write
    CisRegisterWrite,
    /// CIS pre-capture
    CisPreCapture,
    /// CIS frame read
    GetCisFrame,
    /// Raw command pass-through
    TransferCommand,
    /// EEPROM read
    EepromRead,
    /// EEPROM fast read
    EepromFastRead,
    /// EEPROM write
    EepromWrite,
    /// EEPROM write through the non-secure path
    EepromWriteNonSecure,
    /// EEPROM chip erase
    EepromChipErase,
    /// EEPROM sector erase
    EepromSectorErase,
    /// EEPROM block erase
    EepromBlockErase,
    /// EEPROM write enable
    EepromWriteEnable,
    /// EEPROM write disable
    EepromWriteDisable,
    /// EEPROM status read
    EepromReadStatus,
    /// Pulse the sleep pin
    SensorReset,
    /// Switch the supply
    PowerControl,
    /// Change the bus clock
    SetSpiClock,
    /// Drive the sleep pin
    ResetControl,
    /// Gate the bus clock
    DisableSpiClock,
    /// Select the sensor variant
    SetSensorType,
    /// Report the SPI value
    SpiValue,
    /// Report the model string
    ModelInfo,
    /// CPU boost (not supported)
    CpuSpeedup,
    /// Interrupt delivery (not supported)
    IntTrigger(u8),
    /// Reserved number
    Reserved(u8),
}

impl Request {
    /// Decode a request number
    ///
    /// In secure mode the data path belongs to the trusted environment: the
    /// SPI data requests do not exist and `0x10`, `0x11` and `0x14` take
    /// their control meanings. Unknown numbers decode to `None`.
    pub fn decode(opcode: u8, secure: bool) -> Option<Self> {
        use ioctl::*;

        let control = match opcode {
            FP_SENSOR_RESET => Some(Self::SensorReset),
            FP_POWER_CONTROL => Some(Self::PowerControl),
            FP_SET_SPI_CLOCK => Some(Self::SetSpiClock),
            FP_RESET_CONTROL => Some(Self::ResetControl),
            FP_SPI_VALUE => Some(Self::SpiValue),
            FP_MODEL_INFO => Some(Self::ModelInfo),
            INT_TRIGGER_READ | INT_TRIGGER_POLLING => Some(Self::IntTrigger(opcode)),
            n if FP_IOCTL_RESERVED.contains(&n) => Some(Self::Reserved(n)),
            _ => None,
        };
        if control.is_some() {
            return control;
        }

        if secure {
            return match opcode {
                FP_DISABLE_SPI_CLOCK => Some(Self::DisableSpiClock),
                FP_CPU_SPEEDUP => Some(Self::CpuSpeedup),
                FP_SET_SENSOR_TYPE => Some(Self::SetSensorType),
                FP_GET_HSTG => Some(Self::Reserved(opcode)),
                _ => None,
            };
        }

        let request = match opcode {
            FP_REGISTER_READ => Self::RegisterRead,
            FP_REGISTER_WRITE => Self::RegisterWrite,
            FP_REGISTER_BREAD => Self::BurstRead(Direction::Forward),
            FP_REGISTER_BREAD_BACKWARD => Self::BurstRead(Direction::Backward),
            FP_REGISTER_BWRITE => Self::BurstWrite(Direction::Forward),
            FP_REGISTER_BWRITE_BACKWARD => Self::BurstWrite(Direction::Backward),
            FP_EFUSE_READ => Self::EfuseRead,
            FP_EFUSE_WRITE => Self::EfuseWrite,
            FP_GET_IMG => Self::GetFrame,
            FP_WRITE_IMG => Self::WriteFrame,
            FP_GET_ZAVG => Self::GetZoneAverage,
            FP_GET_HSTG => Self::GetHistogram,
            FP_CIS_REGISTER_READ => Self::CisRegisterRead,
            FP_CIS_REGISTER_WRITE => Self::CisRegisterWrite,
            FP_CIS_PRE_CAPTURE => Self::CisPreCapture,
            FP_GET_CIS_FRAME => Self::GetCisFrame,
            FP_TRANSFER_COMMAND => Self::TransferCommand,
            FP_EEPROM_READ => Self::EepromRead,
            FP_EEPROM_HIGH_SPEED_READ => Self::EepromFastRead,
            FP_EEPROM_WRITE => Self::EepromWrite,
            FP_EEPROM_CHIP_ERASE => Self::EepromChipErase,
            FP_EEPROM_SECTOR_ERASE => Self::EepromSectorErase,
            FP_EEPROM_BLOCK_ERASE => Self::EepromBlockErase,
            FP_EEPROM_WREN => Self::EepromWriteEnable,
            FP_EEPROM_WRDI => Self::EepromWriteDisable,
            FP_EEPROM_RSDR => Self::EepromReadStatus,
            FP_EEPROM_WRITE_IN_NON_TZ => Self::EepromWriteNonSecure,
            _ => return None,
        };
        Some(request)
    }

    /// Requests that are recognised but never executed
    pub fn is_unsupported(&self) -> bool {
        matches!(
            self,
            Self::CpuSpeedup | Self::IntTrigger(_) | Self::Reserved(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ioctl::*;
    use std::vec;
    use std::vec::Vec;

    #[test]
    fn test_shared_numbers_follow_secure_mode() {
        assert_eq!(Request::decode(0x10, false), Some(Request::EfuseRead));
        assert_eq!(Request::decode(0x11, false), Some(Request::EfuseWrite));
        assert_eq!(Request::decode(0x14, false), Some(Request::GetZoneAverage));
        assert_eq!(Request::decode(0x10, true), Some(Request::DisableSpiClock));
        assert_eq!(Request::decode(0x11, true), Some(Request::CpuSpeedup));
        assert_eq!(Request::decode(0x14, true), Some(Request::SetSensorType));
    }

    #[test]
    fn test_secure_mode_hides_data_requests() {
        assert_eq!(Request::decode(FP_REGISTER_READ, true), None);
        assert_eq!(Request::decode(FP_EEPROM_WRITE, true), None);
        assert_eq!(Request::decode(FP_GET_IMG, true), None);
        assert_eq!(Request::decode(FP_SENSOR_RESET, true), Some(Request::SensorReset));
    }

    #[test]
    fn test_burst_directions() {
        assert_eq!(
            Request::decode(FP_REGISTER_BREAD_BACKWARD, false),
            Some(Request::BurstRead(Direction::Backward))
        );
        assert_eq!(
            Request::decode(FP_REGISTER_BWRITE, false),
            Some(Request::BurstWrite(Direction::Forward))
        );
    }

    #[test]
    fn test_unsupported_requests() {
        let trig = Request::decode(INT_TRIGGER_POLLING, false).unwrap();
        assert!(trig.is_unsupported());
        let reserved = Request::decode(0x1B, false).unwrap();
        assert_eq!(reserved, Request::Reserved(0x1B));
        assert!(reserved.is_unsupported());
        assert!(!Request::RegisterRead.is_unsupported());
        assert_eq!(Request::decode(0xFF, false), None);
    }

    #[test]
    fn test_locked_runs_end_at_cs_change() {
        let mut transfers = [
            IoTransfer::new(FP_REGISTER_READ),
            IoTransfer::new(FP_REGISTER_READ).cs_change(true),
            IoTransfer::new(FP_REGISTER_READ),
            IoTransfer::new(FP_REGISTER_READ),
            IoTransfer::new(FP_REGISTER_READ).cs_change(true),
        ];
        let runs: Vec<usize> = locked_runs(&mut transfers).map(|run| run.len()).collect();
        assert_eq!(runs, vec![2, 3]);

        let mut plain = [IoTransfer::new(FP_REGISTER_READ), IoTransfer::new(FP_REGISTER_READ)];
        assert_eq!(locked_runs(&mut plain).count(), 1);
        let mut none: [IoTransfer<'_>; 0] = [];
        assert_eq!(locked_runs(&mut none).count(), 0);
    }

    #[test]
    fn test_transfer_builder() {
        let mut rx = [0u8; 4];
        let xfer = IoTransfer::new(FP_SPI_VALUE).rx(&mut rx).len(4).speed_hz(1_000_000);
        assert_eq!(xfer.opcode, FP_SPI_VALUE);
        assert_eq!(xfer.len, 4);
        assert!(xfer.tx.is_none());
        assert_eq!(xfer.rx.as_deref().map(|r| r.len()), Some(4));
    }
}
