//! ET7xx SPI opcodes
//!
//! Sensor-side command bytes, the SPI NOR command set used on the EEPROM
//! chip select, and sensor constants tied to the command layer. Values are
//! fixed by the sensor firmware and must not change.

use bitflags::bitflags;

use super::address::AddressWidth;

// ============================================================================
// Register space
// ============================================================================

/// Register read, single byte
pub const OP_REG_R: u8 = 0x20;
/// Register read, burst (address increments)
pub const OP_REG_R_S: u8 = 0x22;
/// Register read, burst backward (address decrements)
pub const OP_REG_R_S_BW: u8 = 0x23;
/// Register write, single byte
pub const OP_REG_W: u8 = 0x24;
/// Register write, burst (address increments)
pub const OP_REG_W_S: u8 = 0x26;
/// Register write, burst backward (address decrements)
pub const OP_REG_W_S_BW: u8 = 0x27;

// ============================================================================
// Efuse
// ============================================================================

/// Efuse read
pub const OP_EF_R: u8 = 0x40;
/// Efuse write
pub const OP_EF_W: u8 = 0x42;

// ============================================================================
// Frame buffer and image statistics
// ============================================================================

/// Frame buffer read
pub const OP_FB_R: u8 = 0x50;
/// Frame buffer write
pub const OP_FB_W: u8 = 0x52;
/// Zone average read
pub const OP_ZAVG_R: u8 = 0x60;
/// Frame retrieval from the CIS path
pub const OP_GET_FRAME: u8 = 0x61;
/// Histogram read
pub const OP_HSTG_R: u8 = 0x62;
/// Pre-capture; shares its value with [`OP_HSTG_R`]
pub const OP_PRE_CAPTURE: u8 = 0x62;

// ============================================================================
// CIS (contact image sensor)
// ============================================================================

/// CIS register write
pub const OP_CIS_REG_W: u8 = 0x70;
/// CIS address read
pub const OP_CIS_ADDR_R: u8 = 0x71;

/// SPI NOR commands understood by the EEPROM behind the sensor
pub mod eeprom {
    /// Write Enable - required before any write/erase operation
    pub const WREN: u8 = 0x06;
    /// Write Disable - clears WEL bit in status register
    pub const WRDI: u8 = 0x04;
    /// Read Status Register
    pub const RDSR: u8 = 0x05;
    /// Read Data
    pub const READ: u8 = 0x03;
    /// Fast Read (one dummy byte after the address)
    pub const FAST_READ: u8 = 0x0B;
    /// Page Program
    pub const PP: u8 = 0x02;
    /// Sector Erase 4KB
    pub const SE: u8 = 0x20;
    /// Block Erase 64KB
    pub const BE: u8 = 0xD8;
    /// Chip Erase
    pub const CE: u8 = 0xC7;

    /// Program page size in bytes
    pub const PAGE_SIZE: usize = 256;
    /// Sector erase granularity in bytes
    pub const SECTOR_SIZE: u32 = 4 * 1024;
    /// Block erase granularity in bytes
    pub const BLOCK_SIZE: u32 = 64 * 1024;
}

bitflags! {
    /// EEPROM status register bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EepromStatus: u8 {
        /// Write In Progress / Busy
        const WIP  = 1 << 0;
        /// Write Enable Latch
        const WEL  = 1 << 1;
        /// Block Protect bit 0
        const BP0  = 1 << 2;
        /// Block Protect bit 1
        const BP1  = 1 << 3;
        /// Block Protect bit 2
        const BP2  = 1 << 4;
        /// Status Register Write Disable
        const SRWD = 1 << 7;
    }
}

/// Sensor register holding the EEPROM write-controller gate (bit 0)
pub const REG_EEPROM_WRITE_CTRL: u8 = 0x3A;

/// Bus clock used for slow-mode transfers
pub const SLOW_BAUD_RATE: u32 = 20_000_000;

/// Number of chunks a frame larger than the scratch buffer is split into
pub const DIVISION_OF_IMAGE: usize = 4;

/// Default scratch buffer size in bytes
pub const DEFAULT_BUFSIZ: usize = 1024;

/// Direction of the data phase of an opcode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Access {
    /// Data flows from the device
    Read,
    /// Data flows to the device
    Write,
}

/// How the device walks the address during the data phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Addressing {
    /// One unit at the given address
    Single,
    /// Address increments after each unit
    Burst,
    /// Address decrements after each unit
    BurstBackward,
    /// Streamed data, or no data phase, without an address
    Stream,
}

/// Region of the sensor an opcode targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    /// Internal register space
    Register,
    /// One-time programmable efuse array
    Efuse,
    /// Frame buffer
    FrameBuffer,
    /// Zone average table
    ZoneAverage,
    /// Histogram table (also the pre-capture trigger)
    Histogram,
    /// CIS registers and frame path
    Cis,
    /// SPI NOR EEPROM on its own chip select
    Eeprom,
}

/// Closed set of sensor opcodes with their static attributes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// [`OP_REG_R`]
    RegRead,
    /// [`OP_REG_R_S`]
    RegBurstRead,
    /// [`OP_REG_R_S_BW`]
    RegBurstReadBackward,
    /// [`OP_REG_W`]
    RegWrite,
    /// [`OP_REG_W_S`]
    RegBurstWrite,
    /// [`OP_REG_W_S_BW`]
    RegBurstWriteBackward,
    /// [`OP_EF_R`]
    EfuseRead,
    /// [`OP_EF_W`]
    EfuseWrite,
    /// [`OP_FB_R`]
    FrameBufferRead,
    /// [`OP_FB_W`]
    FrameBufferWrite,
    /// [`OP_ZAVG_R`]
    ZoneAverageRead,
    /// [`OP_GET_FRAME`]
    GetFrame,
    /// [`OP_HSTG_R`]
    HistogramRead,
    /// [`OP_PRE_CAPTURE`]
    PreCapture,
    /// [`OP_CIS_ADDR_R`]
    CisAddrRead,
    /// [`OP_CIS_REG_W`]
    CisRegWrite,
    /// [`eeprom::WREN`]
    EepromWriteEnable,
    /// [`eeprom::WRDI`]
    EepromWriteDisable,
    /// [`eeprom::RDSR`]
    EepromReadStatus,
    /// [`eeprom::READ`]
    EepromRead,
    /// [`eeprom::FAST_READ`]
    EepromFastRead,
    /// [`eeprom::PP`]
    EepromPageProgram,
    /// [`eeprom::SE`]
    EepromSectorErase,
    /// [`eeprom::BE`]
    EepromBlockErase,
    /// [`eeprom::CE`]
    EepromChipErase,
}

impl Opcode {
    /// Every opcode, in table order
    pub const ALL: [Opcode; 25] = [
        Self::RegRead,
        Self::RegBurstRead,
        Self::RegBurstReadBackward,
        Self::RegWrite,
        Self::RegBurstWrite,
        Self::RegBurstWriteBackward,
        Self::EfuseRead,
        Self::EfuseWrite,
        Self::FrameBufferRead,
        Self::FrameBufferWrite,
        Self::ZoneAverageRead,
        Self::GetFrame,
        Self::HistogramRead,
        Self::PreCapture,
        Self::CisAddrRead,
        Self::CisRegWrite,
        Self::EepromWriteEnable,
        Self::EepromWriteDisable,
        Self::EepromReadStatus,
        Self::EepromRead,
        Self::EepromFastRead,
        Self::EepromPageProgram,
        Self::EepromSectorErase,
        Self::EepromBlockErase,
        Self::EepromChipErase,
    ];

    /// The command byte sent on the wire
    pub const fn value(&self) -> u8 {
        match self {
            Self::RegRead => OP_REG_R,
            Self::RegBurstRead => OP_REG_R_S,
            Self::RegBurstReadBackward => OP_REG_R_S_BW,
            Self::RegWrite => OP_REG_W,
            Self::RegBurstWrite => OP_REG_W_S,
            Self::RegBurstWriteBackward => OP_REG_W_S_BW,
            Self::EfuseRead => OP_EF_R,
            Self::EfuseWrite => OP_EF_W,
            Self::FrameBufferRead => OP_FB_R,
            Self::FrameBufferWrite => OP_FB_W,
            Self::ZoneAverageRead => OP_ZAVG_R,
            Self::GetFrame => OP_GET_FRAME,
            Self::HistogramRead => OP_HSTG_R,
            Self::PreCapture => OP_PRE_CAPTURE,
            Self::CisAddrRead => OP_CIS_ADDR_R,
            Self::CisRegWrite => OP_CIS_REG_W,
            Self::EepromWriteEnable => eeprom::WREN,
            Self::EepromWriteDisable => eeprom::WRDI,
            Self::EepromReadStatus => eeprom::RDSR,
            Self::EepromRead => eeprom::READ,
            Self::EepromFastRead => eeprom::FAST_READ,
            Self::EepromPageProgram => eeprom::PP,
            Self::EepromSectorErase => eeprom::SE,
            Self::EepromBlockErase => eeprom::BE,
            Self::EepromChipErase => eeprom::CE,
        }
    }

    /// Direction of the data phase
    pub const fn access(&self) -> Access {
        match self {
            Self::RegWrite
            | Self::RegBurstWrite
            | Self::RegBurstWriteBackward
            | Self::EfuseWrite
            | Self::FrameBufferWrite
            | Self::PreCapture
            | Self::CisRegWrite
            | Self::EepromWriteEnable
            | Self::EepromWriteDisable
            | Self::EepromPageProgram
            | Self::EepromSectorErase
            | Self::EepromBlockErase
            | Self::EepromChipErase => Access::Write,
            _ => Access::Read,
        }
    }

    /// Address walking mode
    pub const fn addressing(&self) -> Addressing {
        match self {
            Self::RegRead
            | Self::RegWrite
            | Self::CisAddrRead
            | Self::CisRegWrite
            | Self::EepromSectorErase
            | Self::EepromBlockErase => Addressing::Single,
            Self::RegBurstRead
            | Self::RegBurstWrite
            | Self::EfuseRead
            | Self::EfuseWrite
            | Self::EepromRead
            | Self::EepromFastRead
            | Self::EepromPageProgram => Addressing::Burst,
            Self::RegBurstReadBackward | Self::RegBurstWriteBackward => Addressing::BurstBackward,
            _ => Addressing::Stream,
        }
    }

    /// Targeted region
    pub const fn region(&self) -> Region {
        match self {
            Self::RegRead
            | Self::RegBurstRead
            | Self::RegBurstReadBackward
            | Self::RegWrite
            | Self::RegBurstWrite
            | Self::RegBurstWriteBackward => Region::Register,
            Self::EfuseRead | Self::EfuseWrite => Region::Efuse,
            Self::FrameBufferRead | Self::FrameBufferWrite => Region::FrameBuffer,
            Self::ZoneAverageRead => Region::ZoneAverage,
            Self::HistogramRead | Self::PreCapture => Region::Histogram,
            Self::GetFrame | Self::CisAddrRead | Self::CisRegWrite => Region::Cis,
            Self::EepromWriteEnable
            | Self::EepromWriteDisable
            | Self::EepromReadStatus
            | Self::EepromRead
            | Self::EepromFastRead
            | Self::EepromPageProgram
            | Self::EepromSectorErase
            | Self::EepromBlockErase
            | Self::EepromChipErase => Region::Eeprom,
        }
    }

    /// Width of the address sent after the command byte
    ///
    /// Sensor opcodes use one byte, EEPROM opcodes three.
    pub const fn address_width(&self) -> AddressWidth {
        match (self.addressing(), self.region()) {
            (Addressing::Stream, _) => AddressWidth::None,
            (_, Region::Eeprom) => AddressWidth::ThreeByte,
            _ => AddressWidth::OneByte,
        }
    }

    /// Whether the opcode carries an address after the command byte
    pub const fn has_address(&self) -> bool {
        !matches!(self.addressing(), Addressing::Stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_values_match_wire_table() {
        let expected = [
            0x20, 0x22, 0x23, 0x24, 0x26, 0x27, 0x40, 0x42, 0x50, 0x52, 0x60, 0x61, 0x62, 0x62,
            0x71, 0x70, 0x06, 0x04, 0x05, 0x03, 0x0B, 0x02, 0x20, 0xD8, 0xC7,
        ];
        for (op, value) in Opcode::ALL.iter().zip(expected) {
            assert_eq!(op.value(), value, "{:?}", op);
        }
    }

    #[test]
    fn test_histogram_and_pre_capture_share_value() {
        assert_eq!(Opcode::HistogramRead.value(), Opcode::PreCapture.value());
        assert_ne!(
            Opcode::HistogramRead.access(),
            Opcode::PreCapture.access()
        );
    }

    #[test]
    fn test_burst_backward_variants() {
        assert_eq!(
            Opcode::RegBurstReadBackward.addressing(),
            Addressing::BurstBackward
        );
        assert_eq!(
            Opcode::RegBurstWriteBackward.addressing(),
            Addressing::BurstBackward
        );
        assert_eq!(Opcode::RegBurstWrite.access(), Access::Write);
        assert_eq!(Opcode::GetFrame.region(), Region::Cis);
    }

    #[test]
    fn test_eeprom_opcodes_are_region_tagged() {
        let eeprom_ops = Opcode::ALL
            .iter()
            .filter(|op| op.region() == Region::Eeprom)
            .count();
        assert_eq!(eeprom_ops, 9);
        // Sector erase shares 0x20 with the register read; only the region tells them apart
        assert_eq!(Opcode::EepromSectorErase.value(), Opcode::RegRead.value());
        assert_eq!(Opcode::RegRead.region(), Region::Register);

        assert_eq!(Opcode::EepromRead.address_width(), AddressWidth::ThreeByte);
        assert_eq!(Opcode::EepromBlockErase.address_width(), AddressWidth::ThreeByte);
        assert_eq!(Opcode::EepromChipErase.address_width(), AddressWidth::None);
        assert_eq!(Opcode::EepromReadStatus.access(), Access::Read);
        assert_eq!(Opcode::EepromPageProgram.access(), Access::Write);
        assert_eq!(Opcode::EfuseRead.address_width(), AddressWidth::OneByte);
    }
}
