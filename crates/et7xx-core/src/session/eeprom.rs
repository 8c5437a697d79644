//! EEPROM write-enable tracking

use crate::error::{Error, Result, SequenceViolation};

/// Session view of the EEPROM write-enable latch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EepromState {
    /// Latch clear; reads allowed, writes and erases refused
    #[default]
    Idle,
    /// WREN sent; the next write or erase may proceed
    WriteEnabled,
    /// Page program cycle in progress
    Writing,
    /// Erase cycle in progress
    Erasing,
}

impl EepromState {
    /// Refuse a write or erase unless WREN was sent
    ///
    /// Runs before any bus traffic.
    pub fn check_modify(self) -> Result<()> {
        match self {
            Self::WriteEnabled => Ok(()),
            _ => {
                log::warn!("et7xx: eeprom write/erase without write enable");
                Err(Error::SequenceError(SequenceViolation::NotWriteEnabled))
            }
        }
    }

    /// Refuse a read while the latch is set
    pub fn check_read(self) -> Result<()> {
        match self {
            Self::Idle => Ok(()),
            _ => {
                log::warn!("et7xx: eeprom read while write enable is latched");
                Err(Error::SequenceError(SequenceViolation::WriteEnableLatched))
            }
        }
    }

    /// State a write or erase runs in
    pub fn busy(erase: bool) -> Self {
        if erase {
            Self::Erasing
        } else {
            Self::Writing
        }
    }

    /// Whether the session believes WEL is set
    pub fn is_write_enabled(self) -> bool {
        self == Self::WriteEnabled
    }
}

/// Write-controller gate in sensor register
/// [`REG_EEPROM_WRITE_CTRL`](crate::spi::REG_EEPROM_WRITE_CTRL)
pub const WRITE_CTRL_ENABLE: u8 = 0x01;

/// Register value with the gate bit set or cleared
pub fn write_ctrl_value(current: u8, enable: bool) -> u8 {
    if enable {
        current | WRITE_CTRL_ENABLE
    } else {
        current & !WRITE_CTRL_ENABLE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_refuses_modify() {
        assert_eq!(
            EepromState::Idle.check_modify(),
            Err(Error::SequenceError(SequenceViolation::NotWriteEnabled))
        );
        assert!(EepromState::WriteEnabled.check_modify().is_ok());
    }

    #[test]
    fn test_busy_states_refuse_everything() {
        for state in [EepromState::Writing, EepromState::Erasing] {
            assert!(state.check_modify().is_err());
            assert!(state.check_read().is_err());
        }
    }

    #[test]
    fn test_read_only_from_idle() {
        assert!(EepromState::Idle.check_read().is_ok());
        assert_eq!(
            EepromState::WriteEnabled.check_read(),
            Err(Error::SequenceError(SequenceViolation::WriteEnableLatched))
        );
    }

    #[test]
    fn test_write_ctrl_bit() {
        assert_eq!(write_ctrl_value(0xF0, true), 0xF1);
        assert_eq!(write_ctrl_value(0xF1, false), 0xF0);
    }
}
