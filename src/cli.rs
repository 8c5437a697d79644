//! CLI argument parsing

use clap::{ArgGroup, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Parse a string as a hex or decimal u32
fn parse_hex_u32(s: &str) -> Result<u32, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u32>().map_err(|e| format!("Invalid number: {}", e))
    }
}

/// Parse a register address or value (hex or decimal, 0-255)
fn parse_hex_u8(s: &str) -> Result<u8, String> {
    let n = parse_hex_u32(s)?;
    u8::try_from(n).map_err(|_| format!("Value out of range (0-255): {}", s))
}

fn parse_hex_usize(s: &str) -> Result<usize, String> {
    parse_hex_u32(s).map(|n| n as usize)
}

#[derive(Parser)]
#[command(name = "et7xx")]
#[command(author, version, about = "ET7xx fingerprint sensor SPI tool", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Board configuration file (TOML, [sensor] and [gpio] sections)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Transport to use, e.g. "dummy" or "linux_spi:dev=/dev/spidev0.0"
    #[arg(short, long, global = true)]
    pub transport: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show sensor identity and session settings
    Info,

    /// List supported transports
    ListTransports,

    /// Sensor register operations
    #[command(subcommand)]
    Reg(RegCommands),

    /// Efuse operations
    #[command(subcommand)]
    Efuse(EfuseCommands),

    /// Capture a frame to a file
    Frame {
        /// Frame size in bytes (hex or decimal)
        #[arg(value_parser = parse_hex_usize)]
        size: usize,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// CIS sensor operations
    #[command(subcommand)]
    Cis(CisCommands),

    /// EEPROM operations
    #[command(subcommand)]
    Eeprom(EepromCommands),

    /// Switch the sensor supply
    Power {
        /// Desired state
        state: PowerState,
    },

    /// Pulse the sleep pin to reset the sensor
    Reset,

    /// Set the bus clock
    Clock {
        /// Clock in Hz
        #[arg(value_parser = parse_hex_u32)]
        hz: u32,
    },
}

/// Supply state for the power command
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum PowerState {
    On,
    Off,
}

/// Register subcommands
#[derive(Subcommand)]
pub enum RegCommands {
    /// Read a single register
    Read {
        /// Register address (hex or decimal)
        #[arg(value_parser = parse_hex_u8)]
        addr: u8,
    },

    /// Write a single register
    Write {
        /// Register address (hex or decimal)
        #[arg(value_parser = parse_hex_u8)]
        addr: u8,

        /// Value to write (hex or decimal)
        #[arg(value_parser = parse_hex_u8)]
        value: u8,
    },

    /// Burst read a register range and print it as a hex dump
    Dump {
        /// First register
        #[arg(long, default_value = "0", value_parser = parse_hex_u8)]
        start: u8,

        /// Number of registers
        #[arg(long, default_value = "256", value_parser = parse_hex_usize)]
        len: usize,

        /// Walk addresses downwards from `start`
        #[arg(long)]
        backward: bool,
    },
}

/// Efuse subcommands
#[derive(Subcommand)]
pub enum EfuseCommands {
    /// Read efuse bytes
    Read {
        /// First efuse address
        #[arg(value_parser = parse_hex_u8)]
        addr: u8,

        /// Number of bytes
        #[arg(default_value = "1", value_parser = parse_hex_usize)]
        len: usize,
    },
}

/// CIS subcommands
#[derive(Subcommand)]
pub enum CisCommands {
    /// Read a CIS register
    Read {
        /// Register address (hex or decimal)
        #[arg(value_parser = parse_hex_u8)]
        addr: u8,
    },

    /// Write a CIS register
    Write {
        /// Register address (hex or decimal)
        #[arg(value_parser = parse_hex_u8)]
        addr: u8,

        /// Value to write (hex or decimal)
        #[arg(value_parser = parse_hex_u8)]
        value: u8,
    },

    /// Capture a CIS frame to a file
    Frame {
        /// Frame size in bytes (hex or decimal)
        #[arg(value_parser = parse_hex_usize)]
        size: usize,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },
}

/// EEPROM subcommands
#[derive(Subcommand)]
pub enum EepromCommands {
    /// Show the status register
    Status,

    /// Read EEPROM contents
    Read {
        /// Start address (hex or decimal)
        #[arg(value_parser = parse_hex_u32)]
        addr: u32,

        /// Number of bytes (hex or decimal)
        #[arg(value_parser = parse_hex_usize)]
        len: usize,

        /// Output file path (hex dump to stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Use FAST_READ instead of READ
        #[arg(long)]
        fast: bool,
    },

    /// Write a file to the EEPROM
    Write {
        /// Start address (hex or decimal)
        #[arg(value_parser = parse_hex_u32)]
        addr: u32,

        /// Input file path
        #[arg(short, long)]
        input: PathBuf,

        /// Open the write-controller gate for the duration of the write
        #[arg(long)]
        non_secure: bool,
    },

    /// Erase the whole chip, a sector or a block
    #[command(group(
        ArgGroup::new("region")
            .required(true)
            .args(["chip", "sector", "block"]),
    ))]
    Erase {
        /// Erase the whole chip
        #[arg(long)]
        chip: bool,

        /// Erase the 4 KiB sector at ADDR
        #[arg(long, value_name = "ADDR", value_parser = parse_hex_u32)]
        sector: Option<u32>,

        /// Erase the 64 KiB block at ADDR
        #[arg(long, value_name = "ADDR", value_parser = parse_hex_u32)]
        block: Option<u32>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_numbers() {
        assert_eq!(parse_hex_u32("0x1000"), Ok(0x1000));
        assert_eq!(parse_hex_u32("4096"), Ok(4096));
        assert_eq!(parse_hex_u8("0xFF"), Ok(0xFF));
        assert!(parse_hex_u8("0x100").is_err());
        assert!(parse_hex_u32("zz").is_err());
    }

    #[test]
    fn test_erase_requires_one_region() {
        assert!(Cli::try_parse_from(["et7xx", "eeprom", "erase"]).is_err());
        assert!(Cli::try_parse_from(["et7xx", "eeprom", "erase", "--chip", "--sector", "0"]).is_err());

        let cli = Cli::try_parse_from(["et7xx", "-t", "dummy", "eeprom", "erase", "--sector", "0x1000"])
            .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Eeprom(EepromCommands::Erase {
                chip: false,
                sector: Some(0x1000),
                block: None,
            })
        ));
        assert_eq!(cli.transport.as_deref(), Some("dummy"));
    }
}
