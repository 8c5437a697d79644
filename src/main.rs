//! et7xx - ET7xx fingerprint sensor SPI tool
//!
//! Drives the sensor through the same session layer a userspace client
//! sees: registers, efuse, frames, the CIS block and the EEPROM sharing the
//! bus, plus power, reset and clock control.
//!
//! # Architecture
//!
//! The bus backend is picked at runtime with `-t`:
//! - **dummy** - in-memory emulator, handy for trying commands without
//!   hardware
//! - **linux_spi** - `/dev/spidevX.Y` nodes, with optional GPIO sleep and
//!   LDO lines from the `[gpio]` section of the configuration file
//!
//! Board settings (buffer size, clock limits, secure mode, identity
//! strings) come from the `[sensor]` section of `--config`.

mod cli;
mod commands;
mod transports;

use clap::Parser;
use cli::{CisCommands, Cli, Commands, EepromCommands, EfuseCommands, PowerState, RegCommands};
use et7xx_core::session::Config;
use std::path::Path;
use transports::Sensor;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    if let Commands::ListTransports = cli.command {
        commands::list_transports();
        return Ok(());
    }

    let config = load_config(cli.config.as_deref())?;
    let transport = cli
        .transport
        .as_deref()
        .ok_or_else(|| format!("No transport given (-t)\n\n{}", transports::transport_help()))?;
    let sensor = transports::open_sensor(transport, &config)?;

    run(&sensor, cli.command)
}

fn run(sensor: &Sensor, command: Commands) -> commands::CmdResult {
    match command {
        Commands::Info => commands::cmd_info(sensor),
        Commands::ListTransports => {
            commands::list_transports();
            Ok(())
        }
        Commands::Reg(subcmd) => match subcmd {
            RegCommands::Read { addr } => commands::cmd_reg_read(sensor, addr),
            RegCommands::Write { addr, value } => commands::cmd_reg_write(sensor, addr, value),
            RegCommands::Dump {
                start,
                len,
                backward,
            } => commands::cmd_reg_dump(sensor, start, len, backward),
        },
        Commands::Efuse(EfuseCommands::Read { addr, len }) => {
            commands::cmd_efuse_read(sensor, addr, len)
        }
        Commands::Frame { size, output } => commands::cmd_frame(sensor, size, &output),
        Commands::Cis(subcmd) => match subcmd {
            CisCommands::Read { addr } => commands::cmd_cis_read(sensor, addr),
            CisCommands::Write { addr, value } => commands::cmd_cis_write(sensor, addr, value),
            CisCommands::Frame { size, output } => commands::cmd_cis_frame(sensor, size, &output),
        },
        Commands::Eeprom(subcmd) => match subcmd {
            EepromCommands::Status => commands::cmd_eeprom_status(sensor),
            EepromCommands::Read {
                addr,
                len,
                output,
                fast,
            } => commands::cmd_eeprom_read(sensor, addr, len, output.as_deref(), fast),
            EepromCommands::Write {
                addr,
                input,
                non_secure,
            } => commands::cmd_eeprom_write(sensor, addr, &input, non_secure),
            EepromCommands::Erase {
                chip,
                sector,
                block,
            } => {
                let kind = commands::erase_kind(chip, sector, block)
                    .ok_or("Exactly one of --chip, --sector or --block is required")?;
                commands::cmd_eeprom_erase(sensor, kind)
            }
        },
        Commands::Power { state } => commands::cmd_power(sensor, state == PowerState::On),
        Commands::Reset => commands::cmd_reset(sensor),
        Commands::Clock { hz } => commands::cmd_clock(sensor, hz),
    }
}

/// Load the board configuration, or defaults when none is given
fn load_config(path: Option<&Path>) -> Result<Config, Box<dyn std::error::Error>> {
    match path {
        Some(path) => {
            let config = Config::load(path)?;
            log::info!("Loaded configuration from {}", path.display());
            Ok(config)
        }
        None => {
            log::debug!("No configuration file, using defaults");
            Ok(Config::default())
        }
    }
}
