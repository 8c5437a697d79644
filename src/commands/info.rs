//! Info and list commands

use super::{with_session, CmdResult};
use crate::transports::{available_transports, Sensor};

/// Print identity strings and bus settings
pub fn cmd_info(sensor: &Sensor) -> CmdResult {
    let config = sensor.config();

    println!("Sensor Information");
    println!("==================");
    println!();
    println!("Vendor:          {}", config.vendor);
    println!("Chip ID:         {}", config.chip_id);
    if !config.sensor_position.is_empty() {
        println!("Position:        {}", config.sensor_position);
    }
    if let Some(regulator) = &config.regulator {
        println!("Regulator:       {}", regulator);
    }
    println!(
        "Secure mode:     {}",
        if config.secure_mode { "yes" } else { "no" }
    );
    println!("Buffer size:     {} bytes", config.bufsiz);

    with_session(sensor, |sensor| {
        let model = sensor.model_info();
        println!(
            "Model:           {}",
            if model.is_empty() { "(unset)" } else { model }
        );
        println!("Sensor type:     0x{:08X}", sensor.sensor_type());
        println!("SPI value:       0x{:08X}", sensor.spi_value());
        println!(
            "SPI clock:       {} Hz (max {} Hz)",
            sensor.spi_clock_hz(),
            config.max_spi_clock_hz
        );
        println!(
            "Powered:         {}",
            if sensor.is_powered() { "yes" } else { "no" }
        );
        Ok(())
    })
}

/// List all transports compiled in
pub fn list_transports() {
    println!("Supported transports:");
    println!();
    for t in available_transports() {
        println!("  {:10} - {}", t.name, t.description);
    }
}
