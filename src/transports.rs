//! Transport registration and dispatch
//!
//! A transport string names the bus backend and its options, e.g.
//! `dummy` or `linux_spi:dev=/dev/spidev0.0,eeprom=/dev/spidev0.1`.
//! Opening one yields a sensor session built from the board configuration.

use et7xx_core::bus::BusTransport;
use et7xx_core::session::{Config, Et7xx};

/// Sensor driven through whichever backend was selected
pub type Sensor = Et7xx<Box<dyn BusTransport + Send>>;

/// Information about a transport
pub struct TransportInfo {
    /// Primary name (used for matching)
    pub name: &'static str,
    /// Alternative names/aliases
    pub aliases: &'static [&'static str],
    /// Short description
    pub description: &'static str,
}

/// Get information about all transports enabled at compile time
#[allow(unused_mut, clippy::vec_init_then_push)]
pub fn available_transports() -> Vec<TransportInfo> {
    let mut transports = Vec::new();

    #[cfg(feature = "dummy")]
    transports.push(TransportInfo {
        name: "dummy",
        aliases: &[],
        description: "In-memory sensor emulator for testing",
    });

    #[cfg(feature = "linux-spi")]
    transports.push(TransportInfo {
        name: "linux_spi",
        aliases: &["linux-spi", "spidev"],
        description: "Linux spidev (dev=/dev/spidevX.Y,eeprom=/dev/spidevX.Z,spispeed=<kHz>,mode=<0-3>)",
    });

    transports
}

/// Generate help text listing all available transports
pub fn transport_help() -> String {
    let transports = available_transports();

    if transports.is_empty() {
        return "No transports available (recompile with transport features enabled)".to_string();
    }

    let mut help = String::from("Available transports:\n");
    for t in &transports {
        help.push_str(&format!("  {:12} - {}\n", t.name, t.description));
        if !t.aliases.is_empty() {
            help.push_str(&format!("  {:12}   aliases: {}\n", "", t.aliases.join(", ")));
        }
    }
    help
}

/// Resolve a transport name or alias to its primary name
pub fn find_transport(name: &str) -> Option<&'static str> {
    available_transports()
        .into_iter()
        .find(|t| t.name == name || t.aliases.contains(&name))
        .map(|t| t.name)
}

/// Parse a transport string into name and options
///
/// Format: "name" or "name:option1=value1,option2=value2"
pub fn parse_transport_string(s: &str) -> (&str, Vec<(&str, &str)>) {
    if let Some((name, opts)) = s.split_once(':') {
        let options: Vec<_> = opts
            .split(',')
            .filter_map(|opt| opt.split_once('='))
            .collect();
        (name, options)
    } else {
        (s, Vec::new())
    }
}

/// Open the named transport and wrap it in a sensor session
#[allow(unused_variables)]
pub fn open_sensor(transport: &str, config: &Config) -> Result<Sensor, Box<dyn std::error::Error>> {
    let (name, options) = parse_transport_string(transport);

    let canonical_name = match find_transport(name) {
        Some(n) => n,
        None => return Err(unknown_transport_error(name)),
    };

    let sensor_config = config.sensor.clone();

    match canonical_name {
        #[cfg(feature = "dummy")]
        "dummy" => {
            use et7xx_dummy::{DummyPin, DummyRail, DummySensor};

            log::info!("Opening dummy sensor...");
            let bus: Box<dyn BusTransport + Send> = Box::new(DummySensor::new_default());
            Ok(Et7xx::new(bus, sensor_config)
                .with_power_rail(DummyRail::new())
                .with_sleep_pin(DummyPin::new()))
        }

        #[cfg(feature = "linux-spi")]
        "linux_spi" => {
            log::info!("Opening Linux SPI transport...");

            let bus = et7xx_linux_spi::open_linux_spi(&options).map_err(|e| {
                format!(
                    "Failed to open Linux SPI device: {}\n\
                     Make sure the device exists and you have read/write permissions.",
                    e
                )
            })?;
            let sensor = Et7xx::new(bus, sensor_config);
            attach_gpio(sensor, config)
        }

        _ => Err(unknown_transport_error(name)),
    }
}

/// Hand the configured GPIO lines to the session
#[cfg(feature = "linux-spi")]
fn attach_gpio(sensor: Sensor, config: &Config) -> Result<Sensor, Box<dyn std::error::Error>> {
    let Some(gpio) = &config.gpio else {
        return Ok(sensor);
    };

    #[cfg(feature = "linux-gpio")]
    {
        let lines = et7xx_linux_gpio::GpioLines::open(gpio, true)?;
        let mut sensor = sensor;
        if let Some(ldo) = lines.ldo {
            sensor = sensor.with_power_rail(ldo);
        }
        if let Some(sleep) = lines.sleep {
            sensor = sensor.with_sleep_pin(sleep);
        }
        Ok(sensor)
    }

    #[cfg(not(feature = "linux-gpio"))]
    {
        log::warn!(
            "Ignoring [gpio] section for {} (built without linux-gpio)",
            gpio.chip
        );
        Ok(sensor)
    }
}

fn unknown_transport_error(name: &str) -> Box<dyn std::error::Error> {
    let mut msg = format!("Unknown transport: {}\n\n", name);
    msg.push_str(&transport_help());
    msg.push_str("\nUse 'et7xx list-transports' for more details");
    msg.into()
}
