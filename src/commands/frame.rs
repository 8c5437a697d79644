//! Frame capture command

use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use super::{with_session, CmdResult};
use crate::transports::Sensor;

/// Spinner shown while a capture is on the bus
pub(super) fn capture_spinner(what: &str) -> Result<ProgressBar, Box<dyn std::error::Error>> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
    pb.set_message(what.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    Ok(pb)
}

/// Save captured bytes to `output`
pub(super) fn save_frame(output: &Path, data: &[u8]) -> CmdResult {
    let mut file = File::create(output)?;
    file.write_all(data)?;
    println!("Wrote {} bytes to {:?}", data.len(), output);
    Ok(())
}

/// Pre-capture and read a frame of `size` bytes into `output`
pub fn cmd_frame(sensor: &Sensor, size: usize, output: &Path) -> CmdResult {
    with_session(sensor, |sensor| {
        let pb = capture_spinner("Capturing frame")?;

        let data = sensor.pre_capture().and_then(|()| sensor.get_frame(size));
        match &data {
            Ok(_) => pb.finish_with_message("Capture complete"),
            Err(_) => pb.abandon_with_message("Capture failed"),
        }

        save_frame(output, &data?)
    })
}
