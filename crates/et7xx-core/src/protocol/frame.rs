//! Frame buffer, zone average and histogram access
//!
//! A frame that does not fit the scratch buffer is fetched in
//! [`DIVISION_OF_IMAGE`] equal chunks, one exchange each, and reassembled
//! in order. Cancellation is only observed between chunks.
//!
//! All reads here assume [`pre_capture`] has completed; the device returns
//! stale data otherwise.

use core::sync::atomic::{AtomicBool, Ordering};

use crate::bus::{Bus, BusTransport};
use crate::error::{Error, Result};
use crate::spi::{Command, DIVISION_OF_IMAGE};

/// How a transfer is split across exchanges
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlan {
    /// Number of exchanges
    pub chunks: usize,
    /// Bytes per exchange
    pub chunk_len: usize,
}

/// Split `size` bytes for a bus that carries `capacity` bytes per exchange
///
/// Sizes that fit are sent in one exchange. Larger sizes must divide into
/// [`DIVISION_OF_IMAGE`] chunks that each fit, otherwise the request is
/// rejected with `InvalidArgument`.
pub fn chunk_plan(size: usize, capacity: usize) -> Result<ChunkPlan> {
    if size <= capacity {
        return Ok(ChunkPlan {
            chunks: 1,
            chunk_len: size,
        });
    }
    if size % DIVISION_OF_IMAGE != 0 || size / DIVISION_OF_IMAGE > capacity {
        log::debug!(
            "et7xx: frame of {} bytes cannot be split for capacity {}",
            size,
            capacity
        );
        return Err(Error::InvalidArgument);
    }
    Ok(ChunkPlan {
        chunks: DIVISION_OF_IMAGE,
        chunk_len: size / DIVISION_OF_IMAGE,
    })
}

/// Read `out.len()` bytes using one command per chunk
///
/// On error the contents of `out` are unspecified; callers that must not
/// expose partial data read into a scratch vector first.
pub fn read_chunked<T, F>(
    bus: &mut Bus<'_, T>,
    out: &mut [u8],
    cancel: Option<&AtomicBool>,
    command: F,
) -> Result<()>
where
    T: BusTransport + ?Sized,
    F: Fn(usize) -> Command,
{
    if out.is_empty() {
        return Ok(());
    }
    let plan = chunk_plan(out.len(), bus.capacity())?;

    for (i, chunk) in out.chunks_mut(plan.chunk_len).enumerate() {
        if i > 0 && cancel.is_some_and(|c| c.load(Ordering::Acquire)) {
            log::debug!("et7xx: frame read cancelled after {}/{} chunks", i, plan.chunks);
            return Err(Error::Interrupted {
                completed: i as u8,
                total: plan.chunks as u8,
            });
        }
        bus.run(&command(plan.chunk_len), &[], chunk)?;
    }
    Ok(())
}

/// Trigger an image capture
///
/// Must complete before frame, zone average or histogram data is
/// meaningful.
pub fn pre_capture<T: BusTransport + ?Sized>(bus: &mut Bus<'_, T>) -> Result<()> {
    bus.run(&Command::PreCapture, &[], &mut [])
}

/// Read a frame from the frame buffer
pub fn get_frame<T: BusTransport + ?Sized>(
    bus: &mut Bus<'_, T>,
    out: &mut [u8],
    cancel: Option<&AtomicBool>,
) -> Result<()> {
    read_chunked(bus, out, cancel, |len| Command::GetFrame { len })
}

/// Write a frame into the frame buffer
pub fn write_frame<T: BusTransport + ?Sized>(bus: &mut Bus<'_, T>, data: &[u8]) -> Result<()> {
    if data.is_empty() {
        return Ok(());
    }
    let plan = chunk_plan(data.len(), bus.capacity())?;
    for chunk in data.chunks(plan.chunk_len) {
        bus.run(&Command::WriteFrame { len: chunk.len() }, chunk, &mut [])?;
    }
    Ok(())
}

/// Read the zone average table
pub fn get_zone_average<T: BusTransport + ?Sized>(
    bus: &mut Bus<'_, T>,
    out: &mut [u8],
) -> Result<()> {
    if out.is_empty() {
        return Ok(());
    }
    bus.check_len(out.len())?;
    bus.run(&Command::GetZoneAverage { len: out.len() }, &[], out)
}

/// Read the histogram table
pub fn get_histogram<T: BusTransport + ?Sized>(
    bus: &mut Bus<'_, T>,
    out: &mut [u8],
) -> Result<()> {
    if out.is_empty() {
        return Ok(());
    }
    bus.check_len(out.len())?;
    bus.run(&Command::GetHistogram { len: out.len() }, &[], out)
}

/// Send a caller-built command and return the full-duplex response
pub fn transfer_command<T: BusTransport + ?Sized>(
    bus: &mut Bus<'_, T>,
    tx: &[u8],
    rx: &mut [u8],
) -> Result<()> {
    bus.raw(tx, rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_fits_single_exchange() {
        assert_eq!(
            chunk_plan(1024, 1024),
            Ok(ChunkPlan {
                chunks: 1,
                chunk_len: 1024
            })
        );
    }

    #[test]
    fn test_plan_splits_into_four() {
        assert_eq!(
            chunk_plan(4096, 1024),
            Ok(ChunkPlan {
                chunks: 4,
                chunk_len: 1024
            })
        );
        assert_eq!(
            chunk_plan(2048, 1024),
            Ok(ChunkPlan {
                chunks: 4,
                chunk_len: 512
            })
        );
    }

    #[test]
    fn test_plan_rejects_oversize_and_uneven() {
        assert_eq!(chunk_plan(4100, 1024), Err(Error::InvalidArgument));
        assert_eq!(chunk_plan(2050, 1024), Err(Error::InvalidArgument));
    }
}
