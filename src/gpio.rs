//! Read-only snapshots of the digital input lines.
//!
//! Lines are requested, read and released within a single call, every tick.
//! The request uses empty direction flags so the kernel leaves each line
//! exactly as configured — the agent never drives a line or flips its
//! direction — and the handle is dropped (releasing the lines) on every exit
//! path, including read failures.

use gpio_cdev::errors::Error as CdevError;
use gpio_cdev::{Chip, LineRequestFlags};
use thiserror::Error;

/// Logical names for the four monitored inputs, in request order.
pub const LINE_NAMES: [&str; 4] = ["IO0", "IO1", "IO2", "IO3"];

/// Consumer label shown in `gpioinfo` while a read is in flight.
const CONSUMER: &str = "rtk-collector";

#[derive(Debug, Error)]
pub enum GpioError {
    #[error("failed to open line controller {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: CdevError,
    },

    #[error("failed to request lines {offsets:?}: {source}")]
    Request {
        offsets: Vec<u32>,
        #[source]
        source: CdevError,
    },

    #[error("failed to read line values: {0}")]
    Read(#[source] CdevError),
}

/// Acquires the configured lines, reads them once in a batch and releases
/// the handle. Any failure returns an error for the caller to log; the
/// snapshot is all-or-nothing.
pub fn read_inputs(
    chip_path: &str,
    offsets: &[u32; 4],
) -> Result<Vec<(&'static str, i64)>, GpioError> {
    let mut chip = Chip::new(chip_path).map_err(|source| GpioError::Open {
        path: chip_path.to_string(),
        source,
    })?;

    let lines = chip.get_lines(offsets).map_err(|source| GpioError::Request {
        offsets: offsets.to_vec(),
        source,
    })?;

    let handle = lines
        .request(LineRequestFlags::empty(), &[0; 4], CONSUMER)
        .map_err(|source| GpioError::Request {
            offsets: offsets.to_vec(),
            source,
        })?;

    let raw = handle.get_values().map_err(GpioError::Read)?;

    Ok(LINE_NAMES
        .iter()
        .zip(raw)
        .map(|(name, value)| (*name, normalize(value)))
        .collect())
}

/// Raw line values are active-high bytes; anything non-zero is logical 1.
fn normalize(raw: u8) -> i64 {
    if raw != 0 {
        1
    } else {
        0
    }
}
