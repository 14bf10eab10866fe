pub mod bme280;
pub mod ltr390;
pub mod ltr559;
pub mod mics6814;
pub mod sgp40;
pub mod tsl2591;
pub mod voc_index;

use log::{info, warn};

use crate::error::DriverError;

pub use bme280::{Bme280, Bme280Config, ThpReading};
pub use ltr390::{LightUvReading, Ltr390, Ltr390Config};
pub use ltr559::{Ltr559, Ltr559Config};
pub use mics6814::{GasReading, Mics6814};
pub use sgp40::Sgp40;
pub use tsl2591::{LuminosityReading, Tsl2591, Tsl2591Config};

/// Compare a part/chip ID against the expected value.
///
/// A mismatch is only logged: a later silicon revision usually stays
/// register compatible, so construction carries on.
pub(crate) fn check_part_id(sensor: &'static str, expected: u8, found: u8) -> bool {
    if found == expected {
        info!("{} part ID 0x{:02X} OK", sensor, found);
        true
    } else {
        warn!(
            "{}",
            DriverError::UnexpectedPartId {
                sensor,
                expected,
                found
            }
        );
        false
    }
}
