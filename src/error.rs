/// Error types shared by the bus, drivers and board aggregators
use std::fmt;
use std::path::PathBuf;

use embedded_hal::i2c::ErrorKind;
use thiserror::Error;

/// What part of a device a failed transfer was addressing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusTarget {
    Register(u8),
    Raw,
}

impl fmt::Display for BusTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BusTarget::Register(register) => write!(f, "register 0x{:02X}", register),
            BusTarget::Raw => write!(f, "raw transfer"),
        }
    }
}

/// A failed I2C transaction (NAK, arbitration loss, bus fault)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("I2C device 0x{address:02X}, {target}: {kind}")]
pub struct BusError {
    pub address: u8,
    pub target: BusTarget,
    pub kind: ErrorKind,
}

/// Failure raised by a single sensor driver
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("{sensor}: {source}")]
    Bus {
        sensor: &'static str,
        #[source]
        source: BusError,
    },
    #[error("{sensor}: CRC mismatch (expected 0x{expected:02X}, got 0x{actual:02X})")]
    Crc {
        sensor: &'static str,
        expected: u8,
        actual: u8,
    },
    #[error("{sensor}: unexpected part ID 0x{found:02X} (expected 0x{expected:02X})")]
    UnexpectedPartId {
        sensor: &'static str,
        expected: u8,
        found: u8,
    },
}

impl DriverError {
    pub fn bus(sensor: &'static str) -> impl FnOnce(BusError) -> DriverError {
        move |source| DriverError::Bus { sensor, source }
    }

    /// Name of the driver that failed
    pub fn sensor(&self) -> &'static str {
        match self {
            DriverError::Bus { sensor, .. }
            | DriverError::Crc { sensor, .. }
            | DriverError::UnexpectedPartId { sensor, .. } => sensor,
        }
    }
}

/// Mean requested from a window that has never received a sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("mean requested from an empty sample window")]
pub struct EmptyBufferError;

/// Host CPU temperature source could not be read
#[derive(Debug, Error)]
pub enum HostReadError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unexpected contents in {}: {contents:?}", path.display())]
    Parse { path: PathBuf, contents: String },
}

/// Why a sampling pass was abandoned. The previous snapshot stays published.
#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("sensor read failed: {0}")]
    Driver(#[from] DriverError),
    #[error("CPU temperature unavailable: {0}")]
    Host(#[from] HostReadError),
    #[error(transparent)]
    EmptyWindow(#[from] EmptyBufferError),
}

/// An environment variable held a value the monitor cannot run with
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {var}={value:?}: {reason}")]
pub struct ConfigError {
    pub var: &'static str,
    pub value: String,
    pub reason: &'static str,
}

/// Command line could not be understood
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UsageError {
    #[error("no board given")]
    MissingBoard,
    #[error("unknown board {0:?}")]
    UnknownBoard(String),
    #[error("unknown option {0:?}")]
    UnknownOption(String),
    #[error("unexpected argument {0:?}")]
    ExtraArgument(String),
}
