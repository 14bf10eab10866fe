pub mod enviroplus;
pub mod waveshare_esh;

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use log::warn;

use crate::display::Display;
use crate::error::{DriverError, UpdateError};
use crate::models::{EnviroPlusValues, Snapshot, WaveshareEshValues};
use crate::smoothing::CpuTemperatureSource;

pub use enviroplus::EnviroPlus;
pub use waveshare_esh::WaveshareEsh;

/// Supported sensor boards
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardKind {
    EnviroPlus,
    WaveshareEsh,
}

impl BoardKind {
    pub const ALL: [BoardKind; 2] = [BoardKind::EnviroPlus, BoardKind::WaveshareEsh];

    pub fn name(self) -> &'static str {
        match self {
            BoardKind::EnviroPlus => "EnviroPlus",
            BoardKind::WaveshareEsh => "WaveshareESH",
        }
    }

    /// Case-insensitive lookup by board name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(name))
    }

    /// What readers see before the first successful pass: every field zero.
    pub fn initial_snapshot(self) -> Snapshot {
        match self {
            BoardKind::EnviroPlus => Snapshot::EnviroPlus(EnviroPlusValues::default()),
            BoardKind::WaveshareEsh => Snapshot::WaveshareEsh(WaveshareEshValues::default()),
        }
    }
}

impl fmt::Display for BoardKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Calibration and start-up parameters shared by every board
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoardSettings {
    /// Samples per smoothing window
    pub window_len: usize,
    /// Temperature compensation strength, tuned per enclosure
    pub smooth_factor: f64,
    /// One second VOC measurements taken before the first pass
    pub voc_warm_up_samples: u32,
}

impl Default for BoardSettings {
    fn default() -> Self {
        Self {
            window_len: 10,
            smooth_factor: 0.9,
            voc_warm_up_samples: 10,
        }
    }
}

/// Read handle to the published snapshot.
///
/// The lock is only held to copy or replace the value, never across bus I/O.
#[derive(Debug, Clone)]
pub struct SharedSnapshot {
    inner: Arc<Mutex<Snapshot>>,
}

impl SharedSnapshot {
    pub fn new(initial: Snapshot) -> Self {
        Self {
            inner: Arc::new(Mutex::new(initial)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Snapshot> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the whole snapshot in one assignment.
    pub fn publish(&self, snapshot: Snapshot) {
        *self.lock() = snapshot;
    }

    pub fn current(&self) -> Snapshot {
        *self.lock()
    }

    /// Serialized outside the lock.
    pub fn to_json(&self) -> serde_json::Result<String> {
        self.current().to_json()
    }
}

/// The aggregator for whichever board was selected at start-up
pub enum Board<I, D, C> {
    EnviroPlus(EnviroPlus<I, D, C>),
    WaveshareEsh(WaveshareEsh<I, D, C>),
}

impl<I, D, C> Board<I, D, C>
where
    I: I2c,
    D: DelayNs + Clone,
    C: CpuTemperatureSource,
{
    /// Construct every driver of `kind`, each on a device from `bus`.
    pub fn open(
        kind: BoardKind,
        bus: impl FnMut() -> I,
        delay: D,
        cpu: C,
        settings: &BoardSettings,
        display: Option<Box<dyn Display>>,
    ) -> Result<Self, DriverError> {
        match kind {
            BoardKind::EnviroPlus => Ok(Board::EnviroPlus(EnviroPlus::open(
                bus, delay, cpu, settings, display,
            )?)),
            BoardKind::WaveshareEsh => {
                if display.is_some() {
                    warn!("{} has no display, ignoring it", kind);
                }
                Ok(Board::WaveshareEsh(WaveshareEsh::open(
                    bus, delay, cpu, settings,
                )?))
            }
        }
    }

    pub fn kind(&self) -> BoardKind {
        match self {
            Board::EnviroPlus(_) => BoardKind::EnviroPlus,
            Board::WaveshareEsh(_) => BoardKind::WaveshareEsh,
        }
    }

    /// One full sampling pass. On error the published snapshot is untouched.
    pub fn update(&mut self) -> Result<(), UpdateError> {
        match self {
            Board::EnviroPlus(board) => board.update(),
            Board::WaveshareEsh(board) => board.update(),
        }
    }

    pub fn snapshot(&self) -> SharedSnapshot {
        match self {
            Board::EnviroPlus(board) => board.snapshot(),
            Board::WaveshareEsh(board) => board.snapshot(),
        }
    }
}
