/// Host CPU temperature sampling and the sensor temperature correction
use std::fs;
use std::path::{Path, PathBuf};

use log::debug;

use crate::error::{EmptyBufferError, HostReadError};
use crate::smoothing::cbuffer::CircularAverageBuffer;

/// Default thermal zone exposed by the Raspberry Pi kernel
pub const DEFAULT_THERMAL_ZONE: &str = "/sys/class/thermal/thermal_zone0/temp";

/// A source of host CPU temperature readings in °C
pub trait CpuTemperatureSource: Send {
    fn read_celsius(&mut self) -> Result<f64, HostReadError>;
}

/// Reads a sysfs thermal zone file (millidegrees Celsius)
#[derive(Debug, Clone)]
pub struct SysfsThermalZone {
    path: PathBuf,
}

impl SysfsThermalZone {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for SysfsThermalZone {
    fn default() -> Self {
        Self::new(DEFAULT_THERMAL_ZONE)
    }
}

impl CpuTemperatureSource for SysfsThermalZone {
    fn read_celsius(&mut self) -> Result<f64, HostReadError> {
        let contents = fs::read_to_string(&self.path).map_err(|source| HostReadError::Io {
            path: self.path.clone(),
            source,
        })?;

        // e.g. "30525\n" -> 30.525
        let millidegrees: f64 = contents.trim().parse().map_err(|_| HostReadError::Parse {
            path: self.path.clone(),
            contents: contents.clone(),
        })?;

        Ok(millidegrees * 0.001)
    }
}

/// Smoothed host CPU temperature
pub struct CpuThermalCompensator<C> {
    source: C,
    window: CircularAverageBuffer,
}

impl<C: CpuTemperatureSource> CpuThermalCompensator<C> {
    pub fn new(source: C, window_len: usize) -> Self {
        Self {
            source,
            window: CircularAverageBuffer::new(window_len),
        }
    }

    /// Sample the host once and push the reading into the window.
    pub fn update(&mut self) -> Result<(), HostReadError> {
        let celsius = self.source.read_celsius()?;
        debug!("CPU temperature sample: {:.3}°C", celsius);
        self.window.push(celsius);
        Ok(())
    }

    /// Mean CPU temperature over the window.
    pub fn temperature(&self) -> Result<f64, EmptyBufferError> {
        self.window.mean()
    }
}

/// Damp the averaged sensor temperature against the averaged CPU temperature.
///
/// `smooth_factor` is a per-enclosure calibration constant: it depends on
/// how close the sensor sits to the CPU and how hot the CPU runs.
pub fn compensate_temperature(avg_temperature: f64, avg_cpu: f64, smooth_factor: f64) -> f64 {
    avg_temperature - ((avg_cpu - avg_temperature) / smooth_factor)
}
