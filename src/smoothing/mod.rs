pub mod cbuffer;
pub mod cpu_temperature;

pub use cbuffer::CircularAverageBuffer;
pub use cpu_temperature::{
    compensate_temperature, CpuTemperatureSource, CpuThermalCompensator, SysfsThermalZone,
    DEFAULT_THERMAL_ZONE,
};
