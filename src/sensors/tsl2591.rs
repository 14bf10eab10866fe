//! AMS TSL2591 high dynamic range light sensor
//!
//! Every register access carries the command bit. The device is powered
//! only for the duration of one conversion.
use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use log::info;

use crate::bus::RegisterDevice;
use crate::error::DriverError;
use crate::sensors::check_part_id;

const SENSOR: &str = "TSL2591";

pub const DEFAULT_ADDRESS: u8 = 0x29;
const DEVICE_ID: u8 = 0x50;

const COMMAND_BIT: u8 = 0xA0;
const REG_ENABLE: u8 = 0x00;
const REG_CONTROL: u8 = 0x01;
const REG_ID: u8 = 0x12;
const REG_C0_DATA: u8 = 0x14;

const ENABLE_POWER_ON: u8 = 0x01;
const ENABLE_ALS: u8 = 0x02;
const ENABLE_OFF: u8 = 0x00;

const SATURATED: u16 = 0xFFFF;

// Lux coefficients
const LUX_DF: f64 = 408.0;
const LUX_COEF_B: f64 = 1.64;
const LUX_COEF_C: f64 = 0.59;
const LUX_COEF_D: f64 = 0.86;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Gain {
    Low = 0x00,
    Medium = 0x10,
    High = 0x20,
    Max = 0x30,
}

impl Gain {
    pub fn multiplier(self) -> f64 {
        match self {
            Gain::Low => 1.0,
            Gain::Medium => 25.0,
            Gain::High => 428.0,
            Gain::Max => 9876.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Integration {
    Ms100 = 0x00,
    Ms200 = 0x01,
    Ms300 = 0x02,
    Ms400 = 0x03,
    Ms500 = 0x04,
    Ms600 = 0x05,
}

impl Integration {
    pub fn millis(self) -> u32 {
        (self as u32 + 1) * 100
    }

    /// Worst-case conversion time, datasheet max is 120 % of nominal
    pub fn wait_ms(self) -> u32 {
        (self as u32 + 1) * 120
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Tsl2591Config {
    pub address: u8,
    pub gain: Gain,
    pub integration: Integration,
}

impl Default for Tsl2591Config {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS,
            gain: Gain::Low,
            integration: Integration::Ms100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LuminosityReading {
    pub full_spectrum: f64,
    pub infrared: f64,
    pub lux: f64,
}

pub struct Tsl2591<I, D> {
    device: RegisterDevice<I>,
    delay: D,
    config: Tsl2591Config,
}

impl<I: I2c, D: DelayNs> Tsl2591<I, D> {
    pub fn new(i2c: I, delay: D, config: Tsl2591Config) -> Result<Self, DriverError> {
        let mut device = RegisterDevice::new(i2c, config.address);

        let id = device
            .read_byte(COMMAND_BIT | REG_ID)
            .map_err(DriverError::bus(SENSOR))?;
        check_part_id(SENSOR, DEVICE_ID, id);

        let control = config.gain as u8 | config.integration as u8;
        device
            .write_byte(COMMAND_BIT | REG_CONTROL, control)
            .map_err(DriverError::bus(SENSOR))?;
        device
            .write_byte(COMMAND_BIT | REG_ENABLE, ENABLE_OFF)
            .map_err(DriverError::bus(SENSOR))?;

        info!("{} ready: control 0x{:02X}", SENSOR, control);

        Ok(Self {
            device,
            delay,
            config,
        })
    }

    /// Raw (full spectrum, infrared) from one powered conversion.
    pub fn read_channels(&mut self) -> Result<(u16, u16), DriverError> {
        self.enable(ENABLE_POWER_ON | ENABLE_ALS)?;
        self.delay.delay_ms(self.config.integration.wait_ms());

        let mut raw = [0u8; 4];
        let read = self
            .device
            .read_block(COMMAND_BIT | REG_C0_DATA, &mut raw)
            .map_err(DriverError::bus(SENSOR));
        // power down even when the read failed
        let disabled = self.enable(ENABLE_OFF);
        read?;
        disabled?;

        Ok((
            u16::from_le_bytes([raw[0], raw[1]]),
            u16::from_le_bytes([raw[2], raw[3]]),
        ))
    }

    pub fn read_luminosity(&mut self) -> Result<LuminosityReading, DriverError> {
        let (full, ir) = self.read_channels()?;
        Ok(LuminosityReading {
            full_spectrum: f64::from(full),
            infrared: f64::from(ir),
            lux: lux(full, ir, self.config.gain, self.config.integration),
        })
    }

    fn enable(&mut self, value: u8) -> Result<(), DriverError> {
        self.device
            .write_byte(COMMAND_BIT | REG_ENABLE, value)
            .map_err(DriverError::bus(SENSOR))
    }
}

/// 0 when either channel saturated.
pub fn lux(full: u16, ir: u16, gain: Gain, integration: Integration) -> f64 {
    if full == SATURATED || ir == SATURATED {
        return 0.0;
    }

    let cpl = f64::from(integration.millis()) * gain.multiplier() / LUX_DF;
    let (full, ir) = (f64::from(full), f64::from(ir));
    let lux1 = (full - LUX_COEF_B * ir) / cpl;
    let lux2 = (LUX_COEF_C * full - LUX_COEF_D * ir) / cpl;
    lux1.max(lux2)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::bus::mock::{MockI2c, RecordingDelay};

    pub(crate) fn prime(mock: &MockI2c) {
        mock.set_register(DEFAULT_ADDRESS, COMMAND_BIT | REG_ID, DEVICE_ID);
    }

    pub(crate) fn load_channels(mock: &MockI2c, full: u16, ir: u16) {
        let [f0, f1] = full.to_le_bytes();
        let [i0, i1] = ir.to_le_bytes();
        mock.set_registers(DEFAULT_ADDRESS, COMMAND_BIT | REG_C0_DATA, &[f0, f1, i0, i1]);
    }

    #[test]
    fn lux_takes_larger_estimate() {
        let value = lux(1000, 200, Gain::Low, Integration::Ms100);
        assert!((value - 2741.76).abs() < 1e-6);
    }

    #[test]
    fn saturation_reads_zero() {
        assert_eq!(lux(0xFFFF, 10, Gain::Low, Integration::Ms100), 0.0);
        assert_eq!(lux(10, 0xFFFF, Gain::Low, Integration::Ms100), 0.0);
    }

    #[test]
    fn conversion_powers_up_waits_and_powers_down() {
        let mock = MockI2c::new();
        prime(&mock);
        load_channels(&mock, 1000, 200);
        let delay = RecordingDelay::new();
        let mut sensor =
            Tsl2591::new(mock.clone(), delay.clone(), Tsl2591Config::default()).unwrap();
        assert_eq!(mock.register(DEFAULT_ADDRESS, COMMAND_BIT | REG_CONTROL), 0x00);
        mock.clear_writes();

        let reading = sensor.read_luminosity().unwrap();

        assert_eq!(reading.full_spectrum, 1000.0);
        assert_eq!(reading.infrared, 200.0);
        assert!((reading.lux - 2741.76).abs() < 1e-6);
        assert_eq!(delay.calls_ms(), vec![120]);

        let enables: Vec<u8> = mock
            .writes_to(DEFAULT_ADDRESS)
            .into_iter()
            .filter(|w| w.len() == 2 && w[0] == COMMAND_BIT | REG_ENABLE)
            .map(|w| w[1])
            .collect();
        assert_eq!(enables, vec![0x03, 0x00]);
    }

    #[test]
    fn integration_timing() {
        assert_eq!(Integration::Ms100.millis(), 100);
        assert_eq!(Integration::Ms600.millis(), 600);
        assert_eq!(Integration::Ms300.wait_ms(), 360);
    }

    #[test]
    fn bus_failure_names_driver() {
        let mock = MockI2c::new();
        prime(&mock);
        let mut sensor =
            Tsl2591::new(mock.clone(), RecordingDelay::new(), Tsl2591Config::default()).unwrap();
        mock.fail_address(DEFAULT_ADDRESS);

        assert_eq!(sensor.read_luminosity().unwrap_err().sensor(), "TSL2591");
    }
}
