//! Liteon LTR-390UV ambient light and UV sensor
//!
//! ALS and UVS share one conversion circuit, so only one of them can be
//! active at a time. After switching modes the next valid sample is only
//! available once a full integration period has elapsed. The device data-ready
//! flag is not consulted; the driver waits a fixed settle time instead.
use std::time::Duration;

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use log::{debug, info};

use crate::bus::RegisterDevice;
use crate::error::DriverError;
use crate::sensors::check_part_id;

const SENSOR: &str = "LTR390";

pub const DEFAULT_ADDRESS: u8 = 0x53;
const PART_ID: u8 = 0xB2;

// Register set
const REG_MAIN_CTRL: u8 = 0x00;
const REG_MEAS_RATE: u8 = 0x01;
const REG_GAIN: u8 = 0x05;
const REG_PART_ID: u8 = 0x06;
const REG_ALS_DATA_0: u8 = 0x0D;
const REG_ALS_DATA_1: u8 = 0x0E;
const REG_ALS_DATA_2: u8 = 0x0F;
const REG_UVS_DATA_0: u8 = 0x10;
const REG_UVS_DATA_1: u8 = 0x11;
const REG_UVS_DATA_2: u8 = 0x12;

// MAIN_CTRL values
const ALS_ACTIVE: u8 = 0x02;
const UVS_ACTIVE: u8 = 0x0A;

/// Datasheet UV sensitivity (counts per UVI at gain 18, 20 bit)
const UV_SENSITIVITY: f64 = 2300.0;

const MIN_SETTLE_SECS: f64 = 0.1;

/// Resolution paired with the nearest valid measurement rate.
///
/// Resolution (bits 6-4) and rate (bits 2-0) are not set independently, so
/// the rate can never be programmed faster than the conversion time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Resolution {
    Bits20Ms500 = 0x04,
    Bits19Ms200 = 0x13,
    Bits18Ms100 = 0x22,
    Bits17Ms50 = 0x31,
    Bits16Ms25 = 0x40,
    Bits13Ms12_5 = 0x50,
}

impl Resolution {
    /// Integration time relative to the 18 bit / 100 ms setting
    pub fn integration_factor(self) -> f64 {
        match self {
            Resolution::Bits20Ms500 => 4.0,
            Resolution::Bits19Ms200 => 2.0,
            Resolution::Bits18Ms100 => 1.0,
            Resolution::Bits17Ms50 => 0.5,
            Resolution::Bits16Ms25 => 0.25,
            Resolution::Bits13Ms12_5 => 0.03125,
        }
    }
}

/// Analog gain range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Gain {
    X1 = 0x0,
    X3 = 0x1,
    X6 = 0x2,
    X9 = 0x3,
    X18 = 0x4,
}

impl Gain {
    pub fn factor(self) -> f64 {
        match self {
            Gain::X1 => 1.0,
            Gain::X3 => 3.0,
            Gain::X6 => 6.0,
            Gain::X9 => 9.0,
            Gain::X18 => 18.0,
        }
    }
}

/// Which half of the shared circuit is converting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Als,
    Uvs,
}

#[derive(Debug, Clone, Copy)]
pub struct Ltr390Config {
    pub address: u8,
    pub resolution: Resolution,
    pub gain: Gain,
    /// Window (cover glass) calibration weight
    pub weight: f64,
}

impl Default for Ltr390Config {
    /// 18 bit leaves room in a one second tick for the other sensors:
    /// 100 ms per mode, 200 ms for a full ALS + UVS pass.
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS,
            resolution: Resolution::Bits18Ms100,
            gain: Gain::X18,
            weight: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightUvReading {
    pub als: f64,
    pub lux: f64,
    pub uvs: f64,
    pub uvi: f64,
}

pub struct Ltr390<I, D> {
    device: RegisterDevice<I>,
    delay: D,
    config: Ltr390Config,
    mode: Option<Mode>,
}

impl<I: I2c, D: DelayNs> Ltr390<I, D> {
    /// Check the part ID and program resolution and gain.
    ///
    /// The configuration is fixed for the life of the driver; build a new
    /// one to change it.
    pub fn new(i2c: I, delay: D, config: Ltr390Config) -> Result<Self, DriverError> {
        let mut device = RegisterDevice::new(i2c, config.address);

        let id = device
            .read_byte(REG_PART_ID)
            .map_err(DriverError::bus(SENSOR))?;
        check_part_id(SENSOR, PART_ID, id);

        device
            .write_byte(REG_MEAS_RATE, config.resolution as u8)
            .map_err(DriverError::bus(SENSOR))?;
        device
            .write_byte(REG_GAIN, config.gain as u8)
            .map_err(DriverError::bus(SENSOR))?;

        info!(
            "{} ready: rate 0x{:02X}, gain 0x{:02X}",
            SENSOR, config.resolution as u8, config.gain as u8
        );

        Ok(Self {
            device,
            delay,
            config,
            mode: None,
        })
    }

    /// Switch the shared circuit to ALS or UVS.
    ///
    /// A reading taken before [`settle_time`](Self::settle_time) has elapsed
    /// returns whatever the previous conversion left behind.
    pub fn set_mode(&mut self, mode: Mode) -> Result<(), DriverError> {
        let value = match mode {
            Mode::Als => ALS_ACTIVE,
            Mode::Uvs => UVS_ACTIVE,
        };
        self.device
            .write_byte(REG_MAIN_CTRL, value)
            .map_err(DriverError::bus(SENSOR))?;
        debug!("{} mode {:?} -> {:?}", SENSOR, self.mode, mode);
        self.mode = Some(mode);
        Ok(())
    }

    /// Raw 24 bit count from the data registers of `mode`. No freshness check.
    pub fn read_raw(&mut self, mode: Mode) -> Result<u32, DriverError> {
        let (lsb_reg, mid_reg, msb_reg) = match mode {
            Mode::Als => (REG_ALS_DATA_0, REG_ALS_DATA_1, REG_ALS_DATA_2),
            Mode::Uvs => (REG_UVS_DATA_0, REG_UVS_DATA_1, REG_UVS_DATA_2),
        };

        let lsb = self.read(lsb_reg)?;
        let mid = self.read(mid_reg)?;
        let msb = self.read(msb_reg)?;

        Ok(assemble_24bit(msb, mid, lsb))
    }

    /// Wait after a mode switch, scaled by the integration time, never under 100 ms.
    pub fn settle_time(&self) -> Duration {
        settle_time(self.config.resolution)
    }

    /// See LTR-390UV-01 ALS formula
    pub fn lux(&self, als: u32) -> f64 {
        lux(als, self.config.gain, self.config.resolution, self.config.weight)
    }

    /// See LTR-390UV-01 UVI formula
    pub fn uvi(&self, uvs: u32) -> f64 {
        uvi(uvs, self.config.weight)
    }

    /// ALS then UVS, each after its settle time.
    pub fn read_all(&mut self) -> Result<LightUvReading, DriverError> {
        let settle_ms = self.settle_time().as_millis() as u32;

        self.set_mode(Mode::Als)?;
        self.delay.delay_ms(settle_ms);
        let als = self.read_raw(Mode::Als)?;
        let lux = self.lux(als);

        self.set_mode(Mode::Uvs)?;
        self.delay.delay_ms(settle_ms);
        let uvs = self.read_raw(Mode::Uvs)?;
        let uvi = self.uvi(uvs);

        Ok(LightUvReading {
            als: als as f64,
            lux,
            uvs: uvs as f64,
            uvi,
        })
    }

    fn read(&mut self, register: u8) -> Result<u8, DriverError> {
        self.device
            .read_byte(register)
            .map_err(DriverError::bus(SENSOR))
    }
}

/// Combine three 8 bit data registers, most significant first.
pub fn assemble_24bit(msb: u8, mid: u8, lsb: u8) -> u32 {
    (u32::from(msb) << 16) | (u32::from(mid) << 8) | u32::from(lsb)
}

pub fn settle_time(resolution: Resolution) -> Duration {
    let secs = (0.125 * resolution.integration_factor()).max(MIN_SETTLE_SECS);
    Duration::from_secs_f64(secs)
}

pub fn lux(als: u32, gain: Gain, resolution: Resolution, weight: f64) -> f64 {
    let counts = 0.6 * als as f64;
    let scale = gain.factor() * resolution.integration_factor();
    (counts / scale) * weight
}

pub fn uvi(uvs: u32, weight: f64) -> f64 {
    (uvs as f64 / UV_SENSITIVITY) * weight
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::bus::mock::{MockI2c, RecordingDelay};

    pub(crate) fn prime(mock: &MockI2c) {
        mock.set_register(DEFAULT_ADDRESS, REG_PART_ID, PART_ID);
    }

    /// Raw ALS and UVS counts, little end first as laid out on the device
    pub(crate) fn load_sample(mock: &MockI2c, als: u32, uvs: u32) {
        mock.set_registers(DEFAULT_ADDRESS, REG_ALS_DATA_0, &als.to_le_bytes()[..3]);
        mock.set_registers(DEFAULT_ADDRESS, REG_UVS_DATA_0, &uvs.to_le_bytes()[..3]);
    }

    fn sensor(mock: &MockI2c, delay: &RecordingDelay) -> Ltr390<MockI2c, RecordingDelay> {
        prime(mock);
        Ltr390::new(mock.clone(), delay.clone(), Ltr390Config::default()).unwrap()
    }

    #[test]
    fn assembles_msb_first() {
        assert_eq!(assemble_24bit(0x01, 0x02, 0x03), 0x010203);
        assert_eq!(assemble_24bit(0x01, 0x02, 0x03), 66051);
        assert_eq!(assemble_24bit(0xFF, 0xFF, 0xFF), 0xFF_FFFF);
    }

    #[test]
    fn lux_formula() {
        let value = lux(1000, Gain::X18, Resolution::Bits18Ms100, 1.0);
        assert!((value - 33.33).abs() < 1e-2);

        let weighted = lux(1000, Gain::X1, Resolution::Bits20Ms500, 2.0);
        assert!((weighted - 300.0).abs() < 1e-9);
    }

    #[test]
    fn uvi_formula() {
        assert!((uvi(4600, 1.0) - 2.0).abs() < 1e-9);
        assert!((uvi(2300, 0.5) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn settle_time_scales_with_integration() {
        assert_eq!(settle_time(Resolution::Bits20Ms500), Duration::from_millis(500));
        assert_eq!(settle_time(Resolution::Bits19Ms200), Duration::from_millis(250));
        assert_eq!(settle_time(Resolution::Bits18Ms100), Duration::from_millis(125));
        assert_eq!(settle_time(Resolution::Bits17Ms50), Duration::from_millis(100));
        assert_eq!(settle_time(Resolution::Bits13Ms12_5), Duration::from_millis(100));
    }

    #[test]
    fn construction_programs_rate_and_gain() {
        let mock = MockI2c::new();
        let _sensor = sensor(&mock, &RecordingDelay::new());

        assert_eq!(mock.register(DEFAULT_ADDRESS, REG_MEAS_RATE), 0x22);
        assert_eq!(mock.register(DEFAULT_ADDRESS, REG_GAIN), 0x04);
    }

    #[test]
    fn unexpected_part_id_is_not_fatal() {
        let mock = MockI2c::new();
        mock.set_register(DEFAULT_ADDRESS, REG_PART_ID, 0xB3);

        assert!(Ltr390::new(mock, RecordingDelay::new(), Ltr390Config::default()).is_ok());
    }

    #[test]
    fn reads_three_registers_per_channel() {
        let mock = MockI2c::new();
        let mut sensor = sensor(&mock, &RecordingDelay::new());
        mock.set_registers(DEFAULT_ADDRESS, REG_ALS_DATA_0, &[0x03, 0x02, 0x01]);
        mock.set_registers(DEFAULT_ADDRESS, REG_UVS_DATA_0, &[0xE8, 0x03, 0x00]);

        assert_eq!(sensor.read_raw(Mode::Als).unwrap(), 66051);
        assert_eq!(sensor.read_raw(Mode::Uvs).unwrap(), 1000);
    }

    #[test]
    fn read_all_switches_modes_and_waits() {
        let mock = MockI2c::new();
        let delay = RecordingDelay::new();
        let mut sensor = sensor(&mock, &delay);
        load_sample(&mock, 1000, 4600);
        mock.clear_writes();

        let reading = sensor.read_all().unwrap();

        assert_eq!(reading.als, 1000.0);
        assert!((reading.lux - 33.333).abs() < 1e-3);
        assert_eq!(reading.uvs, 4600.0);
        assert!((reading.uvi - 2.0).abs() < 1e-9);
        assert_eq!(sensor.mode, Some(Mode::Uvs));

        let mode_writes: Vec<Vec<u8>> = mock
            .writes_to(DEFAULT_ADDRESS)
            .into_iter()
            .filter(|w| w.len() == 2 && w[0] == REG_MAIN_CTRL)
            .collect();
        assert_eq!(
            mode_writes,
            vec![vec![REG_MAIN_CTRL, ALS_ACTIVE], vec![REG_MAIN_CTRL, UVS_ACTIVE]]
        );
        assert_eq!(delay.calls_ms(), vec![125, 125]);
    }

    #[test]
    fn bus_failure_names_driver() {
        let mock = MockI2c::new();
        let mut sensor = sensor(&mock, &RecordingDelay::new());
        mock.fail_address(DEFAULT_ADDRESS);

        let err = sensor.read_all().unwrap_err();
        assert_eq!(err.sensor(), "LTR390");
    }
}
