//! Bosch BME280 temperature, humidity and pressure sensor
//!
//! Runs in forced mode: every read triggers one conversion at the configured
//! oversampling, waits for it, then burst-reads all three results so they
//! come from the same measurement cycle.
use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use log::{info, warn};

use crate::bus::RegisterDevice;
use crate::error::DriverError;
use crate::sensors::check_part_id;

const SENSOR: &str = "BME280";

pub const DEFAULT_ADDRESS: u8 = 0x76;
const CHIP_ID: u8 = 0x60;

const REG_CALIB_TP: u8 = 0x88;
const REG_CALIB_H1: u8 = 0xA1;
const REG_CHIP_ID: u8 = 0xD0;
const REG_RESET: u8 = 0xE0;
const REG_CALIB_H2: u8 = 0xE1;
const REG_CTRL_HUM: u8 = 0xF2;
const REG_STATUS: u8 = 0xF3;
const REG_CTRL_MEAS: u8 = 0xF4;
const REG_CONFIG: u8 = 0xF5;
const REG_DATA: u8 = 0xF7;

const RESET_COMMAND: u8 = 0xB6;
const STATUS_MEASURING: u8 = 0x08;
const MODE_SLEEP: u8 = 0b00;
const MODE_FORCED: u8 = 0b01;

const STATUS_POLLS: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Oversampling {
    Skip = 0,
    X1 = 1,
    X2 = 2,
    X4 = 3,
    X8 = 4,
    X16 = 5,
}

impl Oversampling {
    fn samples(self) -> f64 {
        match self {
            Oversampling::Skip => 0.0,
            Oversampling::X1 => 1.0,
            Oversampling::X2 => 2.0,
            Oversampling::X4 => 4.0,
            Oversampling::X8 => 8.0,
            Oversampling::X16 => 16.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Bme280Config {
    pub address: u8,
    pub temperature_oversampling: Oversampling,
    pub pressure_oversampling: Oversampling,
    pub humidity_oversampling: Oversampling,
}

impl Default for Bme280Config {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS,
            temperature_oversampling: Oversampling::X16,
            pressure_oversampling: Oversampling::X16,
            humidity_oversampling: Oversampling::X16,
        }
    }
}

impl Bme280Config {
    /// Datasheet maximum measurement time, appendix B
    fn max_measurement_ms(&self) -> u32 {
        let t = 2.3 * self.temperature_oversampling.samples();
        let p = 2.3 * self.pressure_oversampling.samples() + 0.575;
        let h = 2.3 * self.humidity_oversampling.samples() + 0.575;
        (1.25 + t + p + h).ceil() as u32
    }

    fn ctrl_meas(&self, mode: u8) -> u8 {
        ((self.temperature_oversampling as u8) << 5)
            | ((self.pressure_oversampling as u8) << 2)
            | mode
    }
}

/// °C, %RH, hPa
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThpReading {
    pub temperature: f64,
    pub humidity: f64,
    pub pressure: f64,
}

/// Factory trimming parameters
#[derive(Debug, Clone, Copy, Default)]
struct Calibration {
    t1: u16,
    t2: i16,
    t3: i16,
    p1: u16,
    p2: i16,
    p3: i16,
    p4: i16,
    p5: i16,
    p6: i16,
    p7: i16,
    p8: i16,
    p9: i16,
    h1: u8,
    h2: i16,
    h3: u8,
    h4: i16,
    h5: i16,
    h6: i8,
}

impl Calibration {
    /// `tp` covers 0x88..=0x9F, `h1` is 0xA1, `h` covers 0xE1..=0xE7.
    fn from_registers(tp: &[u8; 24], h1: u8, h: &[u8; 7]) -> Self {
        let u16_at = |i: usize| u16::from_le_bytes([tp[i], tp[i + 1]]);
        let i16_at = |i: usize| i16::from_le_bytes([tp[i], tp[i + 1]]);

        Self {
            t1: u16_at(0),
            t2: i16_at(2),
            t3: i16_at(4),
            p1: u16_at(6),
            p2: i16_at(8),
            p3: i16_at(10),
            p4: i16_at(12),
            p5: i16_at(14),
            p6: i16_at(16),
            p7: i16_at(18),
            p8: i16_at(20),
            p9: i16_at(22),
            h1,
            h2: i16::from_le_bytes([h[0], h[1]]),
            h3: h[2],
            h4: (i16::from(h[3] as i8) << 4) | i16::from(h[4] & 0x0F),
            h5: (i16::from(h[5] as i8) << 4) | i16::from(h[4] >> 4),
            h6: h[6] as i8,
        }
    }

    /// Returns (°C, t_fine)
    fn temperature(&self, adc_t: i32) -> (f64, f64) {
        let adc_t = f64::from(adc_t);
        let t1 = f64::from(self.t1);

        let var1 = (adc_t / 16384.0 - t1 / 1024.0) * f64::from(self.t2);
        let var2 = (adc_t / 131072.0 - t1 / 8192.0)
            * (adc_t / 131072.0 - t1 / 8192.0)
            * f64::from(self.t3);
        let t_fine = var1 + var2;
        (t_fine / 5120.0, t_fine)
    }

    /// Pascal
    fn pressure(&self, adc_p: i32, t_fine: f64) -> f64 {
        let mut var1 = t_fine / 2.0 - 64000.0;
        let mut var2 = var1 * var1 * f64::from(self.p6) / 32768.0;
        var2 += var1 * f64::from(self.p5) * 2.0;
        var2 = var2 / 4.0 + f64::from(self.p4) * 65536.0;
        var1 = (f64::from(self.p3) * var1 * var1 / 524288.0 + f64::from(self.p2) * var1)
            / 524288.0;
        var1 = (1.0 + var1 / 32768.0) * f64::from(self.p1);
        if var1 == 0.0 {
            // avoid division by zero
            return 0.0;
        }

        let mut p = 1048576.0 - f64::from(adc_p);
        p = (p - var2 / 4096.0) * 6250.0 / var1;
        var1 = f64::from(self.p9) * p * p / 2147483648.0;
        var2 = p * f64::from(self.p8) / 32768.0;
        p + (var1 + var2 + f64::from(self.p7)) / 16.0
    }

    /// %RH, clamped to 0..=100
    fn humidity(&self, adc_h: i32, t_fine: f64) -> f64 {
        let h = t_fine - 76800.0;
        let h = (f64::from(adc_h) - (f64::from(self.h4) * 64.0 + f64::from(self.h5) / 16384.0 * h))
            * (f64::from(self.h2) / 65536.0
                * (1.0
                    + f64::from(self.h6) / 67108864.0
                        * h
                        * (1.0 + f64::from(self.h3) / 67108864.0 * h)));
        let h = h * (1.0 - f64::from(self.h1) * h / 524288.0);
        h.clamp(0.0, 100.0)
    }
}

pub struct Bme280<I, D> {
    device: RegisterDevice<I>,
    delay: D,
    config: Bme280Config,
    calibration: Calibration,
}

impl<I: I2c, D: DelayNs> Bme280<I, D> {
    /// Reset the device, program oversampling and load the trimming values.
    pub fn new(i2c: I, mut delay: D, config: Bme280Config) -> Result<Self, DriverError> {
        let mut device = RegisterDevice::new(i2c, config.address);
        let bus = DriverError::bus;

        let id = device.read_byte(REG_CHIP_ID).map_err(bus(SENSOR))?;
        check_part_id(SENSOR, CHIP_ID, id);

        device
            .write_byte(REG_RESET, RESET_COMMAND)
            .map_err(bus(SENSOR))?;
        delay.delay_ms(10);

        // ctrl_hum only takes effect after a ctrl_meas write
        device
            .write_byte(REG_CTRL_HUM, config.humidity_oversampling as u8)
            .map_err(bus(SENSOR))?;
        device
            .write_byte(REG_CTRL_MEAS, config.ctrl_meas(MODE_SLEEP))
            .map_err(bus(SENSOR))?;
        device.write_byte(REG_CONFIG, 0x00).map_err(bus(SENSOR))?;

        let mut tp = [0u8; 24];
        device
            .read_block(REG_CALIB_TP, &mut tp)
            .map_err(bus(SENSOR))?;
        let h1 = device.read_byte(REG_CALIB_H1).map_err(bus(SENSOR))?;
        let mut h = [0u8; 7];
        device
            .read_block(REG_CALIB_H2, &mut h)
            .map_err(bus(SENSOR))?;

        info!("{} ready (forced mode, ctrl_meas 0x{:02X})", SENSOR, config.ctrl_meas(MODE_FORCED));

        Ok(Self {
            device,
            delay,
            config,
            calibration: Calibration::from_registers(&tp, h1, &h),
        })
    }

    /// One forced conversion returning all three quantities.
    pub fn read_thp(&mut self) -> Result<ThpReading, DriverError> {
        let bus = DriverError::bus;

        self.device
            .write_byte(REG_CTRL_MEAS, self.config.ctrl_meas(MODE_FORCED))
            .map_err(bus(SENSOR))?;
        self.delay.delay_ms(self.config.max_measurement_ms());

        let mut settled = false;
        for _ in 0..STATUS_POLLS {
            let status = self.device.read_byte(REG_STATUS).map_err(bus(SENSOR))?;
            if status & STATUS_MEASURING == 0 {
                settled = true;
                break;
            }
            self.delay.delay_ms(1);
        }
        if !settled {
            warn!(
                "{}: still measuring after {} status polls, data may be stale",
                SENSOR, STATUS_POLLS
            );
        }

        let mut raw = [0u8; 8];
        self.device
            .read_block(REG_DATA, &mut raw)
            .map_err(bus(SENSOR))?;

        Ok(self.compensate(&raw))
    }

    fn compensate(&self, raw: &[u8; 8]) -> ThpReading {
        let adc_p = (i32::from(raw[0]) << 12) | (i32::from(raw[1]) << 4) | (i32::from(raw[2]) >> 4);
        let adc_t = (i32::from(raw[3]) << 12) | (i32::from(raw[4]) << 4) | (i32::from(raw[5]) >> 4);
        let adc_h = (i32::from(raw[6]) << 8) | i32::from(raw[7]);

        let (temperature, t_fine) = self.calibration.temperature(adc_t);
        ThpReading {
            temperature,
            humidity: self.calibration.humidity(adc_h, t_fine),
            pressure: self.calibration.pressure(adc_p, t_fine) / 100.0,
        }
    }
}
