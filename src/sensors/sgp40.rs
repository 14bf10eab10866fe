//! Sensirion SGP40 metal-oxide VOC sensor
//!
//! A command-style device: no register map, every word on the wire is
//! followed by a CRC-8.
use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use log::{info, warn};

use crate::bus::RegisterDevice;
use crate::error::DriverError;
use crate::sensors::voc_index::VocIndex;

const SENSOR: &str = "SGP40";

pub const DEFAULT_ADDRESS: u8 = 0x59;

const CMD_MEASURE_RAW: [u8; 2] = [0x26, 0x0F];
const CMD_SELF_TEST: [u8; 2] = [0x28, 0x0E];
const SELF_TEST_OK: u16 = 0xD400;

const MEASURE_WAIT_MS: u32 = 30;
const SELF_TEST_WAIT_MS: u32 = 320;
const SAMPLE_INTERVAL_MS: u32 = 1000;

const CRC_POLYNOMIAL: u8 = 0x31;
const CRC_INIT: u8 = 0xFF;

/// CRC-8 as used on every Sensirion word
pub fn crc8(data: &[u8]) -> u8 {
    let mut crc = CRC_INIT;
    for byte in data {
        crc ^= byte;
        for _ in 0..8 {
            if crc & 0x80 != 0 {
                crc = (crc << 1) ^ CRC_POLYNOMIAL;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}

/// Humidity and temperature words, each with CRC, as sent after the measure command
pub fn compensation_words(humidity: f64, temperature: f64) -> [u8; 6] {
    let humidity_ticks = (humidity.clamp(0.0, 100.0) / 100.0 * 65535.0) as u16;
    let temperature_ticks = ((temperature.clamp(-45.0, 130.0) + 45.0) / 175.0 * 65535.0) as u16;

    let [h_msb, h_lsb] = humidity_ticks.to_be_bytes();
    let [t_msb, t_lsb] = temperature_ticks.to_be_bytes();
    [
        h_msb,
        h_lsb,
        crc8(&[h_msb, h_lsb]),
        t_msb,
        t_lsb,
        crc8(&[t_msb, t_lsb]),
    ]
}

pub struct Sgp40<I, D> {
    device: RegisterDevice<I>,
    delay: D,
    compensation: [u8; 6],
    algorithm: VocIndex,
}

impl<I: I2c, D: DelayNs> Sgp40<I, D> {
    /// Runs the built-in self test. A failing self test is logged only.
    pub fn new(i2c: I, delay: D, address: u8) -> Result<Self, DriverError> {
        let mut sensor = Self {
            device: RegisterDevice::new(i2c, address),
            delay,
            compensation: compensation_words(50.0, 25.0),
            algorithm: VocIndex::new(),
        };

        if sensor.self_test()? {
            info!("{} self test passed", SENSOR);
        } else {
            warn!("{} self test failed, readings may be unreliable", SENSOR);
        }
        Ok(sensor)
    }

    pub fn self_test(&mut self) -> Result<bool, DriverError> {
        self.device
            .write_raw(&CMD_SELF_TEST)
            .map_err(DriverError::bus(SENSOR))?;
        self.delay.delay_ms(SELF_TEST_WAIT_MS);
        Ok(self.read_word()? == SELF_TEST_OK)
    }

    /// Relative humidity (%) and temperature (°C) sent with each measurement.
    pub fn set_compensation(&mut self, humidity: f64, temperature: f64) {
        self.compensation = compensation_words(humidity, temperature);
    }

    /// Raw ticks; lower means more VOC.
    pub fn measure_raw(&mut self) -> Result<u16, DriverError> {
        let mut frame = [0u8; 8];
        frame[..2].copy_from_slice(&CMD_MEASURE_RAW);
        frame[2..].copy_from_slice(&self.compensation);
        self.device
            .write_raw(&frame)
            .map_err(DriverError::bus(SENSOR))?;
        self.delay.delay_ms(MEASURE_WAIT_MS);
        self.read_word()
    }

    /// Measure and run the result through the gas index algorithm.
    pub fn read_voc_index(&mut self) -> Result<u16, DriverError> {
        let sraw = self.measure_raw()?;
        Ok(self.algorithm.process(sraw))
    }

    /// Feed the algorithm at its one second cadence before the first real read.
    pub fn warm_up(&mut self, samples: u32) -> Result<(), DriverError> {
        info!("{} warming up for {} samples", SENSOR, samples);
        for _ in 0..samples {
            self.read_voc_index()?;
            self.delay.delay_ms(SAMPLE_INTERVAL_MS - MEASURE_WAIT_MS);
        }
        info!("{} ready", SENSOR);
        Ok(())
    }

    fn read_word(&mut self) -> Result<u16, DriverError> {
        let mut raw = [0u8; 3];
        self.device
            .read_raw(&mut raw)
            .map_err(DriverError::bus(SENSOR))?;

        let expected = crc8(&raw[..2]);
        if expected != raw[2] {
            return Err(DriverError::Crc {
                sensor: SENSOR,
                expected,
                actual: raw[2],
            });
        }
        Ok(u16::from_be_bytes([raw[0], raw[1]]))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::bus::mock::{MockI2c, RecordingDelay};

    fn word(value: u16) -> [u8; 3] {
        let [msb, lsb] = value.to_be_bytes();
        [msb, lsb, crc8(&[msb, lsb])]
    }

    /// Passing self test, every measurement returns `sraw`
    pub(crate) fn prime(mock: &MockI2c, sraw: u16) {
        mock.script(DEFAULT_ADDRESS, CMD_SELF_TEST[0], &[&word(SELF_TEST_OK)]);
        mock.script(DEFAULT_ADDRESS, CMD_MEASURE_RAW[0], &[&word(sraw)]);
    }

    #[test]
    fn crc_matches_sensirion_vector() {
        assert_eq!(crc8(&[0xBE, 0xEF]), 0x92);
        assert_eq!(crc8(&[0x80, 0x00]), 0xA2);
        assert_eq!(crc8(&[0x66, 0x66]), 0x93);
    }

    #[test]
    fn compensation_ticks() {
        let words = compensation_words(50.0, 25.0);
        assert_eq!(u16::from_be_bytes([words[0], words[1]]), 32767);
        assert_eq!(u16::from_be_bytes([words[3], words[4]]), 0x6666);
        assert_eq!(words[5], 0x93);

        let clamped = compensation_words(150.0, -60.0);
        assert_eq!(&clamped[..2], &[0xFF, 0xFF]);
        assert_eq!(&clamped[3..5], &[0x00, 0x00]);
    }

    #[test]
    fn measure_sends_compensation() {
        let mock = MockI2c::new();
        prime(&mock, 30000);
        let delay = RecordingDelay::new();
        let mut sensor = Sgp40::new(mock.clone(), delay.clone(), DEFAULT_ADDRESS).unwrap();
        assert_eq!(delay.calls_ms(), vec![320]);
        sensor.set_compensation(40.0, 20.0);
        mock.clear_writes();

        assert_eq!(sensor.measure_raw().unwrap(), 30000);

        let writes = mock.writes_to(DEFAULT_ADDRESS);
        let mut expected = vec![0x26, 0x0F];
        expected.extend_from_slice(&compensation_words(40.0, 20.0));
        assert_eq!(writes, vec![expected]);
    }

    #[test]
    fn failed_self_test_is_not_fatal() {
        let mock = MockI2c::new();
        prime(&mock, 30000);
        mock.script(DEFAULT_ADDRESS, CMD_SELF_TEST[0], &[&word(0x4B00)]);

        let mut sensor = Sgp40::new(mock, RecordingDelay::new(), DEFAULT_ADDRESS).unwrap();
        assert!(!sensor.self_test().unwrap());
    }

    #[test]
    fn bad_crc_is_reported() {
        let mock = MockI2c::new();
        prime(&mock, 30000);
        let mut sensor = Sgp40::new(mock.clone(), RecordingDelay::new(), DEFAULT_ADDRESS).unwrap();
        mock.script(DEFAULT_ADDRESS, CMD_MEASURE_RAW[0], &[&[0x75, 0x30, 0x00]]);

        match sensor.measure_raw() {
            Err(DriverError::Crc { sensor, actual, .. }) => {
                assert_eq!(sensor, "SGP40");
                assert_eq!(actual, 0x00);
            }
            other => panic!("expected CRC error, got {:?}", other),
        }
    }

    #[test]
    fn warm_up_paces_one_sample_per_second() {
        let mock = MockI2c::new();
        prime(&mock, 30000);
        let delay = RecordingDelay::new();
        let mut sensor = Sgp40::new(mock, delay.clone(), DEFAULT_ADDRESS).unwrap();
        delay.clear();

        sensor.warm_up(10).unwrap();

        assert_eq!(delay.total_ms(), 10_000);
        // still inside the start-up blackout
        assert_eq!(sensor.read_voc_index().unwrap(), 0);
    }
}
