use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::boards::{BoardKind, BoardSettings};
use crate::error::{ConfigError, UsageError};
use crate::smoothing::DEFAULT_THERMAL_ZONE;

const I2C_BUS: &str = "SENSORMON_I2C_BUS";
const LISTEN_ADDR: &str = "SENSORMON_LISTEN_ADDR";
const SMOOTH_FACTOR: &str = "SENSORMON_SMOOTH_FACTOR";
const WINDOW_LEN: &str = "SENSORMON_WINDOW_LEN";
const UPDATE_INTERVAL_MS: &str = "SENSORMON_UPDATE_INTERVAL_MS";
const THERMAL_ZONE: &str = "SENSORMON_THERMAL_ZONE";
const DISPLAY: &str = "SENSORMON_DISPLAY";

/// What the command line asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Run(BoardKind),
    ListBoards,
    Help,
}

/// Parse everything after the program name.
pub fn parse_args<I>(args: I) -> Result<Command, UsageError>
where
    I: IntoIterator<Item = String>,
{
    let mut board = None;

    for arg in args {
        match arg.as_str() {
            "-l" | "--list-boards" => return Ok(Command::ListBoards),
            "-h" | "--help" => return Ok(Command::Help),
            option if option.starts_with('-') => {
                return Err(UsageError::UnknownOption(arg.clone()));
            }
            _ if board.is_some() => return Err(UsageError::ExtraArgument(arg.clone())),
            name => {
                board = Some(
                    BoardKind::from_name(name)
                        .ok_or_else(|| UsageError::UnknownBoard(arg.clone()))?,
                );
            }
        }
    }

    board.map(Command::Run).ok_or(UsageError::MissingBoard)
}

pub fn usage(program: &str) -> String {
    let boards: Vec<&str> = BoardKind::ALL.iter().map(|kind| kind.name()).collect();
    format!(
        "Usage: {program} <BOARD>\n\
         \n\
         Boards: {}\n\
         \n\
         Options:\n  \
           -l, --list-boards  Print supported boards and exit\n  \
           -h, --help         Print this help\n\
         \n\
         Environment ({I2C_BUS}, {LISTEN_ADDR}, {SMOOTH_FACTOR}, {WINDOW_LEN},\n\
         {UPDATE_INTERVAL_MS}, {THERMAL_ZONE}, {DISPLAY}) may also be set in .env",
        boards.join(", ")
    )
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    pub i2c_bus: u8,
    pub listen_addr: SocketAddr,
    pub smooth_factor: f64,
    pub window_len: usize,
    pub update_interval: Duration,
    pub thermal_zone: PathBuf,
    pub display: bool,
}

impl MonitorConfig {
    pub fn new() -> Result<Self, ConfigError> {
        // Load environment variables
        dotenv::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup, falling back to defaults for unset keys.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let smooth_factor: f64 = parse_or(&lookup, SMOOTH_FACTOR, 0.9)?;
        if !smooth_factor.is_finite() || smooth_factor == 0.0 {
            return Err(invalid(SMOOTH_FACTOR, &lookup, "must be finite and non-zero"));
        }

        let window_len: usize = parse_or(&lookup, WINDOW_LEN, 10)?;
        if window_len == 0 {
            return Err(invalid(WINDOW_LEN, &lookup, "must be at least 1"));
        }

        let interval_ms: u64 = parse_or(&lookup, UPDATE_INTERVAL_MS, 1000)?;
        if interval_ms == 0 {
            return Err(invalid(UPDATE_INTERVAL_MS, &lookup, "must be greater than 0"));
        }

        let display = match lookup(DISPLAY) {
            None => true,
            Some(value) => match value.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => return Err(invalid(DISPLAY, &lookup, "expected true or false")),
            },
        };

        Ok(MonitorConfig {
            i2c_bus: parse_or(&lookup, I2C_BUS, 1)?,
            listen_addr: parse_or(&lookup, LISTEN_ADDR, SocketAddr::from(([0, 0, 0, 0], 8080)))?,
            smooth_factor,
            window_len,
            update_interval: Duration::from_millis(interval_ms),
            thermal_zone: lookup(THERMAL_ZONE)
                .filter(|path| !path.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_THERMAL_ZONE)),
            display,
        })
    }

    pub fn board_settings(&self) -> BoardSettings {
        BoardSettings {
            window_len: self.window_len,
            smooth_factor: self.smooth_factor,
            ..BoardSettings::default()
        }
    }
}

fn parse_or<T, F>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|_| ConfigError {
            var,
            value,
            reason: "not a valid value",
        }),
    }
}

fn invalid<F>(var: &'static str, lookup: &F, reason: &'static str) -> ConfigError
where
    F: Fn(&str) -> Option<String>,
{
    ConfigError {
        var,
        value: lookup(var).unwrap_or_default(),
        reason,
    }
}
