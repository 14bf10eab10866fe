/// Front panel for boards with a screen
///
/// The panel alternates between a sensor page and a large clock. Pages are
/// rendered as text lines and written to the log at debug level.
use log::debug;
use time::OffsetDateTime;

use crate::models::EnviroPlusValues;
use crate::utils::{clock_date, clock_time, clock_year, header_stamp, local_now};

/// Frames between automatic page changes (one frame per tick)
pub const MODE_CYCLE_FRAMES: u64 = 120;
/// Raw proximity above this flips the page immediately
pub const PROXIMITY_TRIGGER: f64 = 100.0;

const VALUE_WIDTH: usize = 6;

/// Receives every successfully published set of values.
pub trait Display: Send {
    fn show(&mut self, values: &EnviroPlusValues, raw_proximity: f64);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelMode {
    Sensors,
    Clock,
}

impl PanelMode {
    fn toggled(self) -> Self {
        match self {
            PanelMode::Sensors => PanelMode::Clock,
            PanelMode::Clock => PanelMode::Sensors,
        }
    }
}

/// Background tint behind a reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Band {
    Blue,
    Green,
    Red,
}

impl Band {
    fn label(self) -> &'static str {
        match self {
            Band::Blue => "blue",
            Band::Green => "green",
            Band::Red => "red",
        }
    }
}

pub fn temperature_band(celsius: f64) -> Band {
    if celsius < 18.0 {
        Band::Blue
    } else if celsius < 24.0 {
        Band::Green
    } else {
        Band::Red
    }
}

/// Too dry and too damp are both red.
pub fn humidity_band(percent: f64) -> Band {
    if percent < 25.0 {
        Band::Red
    } else if percent < 75.0 {
        Band::Green
    } else {
        Band::Red
    }
}

pub fn pressure_band(hpa: f64) -> Band {
    if hpa < 980.0 {
        Band::Blue
    } else if hpa < 1020.0 {
        Band::Green
    } else {
        Band::Red
    }
}

/// Page background level, brighter in brighter rooms.
///
/// Band edges are exclusive, so exactly 2, 4, 6 or 8 lux stays dark.
pub fn background_level(lux: f64) -> u8 {
    match lux {
        l if l > 2.0 && l < 4.0 => 20,
        l if l > 4.0 && l < 6.0 => 40,
        l if l > 6.0 && l < 8.0 => 60,
        l if l > 8.0 => 80,
        _ => 0,
    }
}

fn pad(value: f64, decimals: usize) -> String {
    format!("{:<width$}", format!("{:.*}", decimals, value), width = VALUE_WIDTH)
}

/// Text rendition of the front panel
#[derive(Debug)]
pub struct TextPanel {
    frame: u64,
    mode: PanelMode,
    last_frame: Vec<String>,
}

impl Default for TextPanel {
    fn default() -> Self {
        Self::new()
    }
}

impl TextPanel {
    pub fn new() -> Self {
        Self {
            frame: 1,
            mode: PanelMode::Sensors,
            last_frame: Vec::new(),
        }
    }

    /// Timer and proximity each flip the page; both at once cancel out.
    fn cycle_mode(&mut self, raw_proximity: f64) {
        if self.frame % MODE_CYCLE_FRAMES == 0 {
            self.mode = self.mode.toggled();
        }
        if raw_proximity > PROXIMITY_TRIGGER {
            self.mode = self.mode.toggled();
        }
    }

    pub fn render(&self, values: &EnviroPlusValues, now: &OffsetDateTime) -> Vec<String> {
        // colon blinks on alternate frames
        let colon = self.frame % 2 != 0;

        match self.mode {
            PanelMode::Sensors => vec![
                format!(
                    "{} [bg {}]",
                    header_stamp(now, colon),
                    background_level(values.lux)
                ),
                format!(
                    "{}°C [{}] {}CO",
                    pad(values.temperature, 2),
                    temperature_band(values.temperature).label(),
                    pad(values.reducing * 0.0001, 2)
                ),
                format!(
                    "{}%  [{}] {}NO",
                    pad(values.humidity, 2),
                    humidity_band(values.humidity).label(),
                    pad(values.oxidising * 0.0001, 2)
                ),
                format!(
                    "{}mb [{}] {}NH3",
                    pad(values.pressure, 0),
                    pressure_band(values.pressure).label(),
                    pad(values.nh3 * 0.0001, 0)
                ),
                format!("{}Lux {}px", pad(values.lux, 2), pad(values.proximity, 0)),
            ],
            PanelMode::Clock => vec![
                clock_time(now, colon),
                clock_date(now),
                clock_year(now),
            ],
        }
    }
}

impl Display for TextPanel {
    fn show(&mut self, values: &EnviroPlusValues, raw_proximity: f64) {
        self.cycle_mode(raw_proximity);

        self.last_frame = self.render(values, &local_now());
        for line in &self.last_frame {
            debug!("panel: {}", line);
        }

        self.frame += 1;
    }
}
