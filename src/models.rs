use serde::Serialize;

/// Smoothed values published by an EnviroPlus board
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct EnviroPlusValues {
    pub proximity: f64,
    pub lux: f64,
    pub temperature: f64,
    pub humidity: f64,
    pub pressure: f64,
    pub reducing: f64,
    pub oxidising: f64,
    pub nh3: f64,
}

/// Smoothed values published by a Waveshare Environment Sensor HAT
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct WaveshareEshValues {
    pub temperature: f64,
    pub humidity: f64,
    pub pressure: f64,
    pub fullspectrum: f64,
    pub infrared: f64,
    pub lux1: f64,
    pub als: f64,
    pub lux2: f64,
    pub uvs: f64,
    pub uvi: f64,
    pub voci: f64,
}

/// The latest complete set of values for whichever board is running.
///
/// Serializes as the bare field map; field order follows the struct.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Snapshot {
    EnviroPlus(EnviroPlusValues),
    WaveshareEsh(WaveshareEshValues),
}

impl Snapshot {
    /// `{"values": {...}}`
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&ValuesEnvelope { values: self })
    }
}

#[derive(Serialize)]
struct ValuesEnvelope<'a> {
    values: &'a Snapshot,
}
