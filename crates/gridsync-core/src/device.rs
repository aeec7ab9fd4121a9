use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindTurbineParams {
    pub name: String,
    pub rated_power: f64,
    pub direction: i32,
    pub cut_in_speed: f64,
    pub rated_speed: f64,
    pub cut_out_speed: f64,
}

impl WindTurbineParams {
    pub fn new(name: impl Into<String>, rated_power: f64, direction: i32) -> Self {
        Self {
            name: name.into(),
            rated_power,
            direction,
            cut_in_speed: 3.0,
            rated_speed: 12.0,
            cut_out_speed: 25.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolarPanelParams {
    pub name: String,
    pub rated_power: f64,
    pub temp_coefficient: f64,
    pub stc_temp: f64,
}

impl SolarPanelParams {
    pub fn new(name: impl Into<String>, rated_power: f64) -> Self {
        Self {
            name: name.into(),
            rated_power,
            temp_coefficient: 0.004,
            stc_temp: 25.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DieselGeneratorParams {
    pub name: String,
    pub rated_power: f64,
    pub diesel_usage_litre_per_kw: f64,
}

impl DieselGeneratorParams {
    pub fn new(name: impl Into<String>, rated_power: f64) -> Self {
        Self {
            name: name.into(),
            rated_power,
            diesel_usage_litre_per_kw: 0.4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatteryParams {
    pub name: String,
    pub capacity_kwh: f64,
    pub max_power_kw: f64,
    pub efficiency: f64,
    /// Fraction of capacity, 0..=1.
    pub initial_charge: f64,
}

impl BatteryParams {
    pub fn new(name: impl Into<String>, capacity_kwh: f64, max_power_kw: f64) -> Self {
        Self {
            name: name.into(),
            capacity_kwh,
            max_power_kw,
            efficiency: 0.90,
            initial_charge: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridConnectionParams {
    pub name: String,
    pub import_price: f64,
    pub export_price: f64,
}

/// A device to add through `POST /add/{device_type}`.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceSpec {
    WindTurbine(WindTurbineParams),
    SolarPanel(SolarPanelParams),
    DieselGenerator(DieselGeneratorParams),
    Battery(BatteryParams),
    GridConnection(GridConnectionParams),
}

impl DeviceSpec {
    /// Path segment the server routes on.
    pub fn type_path(&self) -> &'static str {
        match self {
            Self::WindTurbine(_) => "windturbine",
            Self::SolarPanel(_) => "solarpanel",
            Self::DieselGenerator(_) => "dieselgenerator",
            Self::Battery(_) => "battery",
            Self::GridConnection(_) => "gridconnection",
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::WindTurbine(p) => &p.name,
            Self::SolarPanel(p) => &p.name,
            Self::DieselGenerator(p) => &p.name,
            Self::Battery(p) => &p.name,
            Self::GridConnection(p) => &p.name,
        }
    }

    pub fn body(&self) -> Result<serde_json::Value, serde_json::Error> {
        match self {
            Self::WindTurbine(p) => serde_json::to_value(p),
            Self::SolarPanel(p) => serde_json::to_value(p),
            Self::DieselGenerator(p) => serde_json::to_value(p),
            Self::Battery(p) => serde_json::to_value(p),
            Self::GridConnection(p) => serde_json::to_value(p),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvironmentParam {
    Temperature,
    SolarRadiation,
    WindSpeed,
    WindDirection,
    CloudCover,
}

impl EnvironmentParam {
    pub const ALL: [EnvironmentParam; 5] = [
        EnvironmentParam::Temperature,
        EnvironmentParam::SolarRadiation,
        EnvironmentParam::WindSpeed,
        EnvironmentParam::WindDirection,
        EnvironmentParam::CloudCover,
    ];

    /// Both the path segment and the query key.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Temperature => "temperature",
            Self::SolarRadiation => "solar_radiation",
            Self::WindSpeed => "wind_speed",
            Self::WindDirection => "wind_direction",
            Self::CloudCover => "cloud_cover",
        }
    }
}

impl fmt::Display for EnvironmentParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EnvironmentParam {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|param| param.as_str() == s)
            .ok_or_else(|| format!("unknown environment parameter: {s}"))
    }
}
