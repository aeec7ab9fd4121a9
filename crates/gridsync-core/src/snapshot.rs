use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// One complete read of `GET /`. Replaced wholesale on every successful poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemSnapshot {
    pub timestamp: String,
    pub environment: EnvironmentState,
    pub devices: Vec<DeviceState>,
    #[serde(default)]
    pub batteries: Vec<BatteryState>,
    #[serde(default)]
    pub grid_connections: Vec<GridState>,
    pub diesel_strategy: DieselStrategy,
    pub total_generation: f64,
    pub total_storage_power: f64,
    pub total_grid_power: f64,
    pub device_count: u32,
}

impl SystemSnapshot {
    /// Simulation clock; the server sends naive ISO-8601 local time.
    pub fn simulation_time(&self) -> Option<NaiveDateTime> {
        self.timestamp.parse().ok()
    }

    pub fn devices_of(&self, kind: DeviceKind) -> impl Iterator<Item = &DeviceState> {
        self.devices.iter().filter(move |d| d.kind == kind)
    }

    pub fn device(&self, name: &str) -> Option<&DeviceState> {
        self.devices.iter().find(|d| d.name == name)
    }

    pub fn stored_energy_kwh(&self) -> f64 {
        self.batteries.iter().map(|b| b.state_of_charge).sum()
    }

    pub fn storage_capacity_kwh(&self) -> f64 {
        self.batteries.iter().map(|b| b.capacity_kwh).sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentState {
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub solar_radiation: Option<f64>,
    #[serde(default)]
    pub wind_speed: Option<f64>,
    #[serde(default)]
    pub wind_direction: Option<f64>,
    #[serde(default)]
    pub cloud_cover: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceKind {
    WindTurbine,
    SolarPanel,
    DieselGenerator,
    Battery,
    GridConnection,
    #[serde(other)]
    Other,
}

impl DeviceKind {
    pub fn is_renewable(self) -> bool {
        matches!(self, Self::WindTurbine | Self::SolarPanel)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceState {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: DeviceKind,
    pub power_output: f64,
    /// Type-specific fields (rated power, cut-in speed, setpoint, ...).
    #[serde(flatten)]
    pub fields: BTreeMap<String, serde_json::Value>,
}

impl DeviceState {
    pub fn field_f64(&self, key: &str) -> Option<f64> {
        self.fields.get(key).and_then(|v| v.as_f64())
    }
}

/// Battery as reported by `GET /` and `GET /batteries/status`.
///
/// `state_of_charge` is stored energy in kWh. The server also sends a
/// percentage; it is ignored and recomputed from capacity so that every
/// consumer sees one unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatteryState {
    pub name: String,
    pub capacity_kwh: f64,
    pub max_power_kw: f64,
    pub state_of_charge: f64,
    pub current_power: f64,
    #[serde(default)]
    pub efficiency: Option<f64>,
}

impl BatteryState {
    pub fn soc_percent(&self) -> f64 {
        if self.capacity_kwh <= 0.0 {
            return 0.0;
        }
        (self.state_of_charge / self.capacity_kwh * 100.0).clamp(0.0, 100.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GridFlow {
    Importing,
    Exporting,
    Idle,
}

impl GridFlow {
    pub fn from_power(power_kw: f64) -> Self {
        if power_kw > 0.0 {
            Self::Importing
        } else if power_kw < 0.0 {
            Self::Exporting
        } else {
            Self::Idle
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridState {
    pub name: String,
    pub import_price: f64,
    pub export_price: f64,
    pub current_power: f64,
    #[serde(default)]
    pub status: Option<GridFlow>,
}

impl GridState {
    pub fn flow(&self) -> GridFlow {
        self.status
            .unwrap_or_else(|| GridFlow::from_power(self.current_power))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DieselStrategy {
    DemandFollowing,
    BatteryCharging,
    Manual,
}

impl DieselStrategy {
    pub const ALL: [DieselStrategy; 3] = [
        DieselStrategy::DemandFollowing,
        DieselStrategy::BatteryCharging,
        DieselStrategy::Manual,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::DemandFollowing => "demand_following",
            Self::BatteryCharging => "battery_charging",
            Self::Manual => "manual",
        }
    }
}

impl fmt::Display for DieselStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DieselStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|strategy| strategy.as_str() == s)
            .ok_or_else(|| format!("unknown diesel strategy: {s}"))
    }
}
