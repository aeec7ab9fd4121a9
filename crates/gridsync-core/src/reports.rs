use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::snapshot::{BatteryState, DeviceKind, DieselStrategy, EnvironmentState, GridState};

/// Body of a successful `/simulate/step` or `/simulate/realistic` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepOutcome {
    pub simulation_results: BTreeMap<String, serde_json::Value>,
    /// Only present in realistic mode.
    #[serde(default)]
    pub calculated_demand: Option<f64>,
    #[serde(default)]
    pub environment_state: Option<EnvironmentState>,
}

impl StepOutcome {
    pub fn result_f64(&self, key: &str) -> Option<f64> {
        self.simulation_results.get(key).and_then(|v| v.as_f64())
    }
}

/// Body of `POST /step`, `POST /reset` and `POST /environment/{param}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentReply {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub environment: Option<EnvironmentState>,
}

/// Acknowledgement returned by the mutating device and diesel endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandReply {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(flatten)]
    pub fields: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatteryReport {
    pub batteries: Vec<BatteryState>,
    pub total_batteries: u32,
    pub total_capacity_kwh: f64,
    pub total_energy_kwh: f64,
    pub total_power_kw: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceSummary {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: DeviceKind,
    pub power_output: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceReport {
    pub devices: Vec<DeviceSummary>,
    pub total_devices: u32,
    pub total_generation: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    pub timestamp: String,
    pub devices_count: u32,
    pub environment_time: String,
    pub api_version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridReport {
    pub grid_connections: Vec<GridState>,
    pub total_grids: u32,
    pub total_power_flow: f64,
}

/// A generator runs either on a manual setpoint (kW) or on the strategy ("auto").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Setpoint {
    Manual(f64),
    Auto(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DieselGeneratorStatus {
    pub name: String,
    pub rated_power: f64,
    pub current_output: f64,
    pub diesel_usage_rate: f64,
    pub current_diesel_usage: f64,
    pub utilization_percent: f64,
    pub manual_setpoint: Setpoint,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DieselSummary {
    pub total_generators: u32,
    pub running_generators: u32,
    pub total_diesel_output: f64,
    pub total_diesel_usage_lph: f64,
    pub current_strategy: DieselStrategy,
    pub fleet_utilization: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DieselReport {
    pub diesel_generators: Vec<DieselGeneratorStatus>,
    pub summary: DieselSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioRequest {
    pub exclude_device_name: String,
    pub duration_days: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioMetrics {
    pub total_cost: f64,
    pub co2_emissions_kg: f64,
    pub diesel_usage_l: f64,
    pub grid_import_kwh: f64,
    pub renewable_generation_kwh: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioSavings {
    pub cost_saved: f64,
    pub co2_saved_kg: f64,
    pub cost_saving_percent: f64,
    pub co2_saving_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioReport {
    pub with_renewables: ScenarioMetrics,
    pub without_renewables: ScenarioMetrics,
    pub savings: ScenarioSavings,
}
