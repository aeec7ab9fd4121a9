use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::Notify;

use crate::api::{ApiError, SimulationApi};
use crate::device::{DeviceSpec, EnvironmentParam};
use crate::reports::{
    BatteryReport, CommandReply, DeviceReport, DieselReport, EnvironmentReply, GridReport,
    HealthReport, ScenarioReport, ScenarioRequest, StepOutcome,
};
use crate::snapshot::{DieselStrategy, SystemSnapshot};

pub(crate) fn snapshot_json(timestamp: &str) -> serde_json::Value {
    json!({
        "timestamp": timestamp,
        "environment": {
            "time": "01 March 2025 12:00",
            "timestamp": timestamp,
            "temperature": 21.5,
            "solar_radiation": 640.0,
            "wind_speed": 7.2,
            "wind_direction": 180.0,
            "cloud_cover": 0.25
        },
        "devices": [
            {
                "name": "WT-1",
                "type": "WindTurbine",
                "power_output": 42.0,
                "rated_power": 100.0,
                "direction": 180,
                "cut_in_speed": 3.0,
                "rated_speed": 12.0,
                "cut_out_speed": 25.0
            },
            {
                "name": "PV-1",
                "type": "SolarPanel",
                "power_output": 18.5,
                "rated_power": 30.0,
                "temp_coefficient": 0.004,
                "stc_temp": 25.0
            },
            {
                "name": "Genset",
                "type": "DieselGenerator",
                "power_output": 0.0,
                "rated_power": 50.0,
                "diesel_usage_litre_per_kw": 0.4,
                "current_diesel_usage": 0.0,
                "manual_setpoint": "auto"
            },
            {
                "name": "Bank-A",
                "type": "Battery",
                "power_output": -5.0,
                "capacity_kwh": 200.0,
                "max_power_kw": 50.0,
                "state_of_charge": 150.0,
                "soc_percent": 75.0,
                "efficiency": 0.9
            },
            {
                "name": "Utility",
                "type": "GridConnection",
                "power_output": 12.0,
                "import_price": 0.15,
                "export_price": 0.05,
                "status": "importing"
            }
        ],
        "batteries": [
            {
                "name": "Bank-A",
                "capacity_kwh": 200.0,
                "max_power_kw": 50.0,
                "state_of_charge": 150.0,
                "current_power": -5.0,
                "soc_percent": 75.0
            }
        ],
        "grid_connections": [
            {
                "name": "Utility",
                "import_price": 0.15,
                "export_price": 0.05,
                "current_power": 12.0,
                "status": "importing"
            }
        ],
        "diesel_strategy": "demand_following",
        "total_generation": 60.5,
        "total_storage_power": -5.0,
        "total_grid_power": 12.0,
        "device_count": 5
    })
}

pub(crate) fn snapshot_at(timestamp: &str) -> SystemSnapshot {
    serde_json::from_value(snapshot_json(timestamp)).expect("fixture snapshot decodes")
}

pub(crate) fn step_outcome(calculated_demand: Option<f64>) -> StepOutcome {
    let mut simulation_results = BTreeMap::new();
    simulation_results.insert("grid_power_kw".to_string(), json!(12.0));
    simulation_results.insert("diesel_usage_lph".to_string(), json!(0.0));
    simulation_results.insert("renewable_generation_kw".to_string(), json!(60.5));
    StepOutcome {
        simulation_results,
        calculated_demand,
        environment_state: None,
    }
}

pub(crate) fn server_error() -> ApiError {
    ApiError::Status {
        status: 500,
        detail: Some("Simulation error: boom".to_string()),
    }
}

pub(crate) fn refused() -> ApiError {
    ApiError::Transport("connection refused".to_string())
}

/// Lets a test hold an API call open until it chooses to release it.
#[derive(Default)]
pub(crate) struct StepGate {
    pub entered: Notify,
    pub release: Notify,
}

/// Fake server answering from scripted queues. When a queue runs dry the
/// fallback answer is used.
pub(crate) struct ScriptedApi {
    snapshots: Mutex<VecDeque<Result<SystemSnapshot, ApiError>>>,
    snapshot_fallback: Result<SystemSnapshot, ApiError>,
    steps: Mutex<VecDeque<Result<StepOutcome, ApiError>>>,
    step_fallback: Result<StepOutcome, ApiError>,
    command_error: Option<ApiError>,
    gate: Option<Arc<StepGate>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedApi {
    pub(crate) fn new() -> Self {
        Self {
            snapshots: Mutex::new(VecDeque::new()),
            snapshot_fallback: Ok(snapshot_at("2025-03-01T12:00:00")),
            steps: Mutex::new(VecDeque::new()),
            step_fallback: Ok(step_outcome(Some(6.25))),
            command_error: None,
            gate: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with_snapshots(self, script: Vec<Result<SystemSnapshot, ApiError>>) -> Self {
        *self.snapshots.lock().expect("snapshots lock") = script.into();
        self
    }

    pub(crate) fn snapshots_failing(mut self) -> Self {
        self.snapshot_fallback = Err(refused());
        self
    }

    pub(crate) fn with_steps(self, script: Vec<Result<StepOutcome, ApiError>>) -> Self {
        *self.steps.lock().expect("steps lock") = script.into();
        self
    }

    pub(crate) fn steps_failing(mut self) -> Self {
        self.step_fallback = Err(server_error());
        self
    }

    pub(crate) fn commands_failing(mut self, err: ApiError) -> Self {
        self.command_error = Some(err);
        self
    }

    pub(crate) fn with_gate(mut self, gate: Arc<StepGate>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().expect("calls lock").push(call);
    }

    async fn next_step(&self) -> Result<StepOutcome, ApiError> {
        if let Some(gate) = &self.gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
        let scripted = self.steps.lock().expect("steps lock").pop_front();
        scripted.unwrap_or_else(|| self.step_fallback.clone())
    }

    fn command(&self) -> Result<CommandReply, ApiError> {
        match &self.command_error {
            Some(err) => Err(err.clone()),
            None => Ok(CommandReply {
                message: Some("ok".to_string()),
                fields: BTreeMap::new(),
            }),
        }
    }

    fn environment_reply(&self) -> Result<EnvironmentReply, ApiError> {
        match &self.command_error {
            Some(err) => Err(err.clone()),
            None => Ok(EnvironmentReply {
                message: Some("ok".to_string()),
                environment: None,
            }),
        }
    }
}

fn not_scripted<T>() -> Result<T, ApiError> {
    Err(ApiError::Transport("not scripted".to_string()))
}

#[async_trait]
impl SimulationApi for ScriptedApi {
    async fn system_status(&self) -> Result<SystemSnapshot, ApiError> {
        self.record("GET /".to_string());
        let scripted = self.snapshots.lock().expect("snapshots lock").pop_front();
        scripted.unwrap_or_else(|| self.snapshot_fallback.clone())
    }

    async fn battery_status(&self) -> Result<BatteryReport, ApiError> {
        not_scripted()
    }

    async fn device_status(&self) -> Result<DeviceReport, ApiError> {
        not_scripted()
    }

    async fn grid_status(&self) -> Result<GridReport, ApiError> {
        not_scripted()
    }

    async fn diesel_status(&self) -> Result<DieselReport, ApiError> {
        not_scripted()
    }

    async fn health(&self) -> Result<HealthReport, ApiError> {
        not_scripted()
    }

    async fn step_environment(&self, timestep_hours: f64) -> Result<EnvironmentReply, ApiError> {
        self.record(format!("POST /step?timestep_hours={timestep_hours}"));
        self.environment_reply()
    }

    async fn simulate_step(&self, demand_kw: f64, timestep_hours: f64) -> Result<StepOutcome, ApiError> {
        self.record(format!("POST /simulate/step demand_kw={demand_kw} timestep_hours={timestep_hours}"));
        self.next_step().await
    }

    async fn simulate_realistic(
        &self,
        total_daily_kwh: f64,
        timestep_hours: f64,
    ) -> Result<StepOutcome, ApiError> {
        self.record(format!(
            "POST /simulate/realistic total_daily_kwh={total_daily_kwh} timestep_hours={timestep_hours}"
        ));
        self.next_step().await
    }

    async fn reset(&self) -> Result<EnvironmentReply, ApiError> {
        self.record("POST /reset".to_string());
        self.environment_reply()
    }

    async fn set_environment(&self, param: EnvironmentParam, value: f64) -> Result<EnvironmentReply, ApiError> {
        self.record(format!("POST /environment/{param}?{param}={value}"));
        self.environment_reply()
    }

    async fn set_diesel_strategy(&self, strategy: DieselStrategy) -> Result<CommandReply, ApiError> {
        self.record(format!("POST /diesel/strategy?strategy={strategy}"));
        self.command()
    }

    async fn set_diesel_setpoint(&self, generator: &str, setpoint_kw: f64) -> Result<CommandReply, ApiError> {
        self.record(format!("POST /diesel/{generator}/setpoint setpoint_kw={setpoint_kw}"));
        self.command()
    }

    async fn add_device(&self, spec: &DeviceSpec) -> Result<CommandReply, ApiError> {
        self.record(format!("POST /add/{}", spec.type_path()));
        self.command()
    }

    async fn remove_device(&self, name: &str) -> Result<CommandReply, ApiError> {
        self.record(format!("DELETE /remove/{name}"));
        self.command()
    }

    async fn analyze_scenario(&self, _request: &ScenarioRequest) -> Result<ScenarioReport, ApiError> {
        not_scripted()
    }
}
