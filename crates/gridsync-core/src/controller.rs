use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::api::{ApiError, SimulationApi};
use crate::config::{clamp_auto_interval, SyncConfig};
use crate::device::{DeviceSpec, EnvironmentParam};
use crate::reports::{
    BatteryReport, CommandReply, DeviceReport, DieselReport, EnvironmentReply, GridReport,
    HealthReport, ScenarioReport, ScenarioRequest, StepOutcome,
};
use crate::snapshot::{DieselStrategy, SystemSnapshot};

pub const MAX_TIMESTEP_HOURS: f64 = 24.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Connected,
    Disconnected,
}

/// How the demand of a simulation step is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DemandMode {
    /// `POST /simulate/step` with `demand_kw`.
    Explicit,
    /// `POST /simulate/realistic`; the server derives demand from `total_daily_kwh`.
    Realistic,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DemandParams {
    pub mode: DemandMode,
    pub demand_kw: f64,
    pub total_daily_kwh: f64,
    pub timestep_hours: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoRunState {
    pub interval_secs: u64,
    pub is_running: bool,
    pub step_count: u64,
    /// Bumped every time auto-run starts or stops. An auto step only applies
    /// its result if the generation it started under is still current.
    pub generation: u64,
}

impl AutoRunState {
    fn set_running(&mut self, running: bool) {
        if self.is_running != running {
            self.is_running = running;
            self.generation = self.generation.wrapping_add(1);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSource {
    Poll,
    Step,
    Command,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub source: ErrorSource,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Everything the presentation layer observes. Cloned out of the watch
/// channel as one consistent value.
#[derive(Debug, Clone)]
pub struct SyncState {
    pub snapshot: Option<Arc<SystemSnapshot>>,
    pub connection: ConnectionState,
    pub consecutive_failures: u32,
    pub last_ok_at: Option<DateTime<Utc>>,
    pub last_error: Option<ErrorReport>,
    pub last_step: Option<StepOutcome>,
    pub demand: DemandParams,
    pub auto_run: AutoRunState,
}

impl SyncState {
    fn initial(config: &SyncConfig) -> Self {
        Self {
            snapshot: None,
            connection: ConnectionState::Disconnected,
            consecutive_failures: 0,
            last_ok_at: None,
            last_error: None,
            last_step: None,
            demand: DemandParams {
                mode: config.demand_mode,
                demand_kw: config.demand_kw,
                total_daily_kwh: config.total_daily_kwh,
                timestep_hours: config.timestep_hours,
            },
            auto_run: AutoRunState {
                interval_secs: clamp_auto_interval(config.auto_interval_secs),
                is_running: false,
                step_count: 0,
                generation: 0,
            },
        }
    }

    fn record_error(&mut self, source: ErrorSource, err: &ApiError) {
        self.last_error = Some(ErrorReport {
            source,
            message: err.to_string(),
            at: Utc::now(),
        });
    }

    fn clear_error(&mut self, source: ErrorSource) -> bool {
        if self.last_error.as_ref().is_some_and(|e| e.source == source) {
            self.last_error = None;
            return true;
        }
        false
    }
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("auto-run is active; stop it before changing the interval")]
    AutoRunActive,
    #[error("auto-run is not running")]
    AutoRunInactive,
    #[error("auto-run stopped while the step was in flight")]
    StaleAutoStep,
    #[error("invalid {name}: {value}")]
    InvalidParameter { name: &'static str, value: f64 },
}

/// Keeps a fresh snapshot of the remote simulation and drives it forward.
///
/// Owned once per session and shared as `Arc` with the tasks returned by
/// [`SyncController::spawn_poller`] and [`SyncController::spawn_auto_runner`].
pub struct SyncController<A> {
    api: A,
    config: SyncConfig,
    state: watch::Sender<SyncState>,
}

impl<A: SimulationApi> SyncController<A> {
    pub fn new(api: A, config: SyncConfig) -> Self {
        let state = watch::Sender::new(SyncState::initial(&config));
        Self { api, config, state }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> SyncState {
        self.state.borrow().clone()
    }

    pub fn snapshot(&self) -> Option<Arc<SystemSnapshot>> {
        self.state.borrow().snapshot.clone()
    }

    pub fn connection(&self) -> ConnectionState {
        self.state.borrow().connection
    }

    pub fn auto_run(&self) -> AutoRunState {
        self.state.borrow().auto_run
    }

    pub fn demand(&self) -> DemandParams {
        self.state.borrow().demand
    }

    pub async fn fetch_snapshot(&self) -> Result<Arc<SystemSnapshot>, ApiError> {
        match self.api.system_status().await {
            Ok(snapshot) => {
                let snapshot = Arc::new(snapshot);
                let mut was_down = false;
                self.state.send_modify(|state| {
                    was_down = state.connection == ConnectionState::Disconnected;
                    state.snapshot = Some(Arc::clone(&snapshot));
                    state.consecutive_failures = 0;
                    state.connection = ConnectionState::Connected;
                    state.last_ok_at = Some(Utc::now());
                    state.clear_error(ErrorSource::Poll);
                });
                if was_down {
                    info!(base_url = %self.config.base_url, "connected to simulation server");
                }
                Ok(snapshot)
            }
            Err(err) => {
                let threshold = self.config.failure_threshold.max(1);
                let mut failures = 0;
                let mut lost = false;
                self.state.send_modify(|state| {
                    state.consecutive_failures = state.consecutive_failures.saturating_add(1);
                    failures = state.consecutive_failures;
                    if failures >= threshold {
                        lost = state.connection == ConnectionState::Connected;
                        state.connection = ConnectionState::Disconnected;
                    }
                    state.record_error(ErrorSource::Poll, &err);
                });
                if lost {
                    warn!(failures, error = %err, "simulation server unreachable");
                } else {
                    debug!(failures, error = %err, "poll failed");
                }
                Err(err)
            }
        }
    }

    /// Advances the simulation by one timestep with the current demand
    /// parameters. Auto steps stop auto-run on failure; manual steps only
    /// report the error.
    pub async fn run_step(&self, is_auto: bool) -> Result<StepOutcome, SyncError> {
        let (demand, generation) = {
            let state = self.state.borrow();
            if is_auto && !state.auto_run.is_running {
                return Err(SyncError::AutoRunInactive);
            }
            (state.demand, state.auto_run.generation)
        };

        let result = match demand.mode {
            DemandMode::Explicit => {
                self.api
                    .simulate_step(demand.demand_kw, demand.timestep_hours)
                    .await
            }
            DemandMode::Realistic => {
                self.api
                    .simulate_realistic(demand.total_daily_kwh, demand.timestep_hours)
                    .await
            }
        };

        let mut applied = false;
        self.state.send_if_modified(|state| {
            if is_auto && (!state.auto_run.is_running || state.auto_run.generation != generation) {
                return false;
            }
            applied = true;
            match &result {
                Ok(outcome) => {
                    if let Some(calculated) = outcome.calculated_demand {
                        state.demand.demand_kw = calculated;
                    }
                    state.last_step = Some(outcome.clone());
                    if is_auto {
                        state.auto_run.step_count = state.auto_run.step_count.saturating_add(1);
                    }
                    state.clear_error(ErrorSource::Step);
                }
                Err(err) => {
                    state.record_error(ErrorSource::Step, err);
                    if is_auto {
                        state.auto_run.set_running(false);
                    }
                }
            }
            true
        });

        if !applied {
            debug!(generation, "discarding auto step from a stopped auto-run");
            return Err(SyncError::StaleAutoStep);
        }

        match result {
            Ok(outcome) => {
                debug!(auto = is_auto, demand_kw = ?outcome.calculated_demand, "simulation stepped");
                Ok(outcome)
            }
            Err(err) => {
                if is_auto {
                    warn!(error = %err, "auto step failed, auto-run stopped");
                } else {
                    warn!(error = %err, "simulation step failed");
                }
                Err(err.into())
            }
        }
    }

    /// Starts or stops auto-run. Returns the new running flag.
    pub fn toggle_auto_run(&self) -> bool {
        let mut running = false;
        self.state.send_modify(|state| {
            let next = !state.auto_run.is_running;
            state.auto_run.set_running(next);
            state.auto_run.step_count = 0;
            running = next;
        });
        info!(running, "auto-run toggled");
        running
    }

    /// Clamps to 1..=60 seconds. Rejected while auto-run is active.
    pub fn set_auto_interval(&self, secs: u64) -> Result<u64, SyncError> {
        let interval = clamp_auto_interval(secs);
        let mut rejected = false;
        self.state.send_if_modified(|state| {
            if state.auto_run.is_running {
                rejected = true;
                return false;
            }
            let changed = state.auto_run.interval_secs != interval;
            state.auto_run.interval_secs = interval;
            changed
        });
        if rejected {
            return Err(SyncError::AutoRunActive);
        }
        Ok(interval)
    }

    pub fn reset_auto_run(&self) {
        self.state.send_modify(|state| {
            state.auto_run.set_running(false);
            state.auto_run.step_count = 0;
        });
    }

    pub fn set_demand_mode(&self, mode: DemandMode) {
        self.state.send_if_modified(|state| {
            let changed = state.demand.mode != mode;
            state.demand.mode = mode;
            changed
        });
    }

    pub fn set_demand_kw(&self, demand_kw: f64) -> Result<(), SyncError> {
        if !demand_kw.is_finite() || demand_kw < 0.0 {
            return Err(SyncError::InvalidParameter { name: "demand_kw", value: demand_kw });
        }
        self.state.send_modify(|state| state.demand.demand_kw = demand_kw);
        Ok(())
    }

    pub fn set_total_daily_kwh(&self, total_daily_kwh: f64) -> Result<(), SyncError> {
        if !total_daily_kwh.is_finite() || total_daily_kwh <= 0.0 {
            return Err(SyncError::InvalidParameter {
                name: "total_daily_kwh",
                value: total_daily_kwh,
            });
        }
        self.state.send_modify(|state| state.demand.total_daily_kwh = total_daily_kwh);
        Ok(())
    }

    pub fn set_timestep_hours(&self, timestep_hours: f64) -> Result<(), SyncError> {
        if !valid_timestep(timestep_hours) {
            return Err(SyncError::InvalidParameter {
                name: "timestep_hours",
                value: timestep_hours,
            });
        }
        self.state.send_modify(|state| state.demand.timestep_hours = timestep_hours);
        Ok(())
    }

    pub async fn reset_simulation(&self) -> Result<EnvironmentReply, ApiError> {
        self.command("reset", self.api.reset()).await
    }

    pub async fn step_environment(&self, timestep_hours: f64) -> Result<EnvironmentReply, SyncError> {
        if !valid_timestep(timestep_hours) {
            return Err(SyncError::InvalidParameter {
                name: "timestep_hours",
                value: timestep_hours,
            });
        }
        Ok(self
            .command("step environment", self.api.step_environment(timestep_hours))
            .await?)
    }

    pub async fn set_environment(
        &self,
        param: EnvironmentParam,
        value: f64,
    ) -> Result<EnvironmentReply, SyncError> {
        if !value.is_finite() {
            return Err(SyncError::InvalidParameter { name: param.as_str(), value });
        }
        Ok(self
            .command("set environment", self.api.set_environment(param, value))
            .await?)
    }

    pub async fn set_diesel_strategy(&self, strategy: DieselStrategy) -> Result<CommandReply, ApiError> {
        self.command("set diesel strategy", self.api.set_diesel_strategy(strategy))
            .await
    }

    pub async fn set_diesel_setpoint(&self, generator: &str, setpoint_kw: f64) -> Result<CommandReply, SyncError> {
        if !setpoint_kw.is_finite() || setpoint_kw < 0.0 {
            return Err(SyncError::InvalidParameter {
                name: "setpoint_kw",
                value: setpoint_kw,
            });
        }
        Ok(self
            .command(
                "set diesel setpoint",
                self.api.set_diesel_setpoint(generator, setpoint_kw),
            )
            .await?)
    }

    pub async fn add_device(&self, spec: &DeviceSpec) -> Result<CommandReply, ApiError> {
        self.command("add device", self.api.add_device(spec)).await
    }

    pub async fn remove_device(&self, name: &str) -> Result<CommandReply, ApiError> {
        self.command("remove device", self.api.remove_device(name)).await
    }

    pub async fn analyze_scenario(&self, request: &ScenarioRequest) -> Result<ScenarioReport, ApiError> {
        let result = self.api.analyze_scenario(request).await;
        self.observe(ErrorSource::Command, &result);
        result
    }

    pub async fn battery_status(&self) -> Result<BatteryReport, ApiError> {
        let result = self.api.battery_status().await;
        self.observe(ErrorSource::Poll, &result);
        result
    }

    pub async fn device_status(&self) -> Result<DeviceReport, ApiError> {
        let result = self.api.device_status().await;
        self.observe(ErrorSource::Poll, &result);
        result
    }

    pub async fn grid_status(&self) -> Result<GridReport, ApiError> {
        let result = self.api.grid_status().await;
        self.observe(ErrorSource::Poll, &result);
        result
    }

    pub async fn diesel_status(&self) -> Result<DieselReport, ApiError> {
        let result = self.api.diesel_status().await;
        self.observe(ErrorSource::Poll, &result);
        result
    }

    pub async fn health(&self) -> Result<HealthReport, ApiError> {
        let result = self.api.health().await;
        self.observe(ErrorSource::Poll, &result);
        result
    }

    /// Forwards a mutating call and refreshes the snapshot once it lands.
    async fn command<T, F>(&self, action: &'static str, call: F) -> Result<T, ApiError>
    where
        F: Future<Output = Result<T, ApiError>>,
    {
        let result = call.await;
        self.observe(ErrorSource::Command, &result);
        if let Err(err) = &result {
            warn!(action, error = %err, "command failed");
            return result;
        }
        info!(action, "command applied");
        // A failed refresh is already tracked by the poll counters.
        let _ = self.fetch_snapshot().await;
        result
    }

    fn observe<T>(&self, source: ErrorSource, result: &Result<T, ApiError>) {
        match result {
            Ok(_) => {
                self.state.send_if_modified(|state| state.clear_error(source));
            }
            Err(err) => self.state.send_modify(|state| state.record_error(source, err)),
        }
    }
}

fn valid_timestep(hours: f64) -> bool {
    hours.is_finite() && hours > 0.0 && hours <= MAX_TIMESTEP_HOURS
}
