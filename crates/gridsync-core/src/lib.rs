pub mod alerts;
pub mod api;
pub mod config;
pub mod controller;
pub mod device;
pub mod history;
pub mod reports;
pub mod snapshot;
pub mod task;

#[cfg(test)]
mod alerts_tests;
#[cfg(test)]
mod history_tests;
#[cfg(test)]
mod test_support;

pub use alerts::{Alert, NotificationStore, Severity};
pub use api::{ApiError, HttpSimulationApi, SimulationApi};
pub use config::SyncConfig;
pub use controller::{
    AutoRunState, ConnectionState, DemandMode, DemandParams, ErrorReport, ErrorSource, SyncController,
    SyncError, SyncState,
};
pub use device::{DeviceSpec, EnvironmentParam};
pub use history::{TrendHistory, TrendPoint};
pub use reports::{ScenarioReport, ScenarioRequest, StepOutcome};
pub use snapshot::{BatteryState, DeviceKind, DeviceState, DieselStrategy, GridFlow, GridState, SystemSnapshot};
pub use task::TaskHandle;
