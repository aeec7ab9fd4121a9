use std::time::Duration;

use crate::controller::DemandMode;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

pub const AUTO_INTERVAL_MIN_SECS: u64 = 1;
pub const AUTO_INTERVAL_MAX_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub base_url: String,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    /// Consecutive polling failures before the connection is reported down.
    pub failure_threshold: u32,
    pub auto_interval_secs: u64,
    pub demand_mode: DemandMode,
    pub demand_kw: f64,
    pub total_daily_kwh: f64,
    pub timestep_hours: f64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            poll_interval: Duration::from_secs(1),
            request_timeout: Duration::from_secs(5),
            failure_threshold: 3,
            auto_interval_secs: 5,
            demand_mode: DemandMode::Realistic,
            demand_kw: 100.0,
            total_daily_kwh: 150.0,
            timestep_hours: 1.0,
        }
    }
}

pub fn clamp_auto_interval(secs: u64) -> u64 {
    secs.clamp(AUTO_INTERVAL_MIN_SECS, AUTO_INTERVAL_MAX_SECS)
}
