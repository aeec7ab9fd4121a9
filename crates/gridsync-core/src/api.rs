use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde_json::json;
use thiserror::Error;
use tracing::debug;

use crate::config::SyncConfig;
use crate::device::{DeviceSpec, EnvironmentParam};
use crate::reports::{
    BatteryReport, CommandReply, DeviceReport, DieselReport, EnvironmentReply, GridReport,
    HealthReport, ScenarioReport, ScenarioRequest, StepOutcome,
};
use crate::snapshot::{DieselStrategy, SystemSnapshot};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ApiError {
    #[error("invalid base url: {0}")]
    InvalidUrl(String),
    #[error("request failed: {0}")]
    Transport(String),
    #[error("{}", status_message(*status, detail.as_deref()))]
    Status { status: u16, detail: Option<String> },
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Builds a status error from a non-2xx body, keeping the `detail` field
    /// when the body carries one.
    pub fn from_status_body(status: u16, body: &str) -> Self {
        let detail = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|value| value.get("detail").cloned())
            .map(|detail| match detail {
                serde_json::Value::String(text) => text,
                other => other.to_string(),
            });
        Self::Status { status, detail }
    }

    fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Transport("timeout".to_string())
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

fn status_message(status: u16, detail: Option<&str>) -> String {
    match detail {
        Some(detail) => format!("HTTP {status}: {detail}"),
        None => format!("HTTP {status}"),
    }
}

/// The remote simulation server. Every call is one HTTP request.
#[async_trait]
pub trait SimulationApi: Send + Sync {
    async fn system_status(&self) -> Result<SystemSnapshot, ApiError>;
    async fn battery_status(&self) -> Result<BatteryReport, ApiError>;
    async fn device_status(&self) -> Result<DeviceReport, ApiError>;
    async fn grid_status(&self) -> Result<GridReport, ApiError>;
    async fn diesel_status(&self) -> Result<DieselReport, ApiError>;
    async fn health(&self) -> Result<HealthReport, ApiError>;
    async fn step_environment(&self, timestep_hours: f64) -> Result<EnvironmentReply, ApiError>;
    async fn simulate_step(&self, demand_kw: f64, timestep_hours: f64) -> Result<StepOutcome, ApiError>;
    async fn simulate_realistic(
        &self,
        total_daily_kwh: f64,
        timestep_hours: f64,
    ) -> Result<StepOutcome, ApiError>;
    async fn reset(&self) -> Result<EnvironmentReply, ApiError>;
    async fn set_environment(&self, param: EnvironmentParam, value: f64) -> Result<EnvironmentReply, ApiError>;
    async fn set_diesel_strategy(&self, strategy: DieselStrategy) -> Result<CommandReply, ApiError>;
    async fn set_diesel_setpoint(&self, generator: &str, setpoint_kw: f64) -> Result<CommandReply, ApiError>;
    async fn add_device(&self, spec: &DeviceSpec) -> Result<CommandReply, ApiError>;
    async fn remove_device(&self, name: &str) -> Result<CommandReply, ApiError>;
    async fn analyze_scenario(&self, request: &ScenarioRequest) -> Result<ScenarioReport, ApiError>;
}

pub struct HttpSimulationApi {
    client: Client,
    base_url: Url,
}

impl HttpSimulationApi {
    pub fn new(config: &SyncConfig) -> Result<Self, ApiError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|err| ApiError::InvalidUrl(format!("{}: {err}", config.base_url)))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(config.base_url.clone()));
        }

        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|err| ApiError::Transport(format!("failed to build http client: {err}")))?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Joins percent-encoded path segments onto the base url.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| ApiError::InvalidUrl(self.base_url.to_string()))?;
            path.pop_if_empty();
            if segments.is_empty() {
                path.push("");
            } else {
                path.extend(segments);
            }
        }
        Ok(url)
    }

    fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder, ApiError> {
        let url = self.endpoint(segments)?;
        debug!(%method, %url, "api request");
        Ok(self.client.request(method, url))
    }

    async fn send<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, ApiError> {
        let response = request.send().await.map_err(ApiError::from_transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_status_body(status.as_u16(), &body));
        }

        let bytes = response.bytes().await.map_err(ApiError::from_transport)?;
        serde_json::from_slice(&bytes).map_err(|err| ApiError::Decode(err.to_string()))
    }
}

#[async_trait]
impl SimulationApi for HttpSimulationApi {
    async fn system_status(&self) -> Result<SystemSnapshot, ApiError> {
        Self::send(self.request(Method::GET, &[])?).await
    }

    async fn battery_status(&self) -> Result<BatteryReport, ApiError> {
        Self::send(self.request(Method::GET, &["batteries", "status"])?).await
    }

    async fn device_status(&self) -> Result<DeviceReport, ApiError> {
        Self::send(self.request(Method::GET, &["devices"])?).await
    }

    async fn grid_status(&self) -> Result<GridReport, ApiError> {
        Self::send(self.request(Method::GET, &["grids", "status"])?).await
    }

    async fn diesel_status(&self) -> Result<DieselReport, ApiError> {
        Self::send(self.request(Method::GET, &["diesel", "status"])?).await
    }

    async fn health(&self) -> Result<HealthReport, ApiError> {
        Self::send(self.request(Method::GET, &["health"])?).await
    }

    async fn step_environment(&self, timestep_hours: f64) -> Result<EnvironmentReply, ApiError> {
        let request = self
            .request(Method::POST, &["step"])?
            .query(&[("timestep_hours", timestep_hours)]);
        Self::send(request).await
    }

    async fn simulate_step(&self, demand_kw: f64, timestep_hours: f64) -> Result<StepOutcome, ApiError> {
        let request = self
            .request(Method::POST, &["simulate", "step"])?
            .json(&json!({
                "demand_kw": demand_kw,
                "timestep_hours": timestep_hours,
            }));
        Self::send(request).await
    }

    async fn simulate_realistic(
        &self,
        total_daily_kwh: f64,
        timestep_hours: f64,
    ) -> Result<StepOutcome, ApiError> {
        let request = self
            .request(Method::POST, &["simulate", "realistic"])?
            .query(&[
                ("total_daily_kwh", total_daily_kwh),
                ("timestep_hours", timestep_hours),
            ]);
        Self::send(request).await
    }

    async fn reset(&self) -> Result<EnvironmentReply, ApiError> {
        Self::send(self.request(Method::POST, &["reset"])?).await
    }

    async fn set_environment(&self, param: EnvironmentParam, value: f64) -> Result<EnvironmentReply, ApiError> {
        let request = self
            .request(Method::POST, &["environment", param.as_str()])?
            .query(&[(param.as_str(), value)]);
        Self::send(request).await
    }

    async fn set_diesel_strategy(&self, strategy: DieselStrategy) -> Result<CommandReply, ApiError> {
        let request = self
            .request(Method::POST, &["diesel", "strategy"])?
            .query(&[("strategy", strategy.as_str())]);
        Self::send(request).await
    }

    async fn set_diesel_setpoint(&self, generator: &str, setpoint_kw: f64) -> Result<CommandReply, ApiError> {
        let request = self
            .request(Method::POST, &["diesel", generator, "setpoint"])?
            .json(&json!({ "setpoint_kw": setpoint_kw }));
        Self::send(request).await
    }

    async fn add_device(&self, spec: &DeviceSpec) -> Result<CommandReply, ApiError> {
        let body = spec
            .body()
            .map_err(|err| ApiError::Decode(format!("failed to encode device: {err}")))?;
        let request = self
            .request(Method::POST, &["add", spec.type_path()])?
            .json(&body);
        Self::send(request).await
    }

    async fn remove_device(&self, name: &str) -> Result<CommandReply, ApiError> {
        Self::send(self.request(Method::DELETE, &["remove", name])?).await
    }

    async fn analyze_scenario(&self, request: &ScenarioRequest) -> Result<ScenarioReport, ApiError> {
        let builder = self
            .request(Method::POST, &["analyze", "scenario"])?
            .json(request);
        Self::send(builder).await
    }
}
