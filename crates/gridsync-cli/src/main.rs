use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use gridsync_core::config::DEFAULT_BASE_URL;
use gridsync_core::device::{
    BatteryParams, DieselGeneratorParams, GridConnectionParams, SolarPanelParams, WindTurbineParams,
};
use gridsync_core::{
    ConnectionState, DemandMode, DeviceSpec, DieselStrategy, EnvironmentParam, HttpSimulationApi,
    ScenarioRequest, SyncConfig, SyncController, SystemSnapshot,
};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod render;
mod viewer;
#[cfg(test)]
mod viewer_tests;

type Controller = Arc<SyncController<HttpSimulationApi>>;

#[derive(Debug, Parser)]
#[command(name = "gridsync")]
#[command(about = "Client for the microgrid energy simulation server")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(long, default_value = DEFAULT_BASE_URL)]
    base_url: String,

    #[arg(long, default_value_t = 1000, value_parser = clap::value_parser!(u64).range(1..))]
    poll_interval_ms: u64,

    #[arg(long, default_value_t = 5000)]
    request_timeout_ms: u64,

    #[arg(long, default_value_t = 3)]
    failure_threshold: u32,

    #[arg(long, default_value_t = 5)]
    auto_interval_secs: u64,

    #[arg(long, value_enum, default_value = "realistic")]
    demand_mode: DemandArg,

    #[arg(long, default_value_t = 100.0)]
    demand_kw: f64,

    #[arg(long, default_value_t = 150.0)]
    total_daily_kwh: f64,

    #[arg(long, default_value_t = 1.0)]
    timestep_hours: f64,
}

#[derive(Debug, Subcommand)]
enum Command {
    Health,
    Status {
        #[arg(long, value_enum, default_value = "human")]
        format: OutputFormat,
    },
    Batteries {
        #[arg(long, value_enum, default_value = "human")]
        format: OutputFormat,
    },
    Devices {
        #[arg(long, value_enum, default_value = "human")]
        format: OutputFormat,
    },
    Grids {
        #[arg(long, value_enum, default_value = "human")]
        format: OutputFormat,
    },
    Diesel {
        #[command(subcommand)]
        action: DieselAction,
    },
    Watch {
        #[arg(long, value_enum, default_value = "human")]
        format: OutputFormat,
    },
    /// Advance the simulation with the configured demand parameters.
    Step {
        #[arg(long, default_value_t = 1)]
        count: u32,
        #[arg(long, value_enum, default_value = "human")]
        format: OutputFormat,
    },
    /// Step on the auto-run interval until ctrl-c, a failure, or `--steps`.
    Autorun {
        #[arg(long)]
        steps: Option<u64>,
        #[arg(long, value_enum, default_value = "human")]
        format: OutputFormat,
    },
    Reset,
    /// Set one environment variable, e.g. `env wind_speed 9.5`.
    Env {
        param: EnvironmentParam,
        value: f64,
    },
    /// Advance only the environment clock.
    EnvStep {
        #[arg(long, default_value_t = 1.0)]
        hours: f64,
    },
    Add {
        #[command(subcommand)]
        device: AddDevice,
    },
    Remove {
        name: String,
    },
    /// Compare costs with and without one device over a number of days.
    Analyze {
        #[arg(long)]
        exclude: String,
        #[arg(long, default_value_t = 7)]
        days: u32,
        #[arg(long, value_enum, default_value = "human")]
        format: OutputFormat,
    },
    View {
        #[arg(long, default_value_t = 120)]
        history: usize,
        /// Seed the alert pane with the demo notification set.
        #[arg(long)]
        sample_alerts: bool,
    },
}

#[derive(Debug, Subcommand)]
enum DieselAction {
    Status {
        #[arg(long, value_enum, default_value = "human")]
        format: OutputFormat,
    },
    Strategy {
        strategy: DieselStrategy,
    },
    Setpoint {
        generator: String,
        setpoint_kw: f64,
    },
}

#[derive(Debug, Subcommand)]
enum AddDevice {
    WindTurbine {
        name: String,
        #[arg(long)]
        rated_power: f64,
        #[arg(long, default_value_t = 0)]
        direction: i32,
        #[arg(long)]
        cut_in_speed: Option<f64>,
        #[arg(long)]
        rated_speed: Option<f64>,
        #[arg(long)]
        cut_out_speed: Option<f64>,
    },
    SolarPanel {
        name: String,
        #[arg(long)]
        rated_power: f64,
        #[arg(long)]
        temp_coefficient: Option<f64>,
        #[arg(long)]
        stc_temp: Option<f64>,
    },
    DieselGenerator {
        name: String,
        #[arg(long)]
        rated_power: f64,
        #[arg(long)]
        usage_litre_per_kw: Option<f64>,
    },
    Battery {
        name: String,
        #[arg(long)]
        capacity_kwh: f64,
        #[arg(long)]
        max_power_kw: f64,
        #[arg(long)]
        efficiency: Option<f64>,
        #[arg(long)]
        initial_charge: Option<f64>,
    },
    GridConnection {
        name: String,
        #[arg(long)]
        import_price: f64,
        #[arg(long)]
        export_price: f64,
    },
}

impl AddDevice {
    fn into_spec(self) -> DeviceSpec {
        match self {
            Self::WindTurbine {
                name,
                rated_power,
                direction,
                cut_in_speed,
                rated_speed,
                cut_out_speed,
            } => {
                let mut params = WindTurbineParams::new(name, rated_power, direction);
                params.cut_in_speed = cut_in_speed.unwrap_or(params.cut_in_speed);
                params.rated_speed = rated_speed.unwrap_or(params.rated_speed);
                params.cut_out_speed = cut_out_speed.unwrap_or(params.cut_out_speed);
                DeviceSpec::WindTurbine(params)
            }
            Self::SolarPanel {
                name,
                rated_power,
                temp_coefficient,
                stc_temp,
            } => {
                let mut params = SolarPanelParams::new(name, rated_power);
                params.temp_coefficient = temp_coefficient.unwrap_or(params.temp_coefficient);
                params.stc_temp = stc_temp.unwrap_or(params.stc_temp);
                DeviceSpec::SolarPanel(params)
            }
            Self::DieselGenerator {
                name,
                rated_power,
                usage_litre_per_kw,
            } => {
                let mut params = DieselGeneratorParams::new(name, rated_power);
                params.diesel_usage_litre_per_kw =
                    usage_litre_per_kw.unwrap_or(params.diesel_usage_litre_per_kw);
                DeviceSpec::DieselGenerator(params)
            }
            Self::Battery {
                name,
                capacity_kwh,
                max_power_kw,
                efficiency,
                initial_charge,
            } => {
                let mut params = BatteryParams::new(name, capacity_kwh, max_power_kw);
                params.efficiency = efficiency.unwrap_or(params.efficiency);
                params.initial_charge = initial_charge.unwrap_or(params.initial_charge);
                DeviceSpec::Battery(params)
            }
            Self::GridConnection {
                name,
                import_price,
                export_price,
            } => DeviceSpec::GridConnection(GridConnectionParams {
                name,
                import_price,
                export_price,
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Human,
    Json,
    Ndjson,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DemandArg {
    Explicit,
    Realistic,
}

impl From<DemandArg> for DemandMode {
    fn from(arg: DemandArg) -> Self {
        match arg {
            DemandArg::Explicit => DemandMode::Explicit,
            DemandArg::Realistic => DemandMode::Realistic,
        }
    }
}

impl Cli {
    fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            base_url: self.base_url.clone(),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            request_timeout: Duration::from_millis(self.request_timeout_ms),
            failure_threshold: self.failure_threshold,
            auto_interval_secs: self.auto_interval_secs,
            demand_mode: self.demand_mode.into(),
            demand_kw: self.demand_kw,
            total_daily_kwh: self.total_daily_kwh,
            timestep_hours: self.timestep_hours,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();
    let config = cli.sync_config();

    let api = HttpSimulationApi::new(&config).context("invalid --base-url")?;
    let controller = Arc::new(SyncController::new(api, config));
    // Run the flag values through the controller's own range checks.
    controller.set_demand_kw(cli.demand_kw)?;
    controller.set_total_daily_kwh(cli.total_daily_kwh)?;
    controller.set_timestep_hours(cli.timestep_hours)?;

    match cli.command {
        Command::Health => {
            let report = controller.health().await?;
            println!("{}", render::health(&report));
        }
        Command::Status { format } => {
            let snapshot = controller.fetch_snapshot().await?;
            emit(&*snapshot, format, render::snapshot)?;
        }
        Command::Batteries { format } => {
            let report = controller.battery_status().await?;
            emit(&report, format, render::batteries)?;
        }
        Command::Devices { format } => {
            let report = controller.device_status().await?;
            emit(&report, format, render::devices)?;
        }
        Command::Grids { format } => {
            let report = controller.grid_status().await?;
            emit(&report, format, render::grids)?;
        }
        Command::Diesel { action } => run_diesel(&controller, action).await?,
        Command::Watch { format } => watch_loop(&controller, format).await?,
        Command::Step { count, format } => {
            for _ in 0..count {
                let outcome = controller.run_step(false).await?;
                emit(&outcome, format, render::step)?;
            }
        }
        Command::Autorun { steps, format } => autorun_loop(&controller, steps, format).await?,
        Command::Reset => {
            let reply = controller.reset_simulation().await?;
            println!("{}", reply.message.as_deref().unwrap_or("simulation reset"));
        }
        Command::Env { param, value } => {
            let reply = controller.set_environment(param, value).await?;
            println!(
                "{}",
                reply
                    .message
                    .unwrap_or_else(|| format!("{param} set to {value}"))
            );
        }
        Command::EnvStep { hours } => {
            let reply = controller.step_environment(hours).await?;
            let time = reply.environment.and_then(|env| env.time);
            println!("environment advanced {hours}h, now {}", time.as_deref().unwrap_or("n/a"));
        }
        Command::Add { device } => {
            let spec = device.into_spec();
            let reply = controller.add_device(&spec).await?;
            println!(
                "{}",
                reply
                    .message
                    .unwrap_or_else(|| format!("added {} {}", spec.type_path(), spec.name()))
            );
        }
        Command::Remove { name } => {
            let reply = controller.remove_device(&name).await?;
            println!("{}", reply.message.unwrap_or_else(|| format!("removed {name}")));
        }
        Command::Analyze {
            exclude,
            days,
            format,
        } => {
            let request = ScenarioRequest {
                exclude_device_name: exclude,
                duration_days: days,
            };
            let report = controller.analyze_scenario(&request).await?;
            emit(&report, format, render::scenario)?;
        }
        Command::View {
            history,
            sample_alerts,
        } => viewer::run_viewer(Arc::clone(&controller), history, sample_alerts).await?,
    }

    Ok(())
}

async fn run_diesel(controller: &Controller, action: DieselAction) -> Result<()> {
    match action {
        DieselAction::Status { format } => {
            let report = controller.diesel_status().await?;
            emit(&report, format, render::diesel)?;
        }
        DieselAction::Strategy { strategy } => {
            let reply = controller.set_diesel_strategy(strategy).await?;
            println!(
                "{}",
                reply
                    .message
                    .unwrap_or_else(|| format!("diesel strategy set to {strategy}"))
            );
        }
        DieselAction::Setpoint {
            generator,
            setpoint_kw,
        } => {
            let reply = controller.set_diesel_setpoint(&generator, setpoint_kw).await?;
            println!(
                "{}",
                reply
                    .message
                    .unwrap_or_else(|| format!("{generator} setpoint {}", render::kw(setpoint_kw)))
            );
        }
    }
    Ok(())
}

async fn watch_loop(controller: &Controller, format: OutputFormat) -> Result<()> {
    let mut updates = controller.subscribe();
    let poller = controller.spawn_poller(controller.config().poll_interval);
    let mut printed: Option<Arc<SystemSnapshot>> = None;
    let mut connection = ConnectionState::Disconnected;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                warn!("received ctrl-c, stopping");
                break;
            }
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = updates.borrow_and_update().clone();
                if state.connection != connection {
                    connection = state.connection;
                    info!(connection = ?connection, failures = state.consecutive_failures, "connection changed");
                }
                let Some(snapshot) = state.snapshot else { continue };
                if printed.as_ref().is_some_and(|last| Arc::ptr_eq(last, &snapshot)) {
                    continue;
                }
                emit(&*snapshot, format, render::snapshot)?;
                printed = Some(snapshot);
            }
        }
    }

    poller.stop();
    Ok(())
}

async fn autorun_loop(controller: &Controller, steps: Option<u64>, format: OutputFormat) -> Result<()> {
    let mut updates = controller.subscribe();
    let runner = controller.spawn_auto_runner();
    let poller = controller.spawn_poller(controller.config().poll_interval);
    controller.toggle_auto_run();
    let mut reported = 0;

    let result = loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                warn!("received ctrl-c, stopping auto-run");
                break Ok(());
            }
            changed = updates.changed() => {
                if changed.is_err() {
                    break Ok(());
                }
                let state = updates.borrow_and_update().clone();
                let auto_run = state.auto_run;
                if auto_run.step_count > reported {
                    reported = auto_run.step_count;
                    if let Some(outcome) = &state.last_step {
                        emit(outcome, format, render::step)?;
                    }
                    info!(step = reported, interval_secs = auto_run.interval_secs, "auto step");
                }
                if steps.is_some_and(|limit| reported >= limit) {
                    break Ok(());
                }
                if !auto_run.is_running {
                    let reason = state
                        .last_error
                        .map(|e| e.message)
                        .unwrap_or_else(|| "stopped".to_string());
                    break Err(reason);
                }
            }
        }
    };

    controller.reset_auto_run();
    runner.stop();
    poller.stop();

    if let Err(reason) = result {
        bail!("auto-run stopped after {reported} steps: {reason}");
    }
    Ok(())
}

fn emit<T: Serialize>(value: &T, format: OutputFormat, human: fn(&T) -> String) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(value)?);
        }
        OutputFormat::Ndjson => {
            println!("{}", serde_json::to_string(value)?);
        }
        OutputFormat::Human => {
            println!("{}", human(value).trim_end());
        }
    }
    Ok(())
}
