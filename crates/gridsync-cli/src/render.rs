use std::fmt::Write;

use gridsync_core::reports::{
    BatteryReport, DeviceReport, DieselReport, GridReport, HealthReport, ScenarioMetrics, Setpoint,
};
use gridsync_core::{DeviceKind, GridFlow, ScenarioReport, StepOutcome, SystemSnapshot};

pub fn snapshot(snapshot: &SystemSnapshot) -> String {
    let mut out = String::new();
    let env = &snapshot.environment;
    let _ = writeln!(out, "=== Microgrid Snapshot ===");
    let _ = writeln!(
        out,
        "Time:        {}",
        env.time.as_deref().unwrap_or(&snapshot.timestamp)
    );
    let _ = writeln!(
        out,
        "Weather:     temp={} solar={} wind={} dir={} clouds={}",
        optional(env.temperature, "C"),
        optional(env.solar_radiation, "W/m2"),
        optional(env.wind_speed, "m/s"),
        optional(env.wind_direction, "deg"),
        env.cloud_cover
            .map(|c| format!("{:.0}%", c * 100.0))
            .unwrap_or_else(|| "n/a".to_string()),
    );
    let _ = writeln!(
        out,
        "Totals:      generation={} storage={} grid={} devices={}",
        kw(snapshot.total_generation),
        kw(snapshot.total_storage_power),
        kw(snapshot.total_grid_power),
        snapshot.device_count,
    );
    let _ = writeln!(
        out,
        "Storage:     {:.1}/{:.1} kWh  diesel strategy={}",
        snapshot.stored_energy_kwh(),
        snapshot.storage_capacity_kwh(),
        snapshot.diesel_strategy,
    );

    for device in &snapshot.devices {
        let marker = if device.kind.is_renewable() { "*" } else { " " };
        let _ = writeln!(
            out,
            " {marker} {:<18} {:<16} {:>10}",
            device.name,
            kind_label(device.kind),
            kw(device.power_output),
        );
    }
    for battery in &snapshot.batteries {
        let _ = writeln!(
            out,
            "   battery {:<10} {:>5.1}% ({:.1} kWh) {}",
            battery.name,
            battery.soc_percent(),
            battery.state_of_charge,
            kw(battery.current_power),
        );
    }
    for grid in &snapshot.grid_connections {
        let _ = writeln!(
            out,
            "   grid    {:<10} {} {}",
            grid.name,
            flow_label(grid.flow()),
            kw(grid.current_power.abs()),
        );
    }
    out
}

pub fn step(outcome: &StepOutcome) -> String {
    let mut out = String::from("step:");
    if let Some(demand) = outcome.calculated_demand {
        let _ = write!(out, " demand={}", kw(demand));
    }
    for (key, value) in &outcome.simulation_results {
        match value.as_f64() {
            Some(number) => {
                let _ = write!(out, " {key}={number:.2}");
            }
            None => {
                let _ = write!(out, " {key}={value}");
            }
        }
    }
    out
}

pub fn health(report: &HealthReport) -> String {
    format!(
        "{} api={} devices={} clock={} ({})",
        report.status,
        report.api_version,
        report.devices_count,
        report.environment_time,
        report.timestamp,
    )
}

pub fn batteries(report: &BatteryReport) -> String {
    let mut out = String::new();
    for battery in &report.batteries {
        let _ = writeln!(
            out,
            "{:<16} {:>5.1}%  {:>7.1}/{:<7.1} kWh  {:>10}  max {}",
            battery.name,
            battery.soc_percent(),
            battery.state_of_charge,
            battery.capacity_kwh,
            kw(battery.current_power),
            kw(battery.max_power_kw),
        );
    }
    let _ = writeln!(
        out,
        "{} batteries, {:.1}/{:.1} kWh stored, {}",
        report.total_batteries,
        report.total_energy_kwh,
        report.total_capacity_kwh,
        kw(report.total_power_kw),
    );
    out
}

pub fn devices(report: &DeviceReport) -> String {
    let mut out = String::new();
    for device in &report.devices {
        let _ = writeln!(
            out,
            "{:<18} {:<16} {:>10}",
            device.name,
            kind_label(device.kind),
            kw(device.power_output),
        );
    }
    let _ = writeln!(
        out,
        "{} devices, generation {}",
        report.total_devices,
        kw(report.total_generation),
    );
    out
}

pub fn grids(report: &GridReport) -> String {
    let mut out = String::new();
    for grid in &report.grid_connections {
        let _ = writeln!(
            out,
            "{:<16} {:<9} {:>10}  import {:.3}/kWh  export {:.3}/kWh",
            grid.name,
            flow_label(grid.flow()),
            kw(grid.current_power.abs()),
            grid.import_price,
            grid.export_price,
        );
    }
    let _ = writeln!(
        out,
        "{} connections, net flow {}",
        report.total_grids,
        kw(report.total_power_flow),
    );
    out
}

pub fn diesel(report: &DieselReport) -> String {
    let mut out = String::new();
    for generator in &report.diesel_generators {
        let setpoint = match &generator.manual_setpoint {
            Setpoint::Manual(value) => kw(*value),
            Setpoint::Auto(mode) => mode.clone(),
        };
        let _ = writeln!(
            out,
            "{:<16} {:>10} of {:<10} {:>5.1}%  {:.1} l/h  setpoint {}",
            generator.name,
            kw(generator.current_output),
            kw(generator.rated_power),
            generator.utilization_percent,
            generator.current_diesel_usage,
            setpoint,
        );
    }
    let summary = &report.summary;
    let _ = writeln!(
        out,
        "{}/{} running, {} at {:.1}%, {:.1} l/h, strategy {}",
        summary.running_generators,
        summary.total_generators,
        kw(summary.total_diesel_output),
        summary.fleet_utilization,
        summary.total_diesel_usage_lph,
        summary.current_strategy,
    );
    out
}

pub fn scenario(report: &ScenarioReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{:<26} {:>14} {:>14}", "", "with", "without");
    let rows: [(&str, fn(&ScenarioMetrics) -> f64); 5] = [
        ("total cost", |m| m.total_cost),
        ("co2 emissions (kg)", |m| m.co2_emissions_kg),
        ("diesel usage (l)", |m| m.diesel_usage_l),
        ("grid import (kWh)", |m| m.grid_import_kwh),
        ("renewable gen. (kWh)", |m| m.renewable_generation_kwh),
    ];
    for (label, value) in rows {
        let _ = writeln!(
            out,
            "{label:<26} {:>14.2} {:>14.2}",
            value(&report.with_renewables),
            value(&report.without_renewables),
        );
    }
    let savings = &report.savings;
    let _ = writeln!(
        out,
        "savings: cost {:.2} ({:.1}%), co2 {:.2} kg ({:.1}%)",
        savings.cost_saved, savings.cost_saving_percent, savings.co2_saved_kg, savings.co2_saving_percent,
    );
    out
}

pub fn kw(value: f64) -> String {
    format!("{value:.1} kW")
}

pub fn kind_label(kind: DeviceKind) -> &'static str {
    match kind {
        DeviceKind::WindTurbine => "wind turbine",
        DeviceKind::SolarPanel => "solar panel",
        DeviceKind::DieselGenerator => "diesel generator",
        DeviceKind::Battery => "battery",
        DeviceKind::GridConnection => "grid connection",
        DeviceKind::Other => "other",
    }
}

pub fn flow_label(flow: GridFlow) -> &'static str {
    match flow {
        GridFlow::Importing => "importing",
        GridFlow::Exporting => "exporting",
        GridFlow::Idle => "idle",
    }
}

fn optional(value: Option<f64>, unit: &str) -> String {
    value
        .map(|v| format!("{v:.1}{unit}"))
        .unwrap_or_else(|| "n/a".to_string())
}
