use std::sync::Arc;

use chrono::{TimeZone, Utc};
use gridsync_core::{
    ConnectionState, ErrorReport, ErrorSource, HttpSimulationApi, NotificationStore, Severity, SyncConfig,
    SyncController, SyncState, SystemSnapshot,
};
use serde_json::json;

use crate::viewer::{header_lines, ViewerState};

fn idle_state() -> SyncState {
    let config = SyncConfig::default();
    let api = HttpSimulationApi::new(&config).expect("default base url");
    SyncController::new(api, config).state()
}

fn snapshot_at(timestamp: &str) -> Arc<SystemSnapshot> {
    let snapshot = serde_json::from_value(json!({
        "timestamp": timestamp,
        "environment": {},
        "devices": [],
        "diesel_strategy": "demand_following",
        "total_generation": 10.0,
        "total_storage_power": 0.0,
        "total_grid_power": 2.0,
        "device_count": 0
    }))
    .expect("fixture snapshot decodes");
    Arc::new(snapshot)
}

fn viewer(alerts: NotificationStore) -> ViewerState {
    ViewerState::new("http://localhost:8000".to_string(), idle_state(), 10, alerts)
}

#[test]
fn connection_transitions_raise_alerts_after_first_connect() {
    // Arrange
    let now = Utc
        .with_ymd_and_hms(2025, 3, 1, 14, 30, 0)
        .single()
        .expect("valid date");
    let mut view = viewer(NotificationStore::new());
    let mut connected = idle_state();
    connected.connection = ConnectionState::Connected;
    connected.snapshot = Some(snapshot_at("2025-03-01T12:00:00"));
    let mut lost = connected.clone();
    lost.connection = ConnectionState::Disconnected;
    lost.last_error = Some(ErrorReport {
        source: ErrorSource::Poll,
        message: "request failed: connection refused".to_string(),
        at: now,
    });

    // Act + Assert
    view.update(connected.clone(), now);
    assert!(view.alerts.is_empty(), "first connect is not a restore");

    view.update(lost, now);
    let alert = &view.alerts.alerts()[0];
    assert_eq!(alert.severity, Severity::Error);
    assert!(alert.id.starts_with("CONN-LOST-"));
    assert!(alert.detail.ends_with("request failed: connection refused"));

    view.update(connected, now);
    assert_eq!(view.alerts.len(), 2);
    assert_eq!(view.alerts.alerts()[0].severity, Severity::Info);
    assert_eq!(view.alerts.unread_count(), 2);
}

#[test]
fn repeated_updates_of_one_snapshot_chart_once() {
    // Arrange
    let mut view = viewer(NotificationStore::new());
    let mut state = idle_state();
    state.connection = ConnectionState::Connected;
    state.snapshot = Some(snapshot_at("2025-03-01T12:00:00"));
    let now = Utc::now();

    // Act
    view.update(state.clone(), now);
    view.update(state.clone(), now);
    state.snapshot = Some(snapshot_at("2025-03-01T13:00:00"));
    view.update(state, now);

    // Assert
    assert_eq!(view.history.len(), 2);
    assert_eq!(view.history.latest().and_then(|p| p.demand_kw), Some(100.0));
}

#[test]
fn selection_follows_grouped_order_and_clamps_on_remove() {
    // Arrange
    let mut view = viewer(NotificationStore::with_sample_alerts(Utc::now()));

    // Act + Assert
    assert_eq!(view.selected_id().as_deref(), Some("E-01"));
    view.acknowledge_selected();
    assert_eq!(view.alerts.unread_count(), 4);

    for _ in 0..10 {
        view.select_next();
    }
    assert_eq!(view.selected_id().as_deref(), Some("I-02"));

    view.remove_selected();
    assert_eq!(view.alerts.len(), 5);
    assert_eq!(view.selected_id().as_deref(), Some("I-01"));

    view.select_prev();
    assert_eq!(view.selected_id().as_deref(), Some("W-02"));
}

fn line_text(line: &ratatui::text::Line<'_>) -> String {
    line.spans.iter().map(|span| span.content.as_ref()).collect()
}

#[test]
fn header_keeps_action_feedback_while_an_error_is_shown() {
    // Arrange
    let mut view = viewer(NotificationStore::new());
    let mut state = idle_state();
    state.last_error = Some(ErrorReport {
        source: ErrorSource::Step,
        message: "HTTP 500: Simulation error: boom".to_string(),
        at: Utc::now(),
    });
    view.update(state, Utc::now());
    let before_action: Vec<String> = header_lines(&view).iter().map(line_text).collect();

    // Act
    view.message = Some("auto-run interval 6s".to_string());
    let after_action: Vec<String> = header_lines(&view).iter().map(line_text).collect();

    // Assert
    assert!(before_action.iter().any(|l| l.starts_with("space auto-run")));
    assert!(after_action.iter().any(|l| l == "auto-run interval 6s"));
    assert!(after_action
        .iter()
        .any(|l| l == "Step error: HTTP 500: Simulation error: boom"));
}
