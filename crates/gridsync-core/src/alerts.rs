use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Severity {
    /// Display order of the grouped list.
    pub const ORDER: [Severity; 3] = [Severity::Error, Severity::Warning, Severity::Info];

    pub fn label(self) -> &'static str {
        match self {
            Self::Error => "Errors",
            Self::Warning => "Warnings",
            Self::Info => "Information",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub severity: Severity,
    pub headline: String,
    pub detail: String,
    pub actions: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub acknowledged: bool,
}

impl Alert {
    pub fn new(
        id: impl Into<String>,
        severity: Severity,
        headline: impl Into<String>,
        detail: impl Into<String>,
        actions: &[&str],
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            severity,
            headline: headline.into(),
            detail: detail.into(),
            actions: actions.iter().map(|a| a.to_string()).collect(),
            created_at,
            acknowledged: false,
        }
    }

    /// The alert raised by the "add test alert" action.
    pub fn test_alert(now: DateTime<Utc>) -> Self {
        Self::new(
            format!("TEST-{}", now.timestamp_millis()),
            Severity::Warning,
            "Test Alert",
            "This is a test alert to demonstrate the notification system.",
            &["Acknowledge", "Dismiss"],
            now,
        )
    }

    pub fn connection_lost(server: &str, reason: &str, now: DateTime<Utc>) -> Self {
        Self::new(
            format!("CONN-LOST-{}", now.timestamp_millis()),
            Severity::Error,
            "Connection lost to server",
            format!("No data from {server}: {reason}"),
            &["Retry", "Open Dashboard"],
            now,
        )
    }

    pub fn connection_restored(server: &str, now: DateTime<Utc>) -> Self {
        Self::new(
            format!("CONN-OK-{}", now.timestamp_millis()),
            Severity::Info,
            "Connection restored",
            format!("Reconnected to {server} at {}.", now.format("%H:%M")),
            &["Open Dashboard"],
            now,
        )
    }

    fn acknowledged(mut self) -> Self {
        self.acknowledged = true;
        self
    }
}

/// In-memory alert list, most recent first, with an unread counter.
#[derive(Debug, Clone, Default)]
pub struct NotificationStore {
    alerts: Vec<Alert>,
    unread: usize,
}

impl NotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_alerts(alerts: Vec<Alert>) -> Self {
        let unread = alerts.iter().filter(|a| !a.acknowledged).count();
        Self { alerts, unread }
    }

    pub fn with_sample_alerts(now: DateTime<Utc>) -> Self {
        Self::from_alerts(sample_alerts(now))
    }

    pub fn alerts(&self) -> &[Alert] {
        &self.alerts
    }

    pub fn get(&self, id: &str) -> Option<&Alert> {
        self.alerts.iter().find(|a| a.id == id)
    }

    pub fn unread_count(&self) -> usize {
        self.unread
    }

    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }

    /// Marks the alert read. Unknown ids and already acknowledged alerts are
    /// left alone.
    pub fn acknowledge(&mut self, id: &str) {
        if let Some(alert) = self
            .alerts
            .iter_mut()
            .find(|a| a.id == id && !a.acknowledged)
        {
            alert.acknowledged = true;
        }
        self.unread = self.alerts.iter().filter(|a| !a.acknowledged).count();
    }

    /// Inserts the alert first and unread. An alert with the same id is
    /// replaced.
    pub fn add(&mut self, mut alert: Alert) {
        alert.acknowledged = false;
        self.remove(&alert.id);
        self.alerts.insert(0, alert);
        self.unread += 1;
    }

    pub fn remove(&mut self, id: &str) -> Option<Alert> {
        let idx = self.alerts.iter().position(|a| a.id == id)?;
        let removed = self.alerts.remove(idx);
        if !removed.acknowledged {
            self.unread = self.unread.saturating_sub(1);
        }
        Some(removed)
    }

    pub fn filter(&self, predicate: impl Fn(&Alert) -> bool) -> Vec<&Alert> {
        self.alerts.iter().filter(|a| predicate(a)).collect()
    }

    pub fn by_severity(&self, severity: Severity) -> Vec<&Alert> {
        self.filter(|a| a.severity == severity)
    }

    pub fn unacknowledged(&self) -> Vec<&Alert> {
        self.filter(|a| !a.acknowledged)
    }

    /// Error, Warning, Info buckets in that order; empty buckets are omitted.
    pub fn grouped(&self) -> Vec<(Severity, Vec<&Alert>)> {
        Severity::ORDER
            .into_iter()
            .map(|severity| (severity, self.by_severity(severity)))
            .filter(|(_, alerts)| !alerts.is_empty())
            .collect()
    }
}

/// The six demo alerts shipped with the dashboard; only W-02 starts read.
pub fn sample_alerts(now: DateTime<Utc>) -> Vec<Alert> {
    let ago = |secs: i64| now - Duration::seconds(secs);
    vec![
        Alert::new(
            "E-01",
            Severity::Error,
            "Connection lost to server",
            "No data from 10.130.27.152:8000 for 30 s.",
            &["Retry", "Open Dashboard"],
            ago(300),
        ),
        Alert::new(
            "E-02",
            Severity::Error,
            "Grid disconnected",
            "Grid breaker open or abnormal V/F (V=220V, f=50Hz).",
            &["Switch to Island Mode", "View SOP"],
            ago(180),
        ),
        Alert::new(
            "W-01",
            Severity::Warning,
            "Severe weather alert: Typhoon",
            "JMA issued severe typhoon warning for Tokyo region.",
            &["Open Weather", "Prep Checklist"],
            ago(120),
        ),
        Alert::new(
            "W-02",
            Severity::Warning,
            "Heat wave: SOC risk",
            "Forecast 35°C, PV shortfall 15%.",
            &["Pre-charge Battery", "Schedule Load Shift"],
            ago(90),
        )
        .acknowledged(),
        Alert::new(
            "I-01",
            Severity::Info,
            "Weather update: Clear",
            "Clear skies expected 14:00–18:00; PV increase 20%.",
            &["Open Weather"],
            ago(60),
        ),
        Alert::new(
            "I-02",
            Severity::Info,
            "Connection restored",
            "Reconnected to 10.130.27.152:8000 at 14:30.",
            &["Open Dashboard"],
            ago(30),
        ),
    ]
}
