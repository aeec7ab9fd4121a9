use chrono::{TimeZone, Utc};

use crate::alerts::{Alert, NotificationStore, Severity};

fn sample_store() -> NotificationStore {
    let now = Utc
        .with_ymd_and_hms(2025, 3, 1, 14, 30, 0)
        .single()
        .expect("valid date");
    NotificationStore::with_sample_alerts(now)
}

fn test_alert() -> Alert {
    let now = Utc
        .with_ymd_and_hms(2025, 3, 1, 15, 0, 0)
        .single()
        .expect("valid date");
    Alert::test_alert(now)
}

#[test]
fn sample_set_starts_with_five_unread() {
    // Arrange
    let mut store = sample_store();

    // Act + Assert
    assert_eq!(store.len(), 6);
    assert_eq!(store.unread_count(), 5);

    store.acknowledge("W-02");
    assert_eq!(store.unread_count(), 5, "W-02 was already acknowledged");

    store.acknowledge("E-01");
    assert_eq!(store.unread_count(), 4);
    assert!(store.get("E-01").expect("E-01").acknowledged);
}

#[test]
fn acknowledging_twice_or_unknown_id_is_a_no_op() {
    // Arrange
    let mut store = sample_store();
    store.acknowledge("I-01");

    // Act
    store.acknowledge("I-01");
    store.acknowledge("NOPE");

    // Assert
    assert_eq!(store.unread_count(), 4);
}

#[test]
fn add_then_remove_restores_unread_count() {
    // Arrange
    let mut store = sample_store();
    let before = store.unread_count();
    let alert = test_alert();
    let id = alert.id.clone();

    // Act
    store.add(alert);
    let after_add = store.unread_count();
    let removed = store.remove(&id);

    // Assert
    assert_eq!(after_add, before + 1);
    assert!(removed.is_some());
    assert_eq!(store.unread_count(), before);
}

#[test]
fn add_acknowledge_remove_leaves_unread_count_unchanged() {
    // Arrange
    let mut store = sample_store();
    let before = store.unread_count();
    let alert = test_alert();
    let id = alert.id.clone();

    // Act
    store.add(alert);
    store.acknowledge(&id);
    store.remove(&id);

    // Assert
    assert_eq!(store.unread_count(), before);
}

#[test]
fn added_alerts_are_listed_first() {
    // Arrange
    let mut store = sample_store();
    let alert = test_alert();

    // Act
    store.add(alert.clone());

    // Assert
    assert_eq!(store.alerts()[0].id, alert.id);
    assert!(alert.id.starts_with("TEST-"));
    assert_eq!(alert.severity, Severity::Warning);
    assert_eq!(alert.actions, vec!["Acknowledge".to_string(), "Dismiss".to_string()]);
}

#[test]
fn removing_unknown_or_read_alerts_never_underflows() {
    // Arrange
    let mut store = NotificationStore::new();

    // Act
    let missing = store.remove("E-01");

    // Assert
    assert!(missing.is_none());
    assert_eq!(store.unread_count(), 0);
    assert!(store.is_empty());
}

#[test]
fn grouping_keeps_severity_order_and_skips_empty_groups() {
    // Arrange
    let mut store = sample_store();
    store.remove("W-01");
    store.remove("W-02");

    // Act
    let groups = store.grouped();

    // Assert
    let order: Vec<_> = groups.iter().map(|(severity, _)| *severity).collect();
    assert_eq!(order, vec![Severity::Error, Severity::Info]);
    assert_eq!(groups[0].1.len(), 2);
}

#[test]
fn queries_do_not_mutate_the_store() {
    // Arrange
    let store = sample_store();

    // Act
    let errors = store.by_severity(Severity::Error);
    let unread = store.unacknowledged();
    let with_retry = store.filter(|a| a.actions.iter().any(|action| action == "Retry"));

    // Assert
    assert_eq!(errors.len(), 2);
    assert_eq!(unread.len(), 5);
    assert_eq!(with_retry.len(), 1);
    assert_eq!(store.unread_count(), 5);
}

#[test]
fn added_alerts_always_start_unread() {
    // Arrange
    let mut store = NotificationStore::new();
    let mut alert = test_alert();
    alert.acknowledged = true;

    // Act
    store.add(alert);

    // Assert
    assert_eq!(store.unread_count(), 1);
    assert_eq!(store.unacknowledged().len(), store.unread_count());
    assert!(!store.alerts()[0].acknowledged);
}

#[test]
fn adding_an_existing_id_replaces_the_alert() {
    // Arrange
    let mut store = sample_store();
    store.acknowledge("E-01");
    let now = Utc
        .with_ymd_and_hms(2025, 3, 1, 15, 0, 0)
        .single()
        .expect("valid date");
    let again = Alert::new("E-01", Severity::Error, "Connection lost again", "", &[], now);

    // Act
    store.add(again);
    store.acknowledge("E-01");

    // Assert
    assert_eq!(store.len(), 6);
    assert_eq!(store.alerts()[0].headline, "Connection lost again");
    assert_eq!(store.unread_count(), 4);
    assert_eq!(store.unacknowledged().len(), 4);
}
