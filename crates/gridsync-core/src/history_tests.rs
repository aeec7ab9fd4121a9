use crate::history::TrendHistory;
use crate::test_support::snapshot_at;

#[test]
fn repeated_simulation_time_is_recorded_once() {
    // Arrange
    let mut history = TrendHistory::new(10);
    let snapshot = snapshot_at("2025-03-01T12:00:00");

    // Act
    let first = history.record(&snapshot, Some(6.0));
    let again = history.record(&snapshot, Some(6.0));

    // Assert
    assert!(first);
    assert!(!again);
    assert_eq!(history.len(), 1);
    let latest = history.latest().expect("point");
    assert_eq!(latest.total_generation, 60.5);
    assert_eq!(latest.stored_energy_kwh, 150.0);
}

#[test]
fn oldest_points_fall_out_of_the_window() {
    // Arrange
    let mut history = TrendHistory::new(3);

    // Act
    for hour in 10..15 {
        history.record(&snapshot_at(&format!("2025-03-01T{hour}:00:00")), None);
    }

    // Assert
    let stamps: Vec<_> = history.points().map(|p| p.timestamp.as_str()).collect();
    assert_eq!(
        stamps,
        vec!["2025-03-01T12:00:00", "2025-03-01T13:00:00", "2025-03-01T14:00:00"]
    );
}

#[test]
fn series_skips_missing_values() {
    // Arrange
    let mut history = TrendHistory::new(5);
    history.record(&snapshot_at("2025-03-01T10:00:00"), Some(4.0));
    history.record(&snapshot_at("2025-03-01T11:00:00"), None);
    history.record(&snapshot_at("2025-03-01T12:00:00"), Some(8.0));

    // Act
    let demand = history.series(|p| p.demand_kw);
    let grid = history.series(|p| Some(p.total_grid_power));

    // Assert
    assert_eq!(demand, vec![(0.0, 4.0), (2.0, 8.0)]);
    assert_eq!(grid.len(), 3);
}
