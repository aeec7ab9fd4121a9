use std::collections::VecDeque;

use serde::Serialize;

use crate::snapshot::SystemSnapshot;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub timestamp: String,
    pub total_generation: f64,
    pub total_storage_power: f64,
    pub total_grid_power: f64,
    pub stored_energy_kwh: f64,
    pub demand_kw: Option<f64>,
}

/// Per-timestep totals for the dashboard charts, oldest first.
#[derive(Debug, Clone)]
pub struct TrendHistory {
    capacity: usize,
    points: VecDeque<TrendPoint>,
}

impl TrendHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            points: VecDeque::with_capacity(capacity),
        }
    }

    /// Records the snapshot unless its simulation timestamp is already the
    /// newest point. Polling between steps sees the same clock repeatedly.
    pub fn record(&mut self, snapshot: &SystemSnapshot, demand_kw: Option<f64>) -> bool {
        if self
            .points
            .back()
            .is_some_and(|last| last.timestamp == snapshot.timestamp)
        {
            return false;
        }

        if self.points.len() == self.capacity {
            self.points.pop_front();
        }
        self.points.push_back(TrendPoint {
            timestamp: snapshot.timestamp.clone(),
            total_generation: snapshot.total_generation,
            total_storage_power: snapshot.total_storage_power,
            total_grid_power: snapshot.total_grid_power,
            stored_energy_kwh: snapshot.stored_energy_kwh(),
            demand_kw,
        });
        true
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn latest(&self) -> Option<&TrendPoint> {
        self.points.back()
    }

    pub fn points(&self) -> impl Iterator<Item = &TrendPoint> {
        self.points.iter()
    }

    /// `(index, value)` pairs for a chart dataset.
    pub fn series(&self, value: impl Fn(&TrendPoint) -> Option<f64>) -> Vec<(f64, f64)> {
        self.points
            .iter()
            .enumerate()
            .filter_map(|(idx, point)| value(point).map(|v| (idx as f64, v)))
            .collect()
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }
}
