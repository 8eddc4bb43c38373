use serde::Serialize;

use crate::domain::truck::TruckState;
use crate::domain::types::Coordinate;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Loading,
    EnRoute,
    Unloading,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Loading => "loading",
            Phase::EnRoute => "en_route",
            Phase::Unloading => "unloading",
        }
    }
}

/// Read-only view of the run handed to the presentation layer after each step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub step: usize,
    pub phase: Phase,
    pub running: bool,
    pub stopped: bool,
    pub truck_type: String,
    pub route: String,
    pub location: Option<Coordinate>,
    pub location_index: Option<usize>,
    pub fuel_liters: f64,
    pub fuel_percentage: f64,
    pub weight_tons: f64,
    pub max_weight_tons: f64,
    pub weight_percentage: f64,
    pub route_progress: f64,
    pub door_open: bool,
    pub panic_button_on: bool,
    /// Canonical alert lines, oldest first.
    pub alerts: Vec<String>,
}

impl Snapshot {
    pub fn capture(
        truck: &TruckState,
        step: usize,
        phase: Phase,
        running: bool,
        stopped: bool,
        alert_tail: usize,
    ) -> Self {
        Self {
            step,
            phase,
            running,
            stopped,
            truck_type: truck.profile().name.clone(),
            route: truck.route().name.clone(),
            location: truck.current_location(),
            location_index: truck.location_index(),
            fuel_liters: truck.current_fuel(),
            fuel_percentage: truck.fuel_percentage(),
            weight_tons: truck.current_weight(),
            max_weight_tons: truck.profile().max_weight_capacity,
            weight_percentage: truck.weight_percentage(),
            route_progress: truck.route_progress_percentage(),
            door_open: truck.door_open(),
            panic_button_on: truck.panic_button_on(),
            alerts: truck
                .alert_tail(alert_tail)
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }
}

/// Consumer of snapshots. A failing sink aborts the run as a runtime fault.
pub trait SnapshotSink: Send {
    fn report(&mut self, snapshot: &Snapshot) -> Result<()>;

    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Discards every snapshot.
#[derive(Debug, Default)]
pub struct NullSink;

impl SnapshotSink for NullSink {
    fn report(&mut self, _snapshot: &Snapshot) -> Result<()> {
        Ok(())
    }
}

impl SnapshotSink for Vec<Box<dyn SnapshotSink>> {
    fn report(&mut self, snapshot: &Snapshot) -> Result<()> {
        for sink in self.iter_mut() {
            sink.report(snapshot)?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        for sink in self.iter_mut() {
            sink.finish()?;
        }
        Ok(())
    }
}
