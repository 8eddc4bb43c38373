use std::time::Duration;

use crate::error::{Result, TruckSimError};

pub mod constant {
    pub const DEFAULT_DOOR_OPEN_PROBABILITY: f64 = 5.0;
    pub const DEFAULT_PANIC_BUTTON_PROBABILITY: f64 = 2.0;
    pub const DEFAULT_OVERWEIGHT_PROBABILITY: f64 = 10.0;
    pub const LOW_FUEL_THRESHOLD: f64 = 20.0;
    // % of the tank consumed per GPS step
    pub const FUEL_CONSUMPTION_RATE: f64 = 0.5;
    pub const SIMULATION_STEP_DELAY_SECONDS: f64 = 2.0;
    pub const DOOR_OPEN_PAUSE_SECONDS: f64 = 5.0;
    pub const PHASE_PAUSE_SECONDS: f64 = 1.0;

    pub const INITIAL_FUEL_RATIO: f64 = 0.88;
    pub const LOADED_FUEL_RATIO: f64 = 0.9;
    pub const MIN_LOAD_RATIO: f64 = 0.7;
    pub const MAX_LOAD_RATIO: f64 = 0.95;

    // Per-step cargo loss, in % of max capacity
    pub const MIN_WEIGHT_LOSS_PERCENT: f64 = 0.1;
    pub const MAX_WEIGHT_LOSS_PERCENT: f64 = 0.5;
    pub const LOW_WEIGHT_RATIO: f64 = 0.1;

    pub const ALERT_TAIL_LEN: usize = 10;
    pub const PAUSE_SLICE_MILLIS: u64 = 50;
}

/// Tunables for one simulation run.
///
/// Probabilities, thresholds and the consumption rate are percentages.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationParams {
    pub door_open_probability: f64,
    pub panic_button_probability: f64,
    /// Carried for the dashboard; no mutator draws against it.
    pub overweight_probability: f64,
    pub low_fuel_threshold: f64,
    pub fuel_consumption_rate: f64,
    pub step_delay: Duration,
    pub door_open_pause: Duration,
    pub phase_pause: Duration,
    /// Keep at most this many alerts, dropping the oldest. `None` keeps all.
    pub alert_limit: Option<usize>,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            door_open_probability: constant::DEFAULT_DOOR_OPEN_PROBABILITY,
            panic_button_probability: constant::DEFAULT_PANIC_BUTTON_PROBABILITY,
            overweight_probability: constant::DEFAULT_OVERWEIGHT_PROBABILITY,
            low_fuel_threshold: constant::LOW_FUEL_THRESHOLD,
            fuel_consumption_rate: constant::FUEL_CONSUMPTION_RATE,
            step_delay: Duration::from_secs_f64(constant::SIMULATION_STEP_DELAY_SECONDS),
            door_open_pause: Duration::from_secs_f64(constant::DOOR_OPEN_PAUSE_SECONDS),
            phase_pause: Duration::from_secs_f64(constant::PHASE_PAUSE_SECONDS),
            alert_limit: None,
        }
    }
}

impl SimulationParams {
    /// Same tunables with every pause set to zero, for tests and batch runs.
    pub fn without_pacing(mut self) -> Self {
        self.step_delay = Duration::ZERO;
        self.door_open_pause = Duration::ZERO;
        self.phase_pause = Duration::ZERO;
        self
    }

    pub fn validate(&self) -> Result<()> {
        let percentages = [
            ("door_open_probability", self.door_open_probability),
            ("panic_button_probability", self.panic_button_probability),
            ("overweight_probability", self.overweight_probability),
            ("low_fuel_threshold", self.low_fuel_threshold),
        ];
        for (name, value) in percentages {
            if !(0.0..=100.0).contains(&value) {
                return Err(TruckSimError::InvalidParameter {
                    name: name.to_string(),
                    value,
                });
            }
        }

        if !self.fuel_consumption_rate.is_finite() || self.fuel_consumption_rate < 0.0 {
            return Err(TruckSimError::InvalidParameter {
                name: "fuel_consumption_rate".to_string(),
                value: self.fuel_consumption_rate,
            });
        }

        if self.alert_limit == Some(0) {
            return Err(TruckSimError::InvalidParameter {
                name: "alert_limit".to_string(),
                value: 0.0,
            });
        }

        Ok(())
    }
}
