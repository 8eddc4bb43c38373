use tracing::debug;

use crate::config::constant::{LOW_WEIGHT_RATIO, MAX_WEIGHT_LOSS_PERCENT, MIN_WEIGHT_LOSS_PERCENT};
use crate::config::SimulationParams;
use crate::domain::truck::TruckState;
use crate::domain::types::AlertKind;
use crate::simulation::random::RandomSource;
use crate::utils::{check_probability, generate_random_value};

/// What the injector did to the truck during one step.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct InjectedEvents {
    pub door_opened: bool,
    pub door_closed: bool,
    pub panic_triggered: bool,
    pub weight_lost: f64,
    pub low_weight_warning: bool,
}

/// Draws the per-step sensor events, always in the order door, panic, weight.
///
/// Three uniform draws are consumed per call.
pub fn inject_events(
    truck: &mut TruckState,
    params: &SimulationParams,
    rng: &mut dyn RandomSource,
) -> InjectedEvents {
    let mut events = InjectedEvents::default();

    // The door only stays open while the draw keeps firing.
    if check_probability(rng, params.door_open_probability) {
        events.door_opened = !truck.door_open();
        truck.set_door_status(true);
    } else if truck.door_open() {
        truck.set_door_status(false);
        events.door_closed = true;
    }

    if check_probability(rng, params.panic_button_probability) {
        truck.trigger_panic_button();
        events.panic_triggered = true;
    }

    let max = truck.profile().max_weight_capacity;
    let loss_percentage =
        generate_random_value(rng, MIN_WEIGHT_LOSS_PERCENT, MAX_WEIGHT_LOSS_PERCENT);
    let before = truck.current_weight();
    let after = truck.lose_weight((loss_percentage / 100.0) * max);
    events.weight_lost = before - after;

    if after < LOW_WEIGHT_RATIO * max {
        truck.add_alert(
            AlertKind::Warning,
            "Pérdida de peso significativa detectada.",
            None,
        );
        events.low_weight_warning = true;
    }

    debug!(?events, "Injected step events");
    events
}
