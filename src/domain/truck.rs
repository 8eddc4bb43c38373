use chrono::{DateTime, Local};
use tracing::{debug, info, warn};

use crate::config::constant::{
    INITIAL_FUEL_RATIO, LOADED_FUEL_RATIO, MAX_LOAD_RATIO, MIN_LOAD_RATIO,
};
use crate::domain::catalog::Catalog;
use crate::domain::types::{Alert, AlertKind, Coordinate, Route, TruckProfile, TruckType};
use crate::error::Result;
use crate::simulation::random::RandomSource;
use crate::utils::{calculate_percentage, generate_random_value};

/// Mutable state of the one truck driven through a run.
///
/// Fuel stays within `[0, fuel_capacity]`. Weight never goes negative but may
/// exceed the max capacity, which `check_overweight` reports.
#[derive(Debug, Clone)]
pub struct TruckState {
    profile: TruckProfile,
    route: Route,
    current_weight: f64,
    current_fuel: f64,
    door_open: bool,
    panic_button_on: bool,
    location_index: Option<usize>,
    is_en_route: bool,
    is_loading: bool,
    is_unloading: bool,
    alerts: Vec<Alert>,
    alert_limit: Option<usize>,
    simulation_start_time: Option<DateTime<Local>>,
    simulation_end_time: Option<DateTime<Local>>,
}

impl TruckState {
    /// Resolves `truck_type` and `route_name` in the catalog and draws the fuel capacity.
    pub fn create(
        catalog: &Catalog,
        truck_type: &str,
        route_name: &str,
        rng: &mut dyn RandomSource,
    ) -> Result<Self> {
        let spec = catalog.truck_type(truck_type)?;
        let route = catalog.route(route_name)?;
        Ok(Self::from_spec(truck_type, spec, route, rng))
    }

    /// Fresh truck of type `spec` on `route`, with a newly drawn fuel capacity.
    pub fn from_spec(
        truck_type: &str,
        spec: &TruckType,
        route: Route,
        rng: &mut dyn RandomSource,
    ) -> Self {
        let fuel_capacity =
            generate_random_value(rng, spec.min_fuel_capacity, spec.max_fuel_capacity);
        let profile = TruckProfile {
            name: truck_type.to_string(),
            max_weight_capacity: spec.max_weight_capacity,
            fuel_capacity,
        };

        info!(
            "Created truck '{}' on '{}' ({} waypoints, tank {:.2} L)",
            profile.name,
            route.name,
            route.len(),
            fuel_capacity
        );

        Self::with_profile(profile, route)
    }

    /// Builds a truck from an already resolved profile and route.
    pub fn with_profile(profile: TruckProfile, route: Route) -> Self {
        let current_fuel = INITIAL_FUEL_RATIO * profile.fuel_capacity;
        Self {
            profile,
            route,
            current_weight: 0.0,
            current_fuel,
            door_open: false,
            panic_button_on: false,
            location_index: None,
            is_en_route: false,
            is_loading: false,
            is_unloading: false,
            alerts: Vec::new(),
            alert_limit: None,
            simulation_start_time: None,
            simulation_end_time: None,
        }
    }

    pub fn set_alert_limit(&mut self, limit: Option<usize>) {
        self.alert_limit = limit;
        self.enforce_alert_limit();
    }

    /// Loads cargo to 70-95% of capacity and refuels to 90% of the tank.
    pub fn begin_loading(&mut self, rng: &mut dyn RandomSource) {
        self.is_loading = true;
        let max = self.profile.max_weight_capacity;
        self.current_weight = generate_random_value(rng, MIN_LOAD_RATIO * max, MAX_LOAD_RATIO * max);
        self.is_loading = false;
        self.current_fuel = LOADED_FUEL_RATIO * self.profile.fuel_capacity;

        self.add_alert(AlertKind::Info, "Inicio de carga de contenedor.", None);
        self.add_alert(
            AlertKind::Info,
            format!("Contenedor cargado con {:.2} toneladas.", self.current_weight),
            None,
        );
        self.add_alert(
            AlertKind::Info,
            format!("Tanque de combustible inicial: {:.2} L.", self.current_fuel),
            None,
        );
    }

    pub fn check_overweight(&mut self) -> bool {
        if self.current_weight > self.profile.max_weight_capacity {
            let overload = self.current_weight - self.profile.max_weight_capacity;
            let location = self.current_location();
            self.add_alert(
                AlertKind::Warning,
                format!(
                    "Sobrepeso detectado: {:.2} toneladas por encima del límite.",
                    overload
                ),
                location,
            );
            return true;
        }
        false
    }

    /// Puts the truck on the first waypoint. Refuses to leave empty.
    pub fn start_route(&mut self) -> bool {
        if self.current_weight <= 0.0 {
            self.add_alert(
                AlertKind::Error,
                "No se puede iniciar la ruta, el camión está vacío.",
                None,
            );
            return false;
        }
        self.simulation_start_time = Some(Local::now());
        self.simulation_end_time = None;
        self.location_index = Some(0);
        self.is_en_route = true;
        let message = format!("Simulación iniciada. Ruta: {}", self.route.name);
        self.add_alert(AlertKind::Info, message, None);
        true
    }

    /// Moves to the next waypoint. Past the last one the route is finished
    /// and `false` is returned.
    pub fn advance_route(&mut self) -> bool {
        if !self.is_en_route {
            return false;
        }

        match self.location_index {
            Some(index) if index < self.route.last_index() => {
                self.location_index = Some(index + 1);
                true
            }
            _ => {
                self.finish_route();
                false
            }
        }
    }

    pub fn finish_route(&mut self) {
        self.is_en_route = false;
        self.simulation_end_time = Some(Local::now());
        self.add_alert(AlertKind::Info, "Ruta completada.", None);
        self.begin_unloading();
    }

    pub fn begin_unloading(&mut self) {
        self.is_unloading = true;
        self.add_alert(AlertKind::Info, "Inicio de descarga de contenedor.", None);
        self.current_weight = 0.0;
        self.is_unloading = false;
        self.add_alert(AlertKind::Info, "Descarga completada.", None);
    }

    /// Burns `rate_percentage`% of the tank capacity while en route.
    pub fn consume_fuel(&mut self, rate_percentage: f64) {
        if self.is_en_route {
            let consumption = (rate_percentage / 100.0) * self.profile.fuel_capacity;
            self.current_fuel = (self.current_fuel - consumption).max(0.0);
        }
    }

    /// Removes cargo, floored at zero. Returns the new weight.
    pub fn lose_weight(&mut self, tons: f64) -> f64 {
        self.current_weight = (self.current_weight - tons).max(0.0);
        self.current_weight
    }

    pub fn set_door_status(&mut self, is_open: bool) {
        if self.door_open != is_open {
            self.door_open = is_open;
            let status = if is_open { "abierta" } else { "cerrada" };
            let location = self.current_location();
            self.add_alert(AlertKind::Alert, format!("Puerta {status}."), location);
        }
    }

    /// Latches the panic flag for the rest of the run.
    pub fn trigger_panic_button(&mut self) {
        self.panic_button_on = true;
        let location = self.current_location();
        self.add_alert(AlertKind::Panic, "¡Botón de pánico activado!", location);
    }

    pub fn check_low_fuel(&mut self, threshold_percentage: f64) -> bool {
        let fuel_percentage = self.fuel_percentage();
        if self.is_en_route && fuel_percentage <= threshold_percentage {
            let location = self.current_location();
            self.add_alert(
                AlertKind::Warning,
                format!("Nivel bajo de combustible: {:.1}%", fuel_percentage),
                location,
            );
            return true;
        }
        false
    }

    pub fn add_alert(
        &mut self,
        kind: AlertKind,
        message: impl Into<String>,
        location: Option<Coordinate>,
    ) {
        let alert = Alert::new(kind, message, location);
        match kind {
            AlertKind::Panic | AlertKind::Error => warn!("{}", alert),
            _ => debug!("{}", alert),
        }
        self.alerts.push(alert);
        self.enforce_alert_limit();
    }

    pub fn clear_alerts(&mut self) {
        self.alerts.clear();
    }

    fn enforce_alert_limit(&mut self) {
        if let Some(limit) = self.alert_limit {
            if self.alerts.len() > limit {
                let excess = self.alerts.len() - limit;
                self.alerts.drain(..excess);
            }
        }
    }

    pub fn current_location(&self) -> Option<Coordinate> {
        if !self.is_en_route {
            return None;
        }
        self.location_index.and_then(|index| self.route.get(index))
    }

    pub fn fuel_percentage(&self) -> f64 {
        calculate_percentage(self.current_fuel, self.profile.fuel_capacity)
    }

    pub fn weight_percentage(&self) -> f64 {
        calculate_percentage(self.current_weight, self.profile.max_weight_capacity)
    }

    pub fn route_progress_percentage(&self) -> f64 {
        if self.route.len() <= 1 {
            return 0.0;
        }
        if !self.is_en_route && self.simulation_end_time.is_some() {
            return 100.0;
        }
        let Some(index) = self.location_index else {
            return 0.0;
        };
        let progress = (index as f64 / self.route.last_index() as f64) * 100.0;
        progress.min(100.0)
    }

    pub fn profile(&self) -> &TruckProfile {
        &self.profile
    }

    pub fn route(&self) -> &Route {
        &self.route
    }

    pub fn current_weight(&self) -> f64 {
        self.current_weight
    }

    pub fn current_fuel(&self) -> f64 {
        self.current_fuel
    }

    pub fn door_open(&self) -> bool {
        self.door_open
    }

    pub fn panic_button_on(&self) -> bool {
        self.panic_button_on
    }

    pub fn location_index(&self) -> Option<usize> {
        self.location_index
    }

    pub fn is_en_route(&self) -> bool {
        self.is_en_route
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn is_unloading(&self) -> bool {
        self.is_unloading
    }

    pub fn alerts(&self) -> &[Alert] {
        &self.alerts
    }

    /// The last `n` alerts, oldest first.
    pub fn alert_tail(&self, n: usize) -> &[Alert] {
        let start = self.alerts.len().saturating_sub(n);
        &self.alerts[start..]
    }

    pub fn simulation_start_time(&self) -> Option<DateTime<Local>> {
        self.simulation_start_time
    }

    pub fn simulation_end_time(&self) -> Option<DateTime<Local>> {
        self.simulation_end_time
    }
}
