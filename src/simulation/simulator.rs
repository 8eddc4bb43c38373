use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, span, warn, Level};

use crate::config::constant::{ALERT_TAIL_LEN, PAUSE_SLICE_MILLIS};
use crate::config::SimulationParams;
use crate::domain::catalog::Catalog;
use crate::domain::truck::TruckState;
use crate::domain::types::{AlertKind, TruckType};
use crate::error::{Result, TruckSimError};
use crate::simulation::events::inject_events;
use crate::simulation::random::RandomSource;
use crate::simulation::snapshot::{NullSink, Phase, Snapshot, SnapshotSink};

/// Cloneable view of the run flags, usable from another thread.
#[derive(Debug, Clone, Default)]
pub struct ControlHandle {
    stop_requested: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    in_loop: Arc<AtomicBool>,
}

impl ControlHandle {
    /// Asks the loop to exit at its next step boundary.
    pub fn stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
        self.running.store(false, Ordering::SeqCst);
        info!("Stop requested");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    /// True from `start`/`resume` until the loop has returned, even after a stop.
    pub fn in_loop(&self) -> bool {
        self.in_loop.load(Ordering::SeqCst)
    }

    pub(crate) fn begin_run(&self) {
        self.stop_requested.store(false, Ordering::SeqCst);
        self.running.store(true, Ordering::SeqCst);
        self.in_loop.store(true, Ordering::SeqCst);
    }

    pub(crate) fn end_run(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.in_loop.store(false, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// Route finished and cargo unloaded.
    Completed,
    /// Stopped by the user while en route; `resume` can continue it.
    Stopped,
    /// The truck was empty after loading.
    CannotStartRoute,
    /// A runtime fault ended the run. Already logged as an ERROR alert.
    Faulted(String),
}

enum StepOutcome {
    Continue,
    RouteExhausted,
}

/// Drives one truck through load, route and unload.
pub struct Simulator {
    truck: TruckState,
    spec: TruckType,
    fresh: bool,
    params: SimulationParams,
    rng: Box<dyn RandomSource>,
    sink: Box<dyn SnapshotSink>,
    control: ControlHandle,
    phase: Phase,
    step: usize,
}

impl Simulator {
    pub fn new(
        catalog: &Catalog,
        truck_type: &str,
        route_name: &str,
        params: SimulationParams,
        mut rng: Box<dyn RandomSource>,
    ) -> Result<Self> {
        params.validate()?;
        let truck = TruckState::create(catalog, truck_type, route_name, rng.as_mut())?;
        let spec = catalog.truck_type(truck_type)?.clone();
        Ok(Self::assemble(truck, spec, params, rng))
    }

    /// Drives an already built truck. Later runs keep its fuel capacity.
    pub fn from_truck(
        truck: TruckState,
        params: SimulationParams,
        rng: Box<dyn RandomSource>,
    ) -> Self {
        let profile = truck.profile();
        let spec = TruckType {
            max_weight_capacity: profile.max_weight_capacity,
            min_fuel_capacity: profile.fuel_capacity,
            max_fuel_capacity: profile.fuel_capacity,
        };
        Self::assemble(truck, spec, params, rng)
    }

    fn assemble(
        mut truck: TruckState,
        spec: TruckType,
        params: SimulationParams,
        rng: Box<dyn RandomSource>,
    ) -> Self {
        truck.set_alert_limit(params.alert_limit);
        Self {
            truck,
            spec,
            fresh: true,
            params,
            rng,
            sink: Box::new(NullSink),
            control: ControlHandle::default(),
            phase: Phase::Idle,
            step: 0,
        }
    }

    pub fn with_sink(mut self, sink: Box<dyn SnapshotSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn handle(&self) -> ControlHandle {
        self.control.clone()
    }

    pub fn truck(&self) -> &TruckState {
        &self.truck
    }

    pub fn params(&self) -> &SimulationParams {
        &self.params
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_running(&self) -> bool {
        self.control.is_running()
    }

    /// True when a user stop left the truck mid-route.
    pub fn can_resume(&self) -> bool {
        !self.control.is_running() && self.truck.is_en_route()
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot::capture(
            &self.truck,
            self.step,
            self.phase,
            self.control.is_running(),
            self.control.stop_requested(),
            ALERT_TAIL_LEN,
        )
    }

    /// Runs a full cycle: load, route, unload. Blocks until the run ends.
    ///
    /// Every call after the first replaces the truck with a fresh one of the
    /// same type and route, so no flags or alerts leak between runs.
    pub fn start(&mut self) -> Result<RunOutcome> {
        if self.control.is_running() {
            warn!("The simulation is already running");
            return Err(TruckSimError::AlreadyRunning);
        }

        self.control.begin_run();
        if !self.fresh {
            self.reset_truck();
        }
        self.fresh = false;
        self.step = 0;
        self.truck.clear_alerts();
        self.truck
            .add_alert(AlertKind::Info, "Iniciando simulación...", None);

        let result = self.run_from_loading();
        Ok(self.conclude(result))
    }

    pub fn stop(&self) {
        self.control.stop();
    }

    /// Continues a stopped run from the waypoint where it halted.
    pub fn resume(&mut self) -> Result<RunOutcome> {
        if self.control.is_running() {
            warn!("The simulation is already running");
            return Err(TruckSimError::AlreadyRunning);
        }
        if !self.truck.is_en_route() {
            error!("Cannot resume, the route is already finished");
            return Err(TruckSimError::NotResumable);
        }

        self.control.begin_run();
        self.truck.add_alert(AlertKind::Info, "Simulación reanudada.", None);
        info!(
            "Resuming at waypoint {:?} of {}",
            self.truck.location_index(),
            self.truck.route().len()
        );

        let result = self.run_route();
        Ok(self.conclude(result))
    }

    /// Flushes the sink. Call once after the last run.
    pub fn finish(&mut self) -> Result<()> {
        self.sink.finish()
    }

    fn reset_truck(&mut self) {
        let name = self.truck.profile().name.clone();
        let route = self.truck.route().clone();
        let mut truck = TruckState::from_spec(&name, &self.spec, route, self.rng.as_mut());
        truck.set_alert_limit(self.params.alert_limit);
        debug!("Replaced the truck of the previous run");
        self.truck = truck;
    }

    fn run_from_loading(&mut self) -> Result<RunOutcome> {
        {
            let span = span!(Level::INFO, "load_phase");
            let _guard = span.enter();

            self.phase = Phase::Loading;
            self.pause(self.params.phase_pause);
            self.truck.begin_loading(self.rng.as_mut());
            if self.truck.check_overweight() {
                warn!("Truck left the loading dock overweight");
            }
            self.report()?;
            self.pause(self.params.phase_pause);
        }

        if !self.truck.start_route() {
            warn!("Route could not start, the truck is empty");
            return Ok(RunOutcome::CannotStartRoute);
        }

        self.run_route()
    }

    fn run_route(&mut self) -> Result<RunOutcome> {
        let span = span!(
            Level::INFO,
            "route_loop",
            route = %self.truck.route().name,
            waypoints = self.truck.route().len()
        );
        let _guard = span.enter();

        self.phase = Phase::EnRoute;
        while self.truck.is_en_route() && !self.control.stop_requested() {
            match self.step()? {
                StepOutcome::Continue => {}
                StepOutcome::RouteExhausted => break,
            }
        }

        if self.truck.is_en_route() && self.control.stop_requested() {
            self.truck
                .add_alert(AlertKind::Info, "Simulación detenida por el usuario.", None);
            info!("Simulation stopped at step {}", self.step);
            return Ok(RunOutcome::Stopped);
        }

        self.unload_phase()?;
        Ok(RunOutcome::Completed)
    }

    fn step(&mut self) -> Result<StepOutcome> {
        self.step += 1;
        let span = span!(Level::DEBUG, "step", step = self.step);
        let _guard = span.enter();

        let location = self.truck.current_location().ok_or_else(|| {
            TruckSimError::RuntimeFault(format!(
                "en route without a valid waypoint (index {:?})",
                self.truck.location_index()
            ))
        })?;
        debug!("At ({:.4}, {:.4})", location.lat, location.lon);

        inject_events(&mut self.truck, &self.params, self.rng.as_mut());

        self.truck.consume_fuel(self.params.fuel_consumption_rate);
        self.truck.check_low_fuel(self.params.low_fuel_threshold);

        self.report()?;

        if self.truck.door_open() {
            info!("Door open, holding for {:?}", self.params.door_open_pause);
            self.pause(self.params.door_open_pause);
        }
        self.pause(self.params.step_delay);

        if self.truck.advance_route() {
            Ok(StepOutcome::Continue)
        } else {
            Ok(StepOutcome::RouteExhausted)
        }
    }

    fn unload_phase(&mut self) -> Result<()> {
        self.phase = Phase::Unloading;
        info!("Route completed, unloading");
        self.pause(self.params.phase_pause);
        self.report()
    }

    /// Logs a failed run as an ERROR alert and settles the flags.
    fn conclude(&mut self, result: Result<RunOutcome>) -> RunOutcome {
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Simulation aborted: {e}");
                self.truck
                    .add_alert(AlertKind::Error, format!("Error inesperado: {e}"), None);
                RunOutcome::Faulted(e.to_string())
            }
        };

        self.control.end_run();
        self.phase = if self.truck.is_en_route() {
            Phase::EnRoute
        } else {
            Phase::Idle
        };
        if let Err(e) = self.report() {
            error!("Final snapshot could not be delivered: {e}");
        }

        info!(?outcome, "Simulation run ended after {} steps", self.step);
        outcome
    }

    fn report(&mut self) -> Result<()> {
        let snapshot = self.snapshot();
        self.sink
            .report(&snapshot)
            .map_err(|e| TruckSimError::RuntimeFault(format!("snapshot sink failed: {e}")))
    }

    /// Sleeps in short slices so a stop request cuts the pause short.
    fn pause(&self, duration: Duration) {
        if duration.is_zero() {
            return;
        }
        let deadline = Instant::now() + duration;
        let slice = Duration::from_millis(PAUSE_SLICE_MILLIS);
        while !self.control.stop_requested() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::sleep(slice.min(deadline - now));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::simulation::random::{ChaChaSource, ScriptedSource};

    const RABON: &str = "Camión Rabón";
    const RUTA_3: &str = "Ruta 3: Ruta Corta Urbana";

    #[derive(Clone, Default)]
    struct Recorder {
        snapshots: Arc<Mutex<Vec<Snapshot>>>,
        stop_at: Option<(usize, ControlHandle)>,
        fail_at: Option<usize>,
    }

    impl SnapshotSink for Recorder {
        fn report(&mut self, snapshot: &Snapshot) -> Result<()> {
            self.snapshots.lock().unwrap().push(snapshot.clone());
            if self.fail_at == Some(snapshot.step) {
                return Err(TruckSimError::RuntimeFault("display went away".into()));
            }
            let stop_now = matches!(
                &self.stop_at,
                Some((step, _)) if *step == snapshot.step && snapshot.phase == Phase::EnRoute
            );
            if stop_now {
                if let Some((_, handle)) = self.stop_at.take() {
                    handle.stop();
                }
            }
            Ok(())
        }
    }

    fn quiet_params() -> SimulationParams {
        SimulationParams {
            door_open_probability: 0.0,
            panic_button_probability: 0.0,
            ..SimulationParams::default().without_pacing()
        }
    }

    fn simulator(params: SimulationParams, seed: u64) -> Simulator {
        Simulator::new(
            &Catalog::builtin(),
            RABON,
            RUTA_3,
            params,
            Box::new(ChaChaSource::from_seed(seed)),
        )
        .unwrap()
    }

    fn messages(sim: &Simulator) -> Vec<String> {
        sim.truck().alerts().iter().map(|a| a.message.clone()).collect()
    }

    #[test]
    fn rejects_invalid_params() {
        let params = SimulationParams {
            low_fuel_threshold: 101.0,
            ..Default::default()
        };
        let result = Simulator::new(
            &Catalog::builtin(),
            RABON,
            RUTA_3,
            params,
            Box::new(ScriptedSource::new(vec![])),
        );
        assert!(matches!(result, Err(TruckSimError::InvalidParameter { .. })));
    }

    #[test]
    fn full_run_completes_and_unloads() {
        let recorder = Recorder::default();
        let snapshots = recorder.snapshots.clone();
        let mut sim = simulator(quiet_params(), 11).with_sink(Box::new(recorder));

        assert_eq!(sim.start().unwrap(), RunOutcome::Completed);
        assert!(!sim.is_running());
        assert!(!sim.can_resume());
        assert_eq!(sim.phase(), Phase::Idle);
        assert_eq!(sim.truck().current_weight(), 0.0);
        assert_eq!(sim.truck().route_progress_percentage(), 100.0);

        let msgs = messages(&sim);
        assert_eq!(msgs[0], "Iniciando simulación...");
        assert_eq!(msgs[1], "Inicio de carga de contenedor.");
        assert!(msgs.contains(&"Ruta completada.".to_string()));
        assert_eq!(msgs.last().unwrap(), "Descarga completada.");

        let snapshots = snapshots.lock().unwrap();
        let steps: Vec<_> = snapshots
            .iter()
            .filter(|s| s.phase == Phase::EnRoute)
            .map(|s| s.location_index)
            .collect();
        assert_eq!(steps, [Some(0), Some(1), Some(2), Some(3), Some(4)]);
        assert_eq!(snapshots.first().unwrap().phase, Phase::Loading);
        assert!(!snapshots.last().unwrap().running);
    }

    #[test]
    fn fuel_drops_half_percent_per_step() {
        let mut sim = simulator(quiet_params(), 2);
        sim.start().unwrap();
        // 90% after loading, five steps at 0.5%
        assert!((sim.truck().fuel_percentage() - 87.5).abs() < 1e-9);
    }

    #[test]
    fn low_fuel_is_advisory() {
        let params = SimulationParams {
            low_fuel_threshold: 100.0,
            ..quiet_params()
        };
        let mut sim = simulator(params, 4);
        assert_eq!(sim.start().unwrap(), RunOutcome::Completed);
        let warnings = sim
            .truck()
            .alerts()
            .iter()
            .filter(|a| a.message.starts_with("Nivel bajo de combustible"))
            .count();
        assert_eq!(warnings, 5);
    }

    #[test]
    fn start_resets_the_alert_log() {
        let mut sim = simulator(quiet_params(), 8);
        sim.start().unwrap();
        let first_len = sim.truck().alerts().len();
        sim.start().unwrap();
        assert_eq!(sim.truck().alerts().len(), first_len);
        assert_eq!(messages(&sim)[0], "Iniciando simulación...");
    }

    #[test]
    fn second_start_gets_a_fresh_truck() {
        let params = SimulationParams {
            door_open_probability: 100.0,
            panic_button_probability: 100.0,
            alert_limit: Some(50),
            ..SimulationParams::default().without_pacing()
        };
        let recorder = Recorder::default();
        let snapshots = recorder.snapshots.clone();
        let mut sim = simulator(params, 1).with_sink(Box::new(recorder));

        sim.start().unwrap();
        assert!(sim.truck().door_open());
        assert!(sim.truck().panic_button_on());
        let first_capacity = sim.truck().profile().fuel_capacity;
        snapshots.lock().unwrap().clear();

        assert_eq!(sim.start().unwrap(), RunOutcome::Completed);
        let loading = snapshots
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.phase == Phase::Loading)
            .cloned()
            .unwrap();
        assert!(!loading.door_open);
        assert!(!loading.panic_button_on);
        assert_ne!(sim.truck().profile().fuel_capacity, first_capacity);

        let msgs = messages(&sim);
        assert!(!msgs.contains(&"Puerta cerrada.".to_string()));
        assert_eq!(msgs.iter().filter(|m| *m == "Puerta abierta.").count(), 1);
        assert!(sim.truck().alerts().len() <= 50);
    }

    #[test]
    fn stop_then_resume_continues_mid_route() {
        let mut sim = simulator(quiet_params(), 21);
        let recorder = Recorder {
            stop_at: Some((2, sim.handle())),
            ..Default::default()
        };
        let snapshots = recorder.snapshots.clone();
        sim = sim.with_sink(Box::new(recorder));

        assert_eq!(sim.start().unwrap(), RunOutcome::Stopped);
        assert!(sim.can_resume());
        assert_eq!(sim.phase(), Phase::EnRoute);
        assert_eq!(sim.truck().location_index(), Some(2));
        let weight_at_stop = sim.truck().current_weight();
        assert!(weight_at_stop > 0.0);
        assert_eq!(messages(&sim).last().unwrap(), "Simulación detenida por el usuario.");

        assert_eq!(sim.resume().unwrap(), RunOutcome::Completed);
        let msgs = messages(&sim);
        assert!(msgs.contains(&"Simulación reanudada.".to_string()));
        // Resuming does not reload the container.
        let loads = msgs.iter().filter(|m| *m == "Inicio de carga de contenedor.").count();
        assert_eq!(loads, 1);

        let indices: Vec<_> = snapshots
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.phase == Phase::EnRoute && s.running)
            .map(|s| s.location_index)
            .collect();
        assert_eq!(indices, [Some(0), Some(1), Some(2), Some(3), Some(4)]);
    }

    #[test]
    fn resume_after_finish_is_refused() {
        let mut sim = simulator(quiet_params(), 5);
        sim.start().unwrap();
        assert!(matches!(sim.resume(), Err(TruckSimError::NotResumable)));
    }

    #[test]
    fn resume_before_start_is_refused() {
        let mut sim = simulator(quiet_params(), 5);
        assert!(matches!(sim.resume(), Err(TruckSimError::NotResumable)));
    }

    #[test]
    fn start_while_running_is_refused() {
        let mut sim = simulator(quiet_params(), 5);
        sim.control.begin_run();
        assert!(matches!(sim.start(), Err(TruckSimError::AlreadyRunning)));
        assert!(matches!(sim.resume(), Err(TruckSimError::AlreadyRunning)));
    }

    #[test]
    fn sink_failure_becomes_error_alert() {
        let recorder = Recorder {
            fail_at: Some(3),
            ..Default::default()
        };
        let mut sim = simulator(quiet_params(), 13).with_sink(Box::new(recorder));

        let outcome = sim.start().unwrap();
        assert!(matches!(outcome, RunOutcome::Faulted(ref msg) if msg.contains("display went away")));
        assert!(!sim.is_running());
        let last = sim.truck().alerts().last().unwrap();
        assert_eq!(last.kind, AlertKind::Error);
        assert!(last.message.starts_with("Error inesperado:"));
    }

    #[test]
    fn empty_truck_cannot_start_route() {
        let catalog = Catalog::builtin();
        let mut rng = ScriptedSource::new(vec![0.0]);
        let truck = TruckState::create(&catalog, RABON, RUTA_3, &mut rng).unwrap();
        let profile = crate::domain::types::TruckProfile {
            max_weight_capacity: 0.0,
            ..truck.profile().clone()
        };
        let truck = TruckState::with_profile(profile, truck.route().clone());

        let mut sim = Simulator::from_truck(
            truck,
            quiet_params(),
            Box::new(ScriptedSource::new(vec![])),
        );
        assert_eq!(sim.start().unwrap(), RunOutcome::CannotStartRoute);
        assert!(!sim.truck().is_en_route());
        let last = sim.truck().alerts().last().unwrap();
        assert_eq!(last.kind, AlertKind::Error);
    }

    #[test]
    fn loop_stays_active_until_run_returns() {
        let handle = ControlHandle::default();
        handle.begin_run();
        handle.stop();
        assert!(!handle.is_running());
        assert!(handle.in_loop());
        handle.end_run();
        assert!(!handle.in_loop());
        assert!(handle.stop_requested());
    }

    #[test]
    fn stop_interrupts_long_pauses() {
        let params = SimulationParams {
            step_delay: Duration::from_secs(30),
            ..quiet_params()
        };
        let mut sim = simulator(params, 17);
        let handle = sim.handle();
        let stopper = thread::spawn(move || {
            thread::sleep(Duration::from_millis(150));
            handle.stop();
        });

        let started = Instant::now();
        assert_eq!(sim.start().unwrap(), RunOutcome::Stopped);
        assert!(started.elapsed() < Duration::from_secs(10));
        stopper.join().unwrap();
    }

    #[test]
    fn seeded_runs_are_reproducible() {
        let params = SimulationParams {
            door_open_probability: 40.0,
            panic_button_probability: 20.0,
            ..SimulationParams::default().without_pacing()
        };
        let mut a = simulator(params.clone(), 99);
        let mut b = simulator(params, 99);
        a.start().unwrap();
        b.start().unwrap();
        assert_eq!(messages(&a), messages(&b));
        assert_eq!(a.truck().current_fuel(), b.truck().current_fuel());
    }
}
