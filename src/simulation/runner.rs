use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use colored::*;
use dotenv::dotenv;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::constant::{
    DEFAULT_DOOR_OPEN_PROBABILITY, DEFAULT_OVERWEIGHT_PROBABILITY,
    DEFAULT_PANIC_BUTTON_PROBABILITY, DOOR_OPEN_PAUSE_SECONDS, FUEL_CONSUMPTION_RATE,
    LOW_FUEL_THRESHOLD, PHASE_PAUSE_SECONDS, SIMULATION_STEP_DELAY_SECONDS,
};
use crate::config::SimulationParams;
use crate::domain::catalog::Catalog;
use crate::error::TruckSimError;
use crate::report::{save_alerts_to_csv, ConsoleDashboard, CsvTelemetry, JsonLinesSink};
use crate::simulation::random::{ChaChaSource, RandomSource};
use crate::simulation::simulator::{ControlHandle, RunOutcome, Simulator};
use crate::simulation::snapshot::SnapshotSink;

#[derive(Debug, Parser)]
#[command(
    name = "truck-sim",
    about = "Simulates a cargo truck along a GPS route with random sensor events"
)]
pub struct Args {
    /// Truck type name from the catalog
    #[arg(long, env = "TRUCK_SIM_TRUCK", default_value = "Camión Rabón")]
    pub truck: String,

    /// Route name from the catalog
    #[arg(long, env = "TRUCK_SIM_ROUTE", default_value = "Ruta 3: Ruta Corta Urbana")]
    pub route: String,

    /// JSON catalog replacing the built-in truck types and routes
    #[arg(long, env = "TRUCK_SIM_CATALOG")]
    pub catalog: Option<PathBuf>,

    /// Seed for a reproducible run
    #[arg(long, env = "TRUCK_SIM_SEED")]
    pub seed: Option<u64>,

    #[arg(long, env = "TRUCK_SIM_DOOR_OPEN_PROBABILITY", default_value_t = DEFAULT_DOOR_OPEN_PROBABILITY)]
    pub door_open_probability: f64,

    #[arg(long, env = "TRUCK_SIM_PANIC_BUTTON_PROBABILITY", default_value_t = DEFAULT_PANIC_BUTTON_PROBABILITY)]
    pub panic_button_probability: f64,

    #[arg(long, env = "TRUCK_SIM_OVERWEIGHT_PROBABILITY", default_value_t = DEFAULT_OVERWEIGHT_PROBABILITY)]
    pub overweight_probability: f64,

    #[arg(long, env = "TRUCK_SIM_LOW_FUEL_THRESHOLD", default_value_t = LOW_FUEL_THRESHOLD)]
    pub low_fuel_threshold: f64,

    /// Percent of the tank burned per waypoint
    #[arg(long, env = "TRUCK_SIM_FUEL_RATE", default_value_t = FUEL_CONSUMPTION_RATE)]
    pub fuel_consumption_rate: f64,

    /// Seconds between waypoints
    #[arg(long, env = "TRUCK_SIM_STEP_DELAY", default_value_t = SIMULATION_STEP_DELAY_SECONDS)]
    pub step_delay: f64,

    /// Extra seconds held while the door is open
    #[arg(long, env = "TRUCK_SIM_DOOR_PAUSE", default_value_t = DOOR_OPEN_PAUSE_SECONDS)]
    pub door_open_pause: f64,

    /// Seconds spent on loading and unloading
    #[arg(long, env = "TRUCK_SIM_PHASE_PAUSE", default_value_t = PHASE_PAUSE_SECONDS)]
    pub phase_pause: f64,

    /// Keep only the newest N alerts
    #[arg(long, env = "TRUCK_SIM_ALERT_LIMIT")]
    pub alert_limit: Option<usize>,

    /// Print snapshots as JSON lines instead of the dashboard
    #[arg(long)]
    pub json: bool,

    /// Write one CSV row per step to this file
    #[arg(long)]
    pub telemetry: Option<PathBuf>,

    /// Export the full alert log as CSV when the run ends
    #[arg(long)]
    pub alerts_csv: Option<PathBuf>,

    /// List truck types and routes, then exit
    #[arg(long)]
    pub list: bool,

    /// Exit instead of offering to resume after a stop
    #[arg(long)]
    pub no_prompt: bool,
}

impl Args {
    pub fn params(&self) -> Result<SimulationParams, TruckSimError> {
        let params = SimulationParams {
            door_open_probability: self.door_open_probability,
            panic_button_probability: self.panic_button_probability,
            overweight_probability: self.overweight_probability,
            low_fuel_threshold: self.low_fuel_threshold,
            fuel_consumption_rate: self.fuel_consumption_rate,
            step_delay: seconds("step_delay", self.step_delay)?,
            door_open_pause: seconds("door_open_pause", self.door_open_pause)?,
            phase_pause: seconds("phase_pause", self.phase_pause)?,
            alert_limit: self.alert_limit,
        };
        params.validate()?;
        Ok(params)
    }
}

fn seconds(name: &str, value: f64) -> Result<Duration, TruckSimError> {
    Duration::try_from_secs_f64(value).map_err(|_| TruckSimError::InvalidParameter {
        name: name.to_string(),
        value,
    })
}

/// Initialize tracing and environment
fn init_tracing_and_env() -> Result<(), Box<dyn Error>> {
    dotenv().ok();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init()?;
    Ok(())
}

fn build_sinks(args: &Args) -> Result<Vec<Box<dyn SnapshotSink>>, TruckSimError> {
    let mut sinks: Vec<Box<dyn SnapshotSink>> = Vec::new();
    if args.json {
        sinks.push(Box::new(JsonLinesSink::new(std::io::stdout())));
    } else {
        sinks.push(Box::new(ConsoleDashboard::new(std::io::stdout())));
    }
    if let Some(path) = &args.telemetry {
        sinks.push(Box::new(CsvTelemetry::from_path(path)?));
    }
    Ok(sinks)
}

fn print_catalog(catalog: &Catalog) {
    println!("{}", "Tipos de camión".bold());
    for (name, spec) in &catalog.truck_types {
        println!(
            "  {} - {:.1} t, tanque {:.0}-{:.0} L",
            name.cyan(),
            spec.max_weight_capacity,
            spec.min_fuel_capacity,
            spec.max_fuel_capacity
        );
    }
    println!("{}", "Rutas".bold());
    for (name, points) in &catalog.routes {
        println!("  {} - {} puntos", name.cyan(), points.len());
    }
}

/// Runs a blocking simulator operation off the async runtime.
async fn drive(
    mut sim: Simulator,
    op: fn(&mut Simulator) -> Result<RunOutcome, TruckSimError>,
) -> Result<(Simulator, RunOutcome), Box<dyn Error>> {
    let (sim, outcome) = tokio::task::spawn_blocking(move || {
        let outcome = op(&mut sim);
        (sim, outcome)
    })
    .await?;
    Ok((sim, outcome?))
}

/// Stops the loop if one is still going. Returns false when idle.
fn interrupt(handle: &ControlHandle) -> bool {
    if handle.in_loop() {
        if !handle.stop_requested() {
            handle.stop();
        }
        true
    } else {
        false
    }
}

/// First Ctrl-C stops the run, a Ctrl-C while idle exits.
async fn watch_ctrl_c(handle: ControlHandle) {
    loop {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Cannot listen for Ctrl-C: {e}");
            return;
        }
        if !interrupt(&handle) {
            info!("Interrupted while idle, exiting");
            std::process::exit(130);
        }
    }
}

async fn prompt_resume() -> Result<bool, Box<dyn Error>> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        println!(
            "{}",
            "Simulación detenida. Escriba 'reanudar' para continuar o 'salir' para terminar:"
                .yellow()
        );
        match lines.next_line().await? {
            None => return Ok(false),
            Some(line) => match line.trim().to_lowercase().as_str() {
                "reanudar" | "resume" | "r" => return Ok(true),
                "salir" | "quit" | "q" => return Ok(false),
                other => warn!("Unknown command: {other}"),
            },
        }
    }
}

fn report_final_stats(sim: &Simulator, outcome: &RunOutcome) {
    let truck = sim.truck();
    info!("Run finished: {:?}", outcome);
    info!(
        "Fuel {:.1}%, weight {:.2} t, progress {:.1}%",
        truck.fuel_percentage(),
        truck.current_weight(),
        truck.route_progress_percentage()
    );
    if let (Some(start), Some(end)) = (truck.simulation_start_time(), truck.simulation_end_time()) {
        info!("Route time: {}s", (end - start).num_seconds());
    }
    info!("Alerts recorded: {}", truck.alerts().len());
}

pub async fn run() -> Result<(), Box<dyn Error>> {
    init_tracing_and_env()?;
    let args = Args::parse();

    let catalog = match &args.catalog {
        Some(path) => Catalog::from_json_file(path)?,
        None => Catalog::builtin(),
    };

    if args.list {
        print_catalog(&catalog);
        return Ok(());
    }

    let params = args.params()?;
    let rng: Box<dyn RandomSource> = match args.seed {
        Some(seed) => {
            info!("Using seed {seed}");
            Box::new(ChaChaSource::from_seed(seed))
        }
        None => Box::new(ChaChaSource::from_entropy()),
    };

    let sinks = build_sinks(&args)?;
    let sim = Simulator::new(&catalog, &args.truck, &args.route, params, rng)?
        .with_sink(Box::new(sinks));

    tokio::spawn(watch_ctrl_c(sim.handle()));

    let (mut sim, mut outcome) = drive(sim, Simulator::start).await?;
    while outcome == RunOutcome::Stopped && sim.can_resume() && !args.no_prompt {
        if !prompt_resume().await? {
            break;
        }
        (sim, outcome) = drive(sim, Simulator::resume).await?;
    }

    sim.finish()?;
    if let Some(path) = &args.alerts_csv {
        save_alerts_to_csv(sim.truck().alerts(), path)?;
    }
    report_final_stats(&sim, &outcome);

    Ok(())
}
