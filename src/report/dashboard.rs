use std::io::Write;

use colored::*;

use crate::error::Result;
use crate::simulation::snapshot::{Phase, Snapshot, SnapshotSink};

const BAR_WIDTH: usize = 20;

/// Terminal rendering of each snapshot: status, gauges and the alert tail.
pub struct ConsoleDashboard<W: Write + Send> {
    out: W,
}

impl<W: Write + Send> ConsoleDashboard<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> SnapshotSink for ConsoleDashboard<W> {
    fn report(&mut self, snapshot: &Snapshot) -> Result<()> {
        self.out.write_all(render(snapshot).as_bytes())?;
        self.out.flush()?;
        Ok(())
    }
}

pub fn render(snapshot: &Snapshot) -> String {
    let mut lines = vec![
        format!(
            "{} {} · {} · paso {}",
            "══".dimmed(),
            snapshot.truck_type.bold(),
            snapshot.route,
            snapshot.step
        ),
        status_line(snapshot),
        format!(
            "Combustible  {} {:.1}% ({:.2} L)",
            bar(snapshot.fuel_percentage),
            snapshot.fuel_percentage,
            snapshot.fuel_liters
        ),
        format!(
            "Peso         {} {:.2} / {:.2} Ton ({:.1}%)",
            bar(snapshot.weight_percentage),
            snapshot.weight_tons,
            snapshot.max_weight_tons,
            snapshot.weight_percentage
        ),
        format!(
            "Progreso     {} {:.1}%",
            bar(snapshot.route_progress),
            snapshot.route_progress
        ),
        "Historial de Alertas".bold().to_string(),
    ];

    if snapshot.alerts.is_empty() {
        lines.push("  No hay alertas por el momento.".to_string());
    }
    for alert in snapshot.alerts.iter().rev() {
        lines.push(format!("  {}", colorize_alert(alert)));
    }

    let mut out = lines.join("\n");
    out.push_str("\n\n");
    out
}

fn status_line(snapshot: &Snapshot) -> String {
    if snapshot.stopped && !snapshot.running {
        return "Simulación detenida.".yellow().to_string();
    }
    match snapshot.phase {
        Phase::Loading => "Cargando contenedor...".to_string(),
        Phase::EnRoute => match snapshot.location {
            Some(loc) if snapshot.door_open => format!(
                "Puerta abierta en ({:.4}, {:.4}), pausando...",
                loc.lat, loc.lon
            )
            .yellow()
            .to_string(),
            Some(loc) => format!("En ruta... Ubicación actual: ({:.4}, {:.4})", loc.lat, loc.lon),
            None => "En ruta...".to_string(),
        },
        Phase::Unloading => "Ruta completada. Descargando...".to_string(),
        Phase::Idle => "Simulación finalizada.".green().to_string(),
    }
}

fn colorize_alert(alert: &str) -> ColoredString {
    if alert.contains("[PANICO]") || alert.contains("[ERROR]") {
        alert.red()
    } else if alert.contains("[ALERTA]") || alert.contains("[ADVERTENCIA]") {
        alert.yellow()
    } else {
        alert.normal()
    }
}

fn bar(percentage: f64) -> String {
    let filled = ((percentage.clamp(0.0, 100.0) / 100.0) * BAR_WIDTH as f64).round() as usize;
    format!("[{}{}]", "#".repeat(filled), " ".repeat(BAR_WIDTH - filled))
}
