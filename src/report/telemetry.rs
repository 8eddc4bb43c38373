use std::fs::File;
use std::io::Write;
use std::path::Path;

use csv::Writer;
use tracing::info;

use crate::domain::types::Alert;
use crate::error::Result;
use crate::simulation::snapshot::{Snapshot, SnapshotSink};

const TELEMETRY_HEADER: [&str; 12] = [
    "step",
    "phase",
    "lat",
    "lon",
    "location_index",
    "fuel_liters",
    "fuel_percentage",
    "weight_tons",
    "weight_percentage",
    "route_progress",
    "door_open",
    "panic_button_on",
];

/// One CSV row per snapshot.
pub struct CsvTelemetry<W: Write + Send> {
    wtr: Writer<W>,
}

impl CsvTelemetry<File> {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Writing step telemetry to {}", path.display());
        Self::new(Writer::from_path(path)?)
    }
}

impl<W: Write + Send> CsvTelemetry<W> {
    pub fn new(mut wtr: Writer<W>) -> Result<Self> {
        wtr.write_record(TELEMETRY_HEADER)?;
        Ok(Self { wtr })
    }

    pub fn into_inner(self) -> Result<W> {
        self.wtr
            .into_inner()
            .map_err(|e| std::io::Error::other(e.to_string()).into())
    }
}

impl<W: Write + Send> SnapshotSink for CsvTelemetry<W> {
    fn report(&mut self, snapshot: &Snapshot) -> Result<()> {
        let (lat, lon) = snapshot
            .location
            .map(|loc| (format!("{:.6}", loc.lat), format!("{:.6}", loc.lon)))
            .unwrap_or_default();

        self.wtr.write_record([
            snapshot.step.to_string(),
            snapshot.phase.as_str().to_string(),
            lat,
            lon,
            snapshot
                .location_index
                .map(|i| i.to_string())
                .unwrap_or_default(),
            format!("{:.2}", snapshot.fuel_liters),
            format!("{:.2}", snapshot.fuel_percentage),
            format!("{:.3}", snapshot.weight_tons),
            format!("{:.2}", snapshot.weight_percentage),
            format!("{:.2}", snapshot.route_progress),
            snapshot.door_open.to_string(),
            snapshot.panic_button_on.to_string(),
        ])?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.wtr.flush()?;
        Ok(())
    }
}

/// Dumps the whole alert log, one row per entry, keeping the canonical line.
pub fn save_alerts_to_csv(alerts: &[Alert], filename: impl AsRef<Path>) -> Result<()> {
    let mut wtr = Writer::from_path(filename.as_ref())?;

    wtr.write_record(["timestamp", "type", "message", "lat", "lon", "line"])?;

    for alert in alerts {
        let (lat, lon) = alert
            .location
            .map(|loc| (loc.lat.to_string(), loc.lon.to_string()))
            .unwrap_or_default();
        wtr.write_record([
            alert.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            alert.kind.tag().to_string(),
            alert.message.clone(),
            lat,
            lon,
            alert.to_string(),
        ])?;
    }

    wtr.flush()?;
    info!(
        "Saved {} alerts to {}",
        alerts.len(),
        filename.as_ref().display()
    );
    Ok(())
}
