use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::utils::format_alert;

/// A GPS waypoint in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

impl From<(f64, f64)> for Coordinate {
    fn from((lat, lon): (f64, f64)) -> Self {
        Self { lat, lon }
    }
}

/// Static description of a truck type, as found in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TruckType {
    pub max_weight_capacity: f64,
    pub min_fuel_capacity: f64,
    pub max_fuel_capacity: f64,
}

/// Truck type resolved for one run, with its fuel capacity already drawn.
#[derive(Debug, Clone, PartialEq)]
pub struct TruckProfile {
    pub name: String,
    pub max_weight_capacity: f64,
    pub fuel_capacity: f64,
}

/// Ordered, non-empty list of waypoints.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub name: String,
    pub waypoints: Vec<Coordinate>,
}

impl Route {
    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    pub fn last_index(&self) -> usize {
        self.waypoints.len().saturating_sub(1)
    }

    pub fn get(&self, index: usize) -> Option<Coordinate> {
        self.waypoints.get(index).copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlertKind {
    Info,
    Alert,
    Warning,
    Panic,
    Error,
}

impl AlertKind {
    /// Tag used inside the brackets of the alert line.
    pub fn tag(self) -> &'static str {
        match self {
            AlertKind::Info => "INFO",
            AlertKind::Alert => "ALERTA",
            AlertKind::Warning => "ADVERTENCIA",
            AlertKind::Panic => "PANICO",
            AlertKind::Error => "ERROR",
        }
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub timestamp: NaiveDateTime,
    pub kind: AlertKind,
    pub message: String,
    pub location: Option<Coordinate>,
}

impl Alert {
    pub fn new(kind: AlertKind, message: impl Into<String>, location: Option<Coordinate>) -> Self {
        Self {
            timestamp: chrono::Local::now().naive_local(),
            kind,
            message: message.into(),
            location,
        }
    }
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_alert(
            &self.timestamp,
            self.kind,
            &self.message,
            self.location,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn alert_display_is_canonical_line() {
        let alert = Alert {
            timestamp: NaiveDate::from_ymd_opt(2025, 1, 31)
                .and_then(|d| d.and_hms_opt(8, 0, 0))
                .unwrap(),
            kind: AlertKind::Panic,
            message: "¡Botón de pánico activado!".to_string(),
            location: Some(Coordinate::new(19.880306232537567, -103.5974233225158)),
        };
        assert_eq!(
            alert.to_string(),
            "2025-01-31 08:00:00 - [PANICO] ¡Botón de pánico activado! en (19.8803, -103.5974)"
        );
    }

    #[test]
    fn route_indices() {
        let route = Route {
            name: "corta".into(),
            waypoints: vec![(1.0, 2.0).into(), (3.0, 4.0).into()],
        };
        assert_eq!(route.last_index(), 1);
        assert_eq!(route.get(1), Some(Coordinate::new(3.0, 4.0)));
        assert_eq!(route.get(2), None);
    }
}
