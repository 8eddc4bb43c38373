use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain::types::{Coordinate, Route, TruckType};
use crate::error::{Result, TruckSimError};

/// Read-only reference data: truck types and GPS routes by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub truck_types: BTreeMap<String, TruckType>,
    pub routes: BTreeMap<String, Vec<(f64, f64)>>,
}

impl Catalog {
    pub fn builtin() -> Self {
        let truck_types = [
            ("Camioneta 3.5 toneladas", 3.5, 240.0, 240.0),
            ("Camión Rabón", 9.0, 150.0, 300.0),
            ("Camión Torton", 18.0, 400.0, 800.0),
            ("Tráiler Sencillo", 30.0, 500.0, 900.0),
        ]
        .into_iter()
        .map(|(name, max_weight, min_fuel, max_fuel)| {
            (
                name.to_string(),
                TruckType {
                    max_weight_capacity: max_weight,
                    min_fuel_capacity: min_fuel,
                    max_fuel_capacity: max_fuel,
                },
            )
        })
        .collect();

        let mut routes = BTreeMap::new();
        routes.insert(
            "Ruta 1: Sayula - Ciudad Guzmán".to_string(),
            vec![
                (19.880306232537567, -103.5974233225158),
                (19.87974122224069, -103.58978439208178),
                (19.87998336975749, -103.5840337365865),
                (19.875866811647732, -103.57579399139924),
                (19.867552652578283, -103.55296303077623),
                (19.86351649582973, -103.54068924367438),
                (19.85786570381317, -103.52309395447243),
                (19.85358711290675, -103.51193596104223),
                (19.847935967232353, -103.50670028962115),
                (19.832676869038995, -103.49768806832259),
                (19.824683422406242, -103.4945981619888),
                (19.805142195373566, -103.48618675544348),
                (19.798439486071146, -103.48378349643052),
                (19.78543704006512, -103.47846199221523),
                (19.77388739373882, -103.47065140042315),
                (19.765164028406172, -103.45906425689333),
                (19.750058555517278, -103.45726181263362),
                (19.746504118752444, -103.45803428874493),
                (19.746746469228338, -103.46275497609179),
                (19.75223964797367, -103.46498657374667),
                (19.746718699919295, -103.47183961676143),
                (19.72054271856955, -103.48986405935854),
                (19.731449898772873, -103.49904794201517),
                (19.740902185932043, -103.50582856565885),
            ],
        );
        routes.insert(
            "Ruta 2: Costa a Montaña".to_string(),
            vec![
                (20.6534, -105.2253), // Puerto Vallarta
                (20.7000, -105.1500),
                (20.9180, -104.8944), // Tepic
                (21.1000, -104.5000),
                (21.5079, -104.8951),
                (21.8854, -102.2916), // Aguascalientes
            ],
        );
        routes.insert(
            "Ruta 3: Ruta Corta Urbana".to_string(),
            vec![
                (20.6736, -103.3440), // Guadalajara centro
                (20.6750, -103.3500),
                (20.6700, -103.3600),
                (20.6650, -103.3700),
                (20.6600, -103.3800),
            ],
        );

        Self {
            truck_types,
            routes,
        }
    }

    /// Parses a catalog with the same shape as the built-in one and validates it.
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let catalog: Catalog = serde_json::from_str(raw)?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file_content = fs::read_to_string(path).map_err(TruckSimError::CatalogIo)?;
        let catalog = Self::from_json_str(&file_content)?;
        info!(
            "Loaded catalog from {} ({} truck types, {} routes)",
            path.display(),
            catalog.truck_types.len(),
            catalog.routes.len()
        );
        Ok(catalog)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, spec) in &self.truck_types {
            let valid = spec.min_fuel_capacity >= 0.0
                && spec.min_fuel_capacity <= spec.max_fuel_capacity
                && spec.max_weight_capacity >= 0.0;
            if !valid {
                return Err(TruckSimError::InvalidFuelRange {
                    name: name.clone(),
                    min: spec.min_fuel_capacity,
                    max: spec.max_fuel_capacity,
                });
            }
        }
        for (name, points) in &self.routes {
            if points.is_empty() {
                return Err(TruckSimError::EmptyRoute(name.clone()));
            }
        }
        debug!("Catalog validated");
        Ok(())
    }

    pub fn truck_type(&self, name: &str) -> Result<&TruckType> {
        self.truck_types
            .get(name)
            .ok_or_else(|| TruckSimError::UnknownTruckType(name.to_string()))
    }

    pub fn route(&self, name: &str) -> Result<Route> {
        let points = self
            .routes
            .get(name)
            .ok_or_else(|| TruckSimError::UnknownRoute(name.to_string()))?;
        if points.is_empty() {
            return Err(TruckSimError::EmptyRoute(name.to_string()));
        }
        Ok(Route {
            name: name.to_string(),
            waypoints: points.iter().copied().map(Coordinate::from).collect(),
        })
    }

    pub fn truck_type_names(&self) -> impl Iterator<Item = &str> {
        self.truck_types.keys().map(String::as_str)
    }

    pub fn route_names(&self) -> impl Iterator<Item = &str> {
        self.routes.keys().map(String::as_str)
    }
}
