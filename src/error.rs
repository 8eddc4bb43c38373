//! Error types for the truck simulator.

#[derive(Debug, thiserror::Error)]
pub enum TruckSimError {
    #[error("Unknown truck type: {0}")]
    UnknownTruckType(String),

    #[error("Unknown route: {0}")]
    UnknownRoute(String),

    #[error("Route {0} has no waypoints")]
    EmptyRoute(String),

    #[error("Truck type {name} has an invalid fuel range [{min}, {max}]")]
    InvalidFuelRange { name: String, min: f64, max: f64 },

    #[error("Invalid value for {name}: {value}")]
    InvalidParameter { name: String, value: f64 },

    #[error("Failed to read catalog file: {0}")]
    CatalogIo(#[source] std::io::Error),

    #[error("Failed to parse catalog file: {0}")]
    CatalogParse(#[from] serde_json::Error),

    #[error("The simulation is already running")]
    AlreadyRunning,

    #[error("Cannot resume, the simulation has already finished")]
    NotResumable,

    #[error("{0}")]
    RuntimeFault(String),

    #[error("Telemetry write failed: {0}")]
    Telemetry(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TruckSimError {
    /// True for errors raised while building a truck or its parameters.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            TruckSimError::UnknownTruckType(_)
                | TruckSimError::UnknownRoute(_)
                | TruckSimError::EmptyRoute(_)
                | TruckSimError::InvalidFuelRange { .. }
                | TruckSimError::InvalidParameter { .. }
                | TruckSimError::CatalogIo(_)
                | TruckSimError::CatalogParse(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, TruckSimError>;
